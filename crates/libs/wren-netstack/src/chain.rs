use crate::error::{NetstackError, Result};
use crate::linkaddr::LinkAddr;
use crate::module::{Framer, HeaderCompressor, LinkSecurity, Module};
use crate::node::NodeContext;

/// Per-packet attributes travelling with a frame through the chain.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct PacketAttrs {
    /// Link destination of an outbound frame; `None` is broadcast.
    pub dst: Option<LinkAddr>,
    /// Link source of an inbound frame once the MAC has parsed it.
    pub src: Option<LinkAddr>,
    pub rssi: Option<i8>,
}

impl PacketAttrs {
    pub fn to(dst: LinkAddr) -> Self {
        Self { dst: Some(dst), ..Self::default() }
    }
}

/// Capability handle given to a [`Module`] for the duration of one call.
///
/// During `send` only the layers below are reachable, during `recv` only the
/// layers above; `poll` sees both. The framer, header compressor, link
/// security driver and node context are always available.
pub struct Chain<'a> {
    above: &'a mut [Box<dyn Module>],
    below: &'a mut [Box<dyn Module>],
    framer: &'a mut (dyn Framer + 'static),
    hc: &'a mut (dyn HeaderCompressor + 'static),
    llsec: &'a mut (dyn LinkSecurity + 'static),
    node: &'a mut NodeContext,
    attrs: PacketAttrs,
}

impl<'a> Chain<'a> {
    /// `above` is ordered top first, `below` nearest first.
    pub fn new(
        above: &'a mut [Box<dyn Module>],
        below: &'a mut [Box<dyn Module>],
        framer: &'a mut (dyn Framer + 'static),
        hc: &'a mut (dyn HeaderCompressor + 'static),
        llsec: &'a mut (dyn LinkSecurity + 'static),
        node: &'a mut NodeContext,
    ) -> Self {
        Self { above, below, framer, hc, llsec, node, attrs: PacketAttrs::default() }
    }

    pub fn with_attrs(mut self, attrs: PacketAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn has_above(&self) -> bool {
        !self.above.is_empty()
    }

    pub fn has_below(&self) -> bool {
        !self.below.is_empty()
    }

    /// Passes `data` to the next layer down.
    pub fn send_down(&mut self, data: &[u8]) -> Result<()> {
        let (next, rest) = self.below.split_first_mut().ok_or(NetstackError::Init)?;
        let mut chain = Chain {
            above: &mut [],
            below: rest,
            framer: &mut *self.framer,
            hc: &mut *self.hc,
            llsec: &mut *self.llsec,
            node: &mut *self.node,
            attrs: self.attrs,
        };
        next.send(data, &mut chain)
    }

    /// Passes `data` to the next layer up.
    pub fn deliver_up(&mut self, data: &[u8]) -> Result<()> {
        let (next, rest) = self.above.split_last_mut().ok_or(NetstackError::Init)?;
        let mut chain = Chain {
            above: rest,
            below: &mut [],
            framer: &mut *self.framer,
            hc: &mut *self.hc,
            llsec: &mut *self.llsec,
            node: &mut *self.node,
            attrs: self.attrs,
        };
        next.recv(data, &mut chain)
    }

    pub fn framer(&mut self) -> &mut (dyn Framer + 'static) {
        &mut *self.framer
    }

    pub fn hc(&mut self) -> &mut (dyn HeaderCompressor + 'static) {
        &mut *self.hc
    }

    pub fn llsec(&mut self) -> &mut (dyn LinkSecurity + 'static) {
        &mut *self.llsec
    }

    pub fn node(&self) -> &NodeContext {
        &*self.node
    }

    pub fn node_mut(&mut self) -> &mut NodeContext {
        &mut *self.node
    }

    pub fn attrs(&self) -> &PacketAttrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut PacketAttrs {
        &mut self.attrs
    }
}
