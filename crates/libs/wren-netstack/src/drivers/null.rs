use crate::buffer::FrameBuf;
use crate::chain::Chain;
use crate::error::{NetstackError, Result};
use crate::frame::{FrameInfo, ParsedFrame};
use crate::ioctl::{IoctlCmd, IoctlValue, RxCallback, TxCallback};
use crate::module::{Driver, Framer, HeaderCompressor, LinkSecurity, Module};
use crate::node::NodeContext;

/// Top of the chain: hands outbound data to the MAC and inbound data to the
/// receiver registered with [`IoctlCmd::RxCallbackSet`].
#[derive(Default)]
pub struct NullLlc {
    rx_callback: Option<RxCallback>,
    tx_callback: Option<TxCallback>,
}

impl NullLlc {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for NullLlc {
    fn name(&self) -> &'static str {
        "llc-null"
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }

    fn ioctl(&mut self, cmd: IoctlCmd, value: &mut IoctlValue, _node: &mut NodeContext) -> Result<()> {
        match cmd {
            IoctlCmd::RxCallbackSet => {
                self.rx_callback = value.take_rx_callback()?;
                Ok(())
            }
            IoctlCmd::TxCallbackSet => {
                self.tx_callback = value.take_tx_callback()?;
                Ok(())
            }
            _ => Err(NetstackError::CmdUnsupported),
        }
    }
}

impl Module for NullLlc {
    fn send(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        let result = chain.send_down(data);
        if let Some(callback) = self.tx_callback.as_mut() {
            callback(result);
        }
        result
    }

    fn recv(&mut self, data: &[u8], _chain: &mut Chain<'_>) -> Result<()> {
        match self.rx_callback.as_mut() {
            Some(callback) => callback(data),
            None => {
                log::debug!("llc: {} bytes dropped, no receiver", data.len());
                Err(NetstackError::LLC_NO_RECEIVER)
            }
        }
    }
}

macro_rules! passthrough_module {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Driver for $name {
            fn name(&self) -> &'static str {
                $label
            }

            fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
                Ok(())
            }
        }

        impl Module for $name {
            fn send(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
                chain.send_down(data)
            }

            fn recv(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
                chain.deliver_up(data)
            }
        }
    };
}

passthrough_module!(
    /// Forwards frames unchanged in both directions.
    NullMac,
    "mac-null"
);
passthrough_module!(NullPhy, "phy-null");

/// Radio that accepts every frame and transmits nothing. Frames handed to
/// [`crate::Netstack::recv`] are delivered upward.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRf;

impl Driver for NullRf {
    fn name(&self) -> &'static str {
        "rf-null"
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }
}

impl Module for NullRf {
    fn send(&mut self, data: &[u8], _chain: &mut Chain<'_>) -> Result<()> {
        log::trace!("rf(null): discarding {} bytes", data.len());
        Ok(())
    }

    fn recv(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        chain.deliver_up(data)
    }
}

/// Framer without a header: the frame is the payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFramer;

impl Driver for NullFramer {
    fn name(&self) -> &'static str {
        "framer-null"
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }
}

impl Framer for NullFramer {
    fn header_len(&self, _info: &FrameInfo) -> usize {
        0
    }

    fn create(&mut self, _info: &FrameInfo, payload: &[u8], out: &mut FrameBuf) -> Result<usize> {
        out.reset();
        out.write(payload)?;
        Ok(0)
    }

    fn parse(&self, _frame: &[u8]) -> Result<ParsedFrame> {
        Ok(ParsedFrame::default())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullHc;

impl Driver for NullHc {
    fn name(&self) -> &'static str {
        "hc-null"
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }
}

impl HeaderCompressor for NullHc {
    fn compress(&mut self, packet: &[u8], out: &mut FrameBuf) -> Result<()> {
        out.reset();
        out.write(packet)?;
        Ok(())
    }

    fn decompress(&mut self, payload: &[u8], out: &mut FrameBuf) -> Result<()> {
        out.reset();
        out.write(payload)?;
        Ok(())
    }
}

/// Link security that neither protects nor verifies anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSec;

impl Driver for NullSec {
    fn name(&self) -> &'static str {
        "llsec-null"
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }
}

impl LinkSecurity for NullSec {
    fn overhead(&self) -> usize {
        0
    }

    fn on_frame_created(&mut self, _frame: &mut FrameBuf, _header_len: usize) -> Result<()> {
        Ok(())
    }

    fn input(&mut self, _frame: &mut FrameBuf, _parsed: &ParsedFrame) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::netstack::{Netstack, Role, Roles};

    fn null_stack() -> Netstack {
        let mut stack = Netstack::new(NodeContext::default());
        stack
            .configure(Roles::new(NullFramer, NullHc, NullSec, NullLlc::new(), NullMac, NullPhy, NullRf))
            .expect("all roles bound");
        stack.initialize().expect("null drivers initialize");
        stack
    }

    #[test]
    fn received_frames_reach_the_llc_receiver_unchanged() {
        let mut stack = null_stack();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut slot = IoctlValue::RxCallback(Some(Box::new(move |data: &[u8]| {
            sink.borrow_mut().extend_from_slice(data);
            Ok(())
        })));
        stack.ioctl(Role::Llc, IoctlCmd::RxCallbackSet, &mut slot).expect("llc accepts rx callback");

        stack.recv(&[0xde, 0xad]).expect("delivered");
        assert_eq!(*seen.borrow(), vec![0xde, 0xad]);
    }

    #[test]
    fn llc_without_receiver_reports_it() {
        let mut stack = null_stack();
        assert_eq!(stack.recv(&[1]), Err(NetstackError::LLC_NO_RECEIVER));
    }

    #[test]
    fn tx_callback_sees_the_send_result() {
        let mut stack = null_stack();
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);
        let mut slot = IoctlValue::TxCallback(Some(Box::new(move |res: Result<()>| sink.borrow_mut().push(res))));
        stack.ioctl(Role::Llc, IoctlCmd::TxCallbackSet, &mut slot).expect("llc accepts tx callback");

        stack.send(&[1, 2, 3]).expect("null rf accepts everything");
        assert_eq!(*results.borrow(), vec![Ok(())]);
    }

    #[test]
    fn null_rf_rejects_control_commands() {
        let mut stack = null_stack();
        let mut value = IoctlValue::I8(0);
        assert_eq!(
            stack.ioctl(Role::Rf, IoctlCmd::RfTxPowerSet, &mut value),
            Err(NetstackError::CmdUnsupported)
        );
    }
}
