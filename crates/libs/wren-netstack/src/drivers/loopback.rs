//! In-memory radio medium for simulation and tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::chain::Chain;
use crate::error::{NetstackError, Result};
use crate::ioctl::{IoctlCmd, IoctlValue, RxCallback, TxCallback};
use crate::linkaddr::LinkAddr;
use crate::module::{Driver, Module};
use crate::node::NodeContext;

const DEFAULT_RSSI: i8 = -60;
const DEFAULT_SYNC_WORD: u16 = 0x904e;

pub type PortId = usize;

#[derive(Debug)]
struct Port {
    inbox: VecDeque<Vec<u8>>,
    connected: bool,
    rssi: i8,
    /// Link address of the radio's node, known once the radio is initialized.
    owner: Option<LinkAddr>,
}

#[derive(Debug, Default)]
struct MediumState {
    ports: Vec<Port>,
    jammed: bool,
}

/// Broadcast medium shared by every attached [`LoopbackRf`].
///
/// A transmitted frame is queued at every other connected port and picked
/// up by the owning radio on its next poll. A unicast frame is acknowledged
/// only when a connected port belongs to its destination. Cloning yields
/// another handle to the same medium.
#[derive(Debug, Clone, Default)]
pub struct Medium {
    state: Rc<RefCell<MediumState>>,
}

impl Medium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self) -> PortId {
        let mut state = self.state.borrow_mut();
        state.ports.push(Port { inbox: VecDeque::new(), connected: true, rssi: DEFAULT_RSSI, owner: None });
        state.ports.len() - 1
    }

    /// Binds `port` to the node answering for `addr`.
    pub fn set_owner(&self, port: PortId, addr: LinkAddr) {
        if let Some(port) = self.state.borrow_mut().ports.get_mut(port) {
            port.owner = Some(addr);
        }
    }

    /// A disconnected port neither hears nor reaches anyone.
    pub fn set_connected(&self, port: PortId, connected: bool) {
        if let Some(port) = self.state.borrow_mut().ports.get_mut(port) {
            port.connected = connected;
            if !connected {
                port.inbox.clear();
            }
        }
    }

    /// While jammed every transmission fails channel access.
    pub fn set_jammed(&self, jammed: bool) {
        self.state.borrow_mut().jammed = jammed;
    }

    pub fn is_jammed(&self) -> bool {
        self.state.borrow().jammed
    }

    /// RSSI reported for frames received at `port`.
    pub fn set_rssi(&self, port: PortId, rssi: i8) {
        if let Some(port) = self.state.borrow_mut().ports.get_mut(port) {
            port.rssi = rssi;
        }
    }

    pub fn pending(&self, port: PortId) -> usize {
        self.state.borrow().ports.get(port).map_or(0, |port| port.inbox.len())
    }

    fn transmit(&self, from: PortId, dst: Option<LinkAddr>, frame: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.jammed {
            return Err(NetstackError::ChannelAccessFailure);
        }

        match state.ports.get(from) {
            Some(port) if port.connected => {}
            Some(_) => return Err(NetstackError::TxNoAck),
            None => return Err(NetstackError::InvalidArgument),
        }

        let mut acked = false;
        for (id, port) in state.ports.iter_mut().enumerate() {
            if id != from && port.connected {
                port.inbox.push_back(frame.to_vec());
                acked |= dst.is_some() && port.owner == dst;
            }
        }

        match dst {
            Some(addr) if !acked && !addr.is_null() => Err(NetstackError::TxNoAck),
            _ => Ok(()),
        }
    }

    fn take(&self, port: PortId) -> Option<(Vec<u8>, i8)> {
        let mut state = self.state.borrow_mut();
        let port = state.ports.get_mut(port)?;
        let rssi = port.rssi;
        port.inbox.pop_front().map(|frame| (frame, rssi))
    }
}

/// Radio attached to a [`Medium`].
///
/// Frames arriving on the medium wait in the port's inbox until
/// [`Module::poll`] runs, which plays the part of the receive interrupt
/// handing work to the cooperative loop.
pub struct LoopbackRf {
    medium: Medium,
    port: PortId,
    is_on: bool,
    tx_power: i8,
    sensitivity: i8,
    sync_word: u16,
    last_rssi: i8,
    antenna_diversity: bool,
    rx_callback: Option<RxCallback>,
    tx_callback: Option<TxCallback>,
}

impl LoopbackRf {
    pub fn new(medium: &Medium) -> Self {
        let port = medium.attach();
        Self {
            medium: medium.clone(),
            port,
            is_on: false,
            tx_power: 0,
            sensitivity: 0,
            sync_word: DEFAULT_SYNC_WORD,
            last_rssi: DEFAULT_RSSI,
            antenna_diversity: false,
            rx_callback: None,
            tx_callback: None,
        }
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }
}

impl Driver for LoopbackRf {
    fn name(&self) -> &'static str {
        "rf-loopback"
    }

    fn init(&mut self, node: &mut NodeContext) -> Result<()> {
        self.medium.set_owner(self.port, node.link_addr);
        self.tx_power = node.mac_phy.init_power;
        self.sensitivity = node.mac_phy.init_sensitivity;
        log::debug!(
            "rf(loopback): port {} power={}dBm sens={}dBm",
            self.port,
            self.tx_power,
            self.sensitivity
        );
        Ok(())
    }

    fn on(&mut self, _node: &mut NodeContext) -> Result<()> {
        self.is_on = true;
        Ok(())
    }

    fn off(&mut self, _node: &mut NodeContext) -> Result<()> {
        self.is_on = false;
        Ok(())
    }

    fn ioctl(&mut self, cmd: IoctlCmd, value: &mut IoctlValue, _node: &mut NodeContext) -> Result<()> {
        match cmd {
            IoctlCmd::RfTxPowerSet => self.tx_power = value.as_i8()?,
            IoctlCmd::RfTxPowerGet => *value = IoctlValue::I8(self.tx_power),
            IoctlCmd::RfSensSet => self.sensitivity = value.as_i8()?,
            IoctlCmd::RfSensGet => *value = IoctlValue::I8(self.sensitivity),
            IoctlCmd::RfRssiGet => *value = IoctlValue::I8(self.last_rssi),
            IoctlCmd::RfCcaGet => *value = IoctlValue::Bool(!self.medium.is_jammed()),
            IoctlCmd::RfAntDivSet => self.antenna_diversity = value.as_bool()?,
            IoctlCmd::RfSwitch => self.is_on = value.as_bool()?,
            IoctlCmd::RfIsRxBusy => *value = IoctlValue::Bool(self.medium.pending(self.port) > 0),
            IoctlCmd::RfIsTxBusy => *value = IoctlValue::Bool(false),
            IoctlCmd::RfSyncSet => {
                let word = value.as_u64()?;
                self.sync_word = u16::try_from(word).map_err(|_| NetstackError::InvalidArgument)?;
            }
            IoctlCmd::RfSyncGet => *value = IoctlValue::U16(self.sync_word),
            IoctlCmd::RxCallbackSet => self.rx_callback = value.take_rx_callback()?,
            IoctlCmd::TxCallbackSet => self.tx_callback = value.take_tx_callback()?,
            _ => return Err(NetstackError::CmdUnsupported),
        }
        Ok(())
    }
}

impl Module for LoopbackRf {
    fn send(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        let result = if self.is_on {
            self.medium.transmit(self.port, chain.attrs().dst, data)
        } else {
            log::warn!("rf(loopback): port {} is off, refusing to transmit", self.port);
            Err(NetstackError::RF_SEND)
        };

        if let Some(callback) = self.tx_callback.as_mut() {
            callback(result);
        }
        result
    }

    /// Observes the frame through the RF-level callback, then hands it to
    /// the layer above when there is one.
    fn recv(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        chain.attrs_mut().rssi = Some(self.last_rssi);
        if let Some(callback) = self.rx_callback.as_mut() {
            callback(data)?;
        }
        if chain.has_above() {
            chain.deliver_up(data)
        } else {
            Ok(())
        }
    }

    fn poll(&mut self, chain: &mut Chain<'_>) -> Result<()> {
        while let Some((frame, rssi)) = self.medium.take(self.port) {
            if !self.is_on {
                continue;
            }
            self.last_rssi = rssi;
            if let Err(err) = self.recv(&frame, chain) {
                log::debug!("rf(loopback): port {} rx of {} bytes: {}", self.port, frame.len(), err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_reach_every_other_connected_port() {
        let medium = Medium::new();
        let a = medium.attach();
        let b = medium.attach();
        let c = medium.attach();
        medium.set_connected(c, false);

        medium.transmit(a, None, &[1, 2]).expect("a is connected");
        assert_eq!(medium.pending(a), 0);
        assert_eq!(medium.pending(b), 1);
        assert_eq!(medium.pending(c), 0);
        assert_eq!(medium.take(b), Some((vec![1, 2], DEFAULT_RSSI)));
    }

    #[test]
    fn disconnected_sender_gets_no_ack() {
        let medium = Medium::new();
        let a = medium.attach();
        medium.attach();
        medium.set_connected(a, false);
        assert_eq!(medium.transmit(a, None, &[1]), Err(NetstackError::TxNoAck));
    }

    #[test]
    fn unicast_is_acked_only_by_a_connected_owner() {
        let medium = Medium::new();
        let a = medium.attach();
        let b = medium.attach();
        let bob = LinkAddr::new([2; 8]);
        medium.set_owner(b, bob);

        assert_eq!(medium.transmit(a, Some(bob), &[1]), Ok(()));
        assert_eq!(medium.transmit(a, Some(LinkAddr::new([9; 8])), &[2]), Err(NetstackError::TxNoAck));
        assert_eq!(medium.pending(b), 2);

        medium.set_connected(b, false);
        assert_eq!(medium.transmit(a, Some(bob), &[3]), Err(NetstackError::TxNoAck));
        assert_eq!(medium.transmit(a, None, &[4]), Ok(()));
    }

    #[test]
    fn initialized_radio_answers_for_its_node() {
        let medium = Medium::new();
        let sender = medium.attach();
        let mut rf = LoopbackRf::new(&medium);
        let mut node = NodeContext::default();
        rf.init(&mut node).expect("init");

        assert_eq!(medium.transmit(sender, Some(node.link_addr), &[1]), Ok(()));
    }

    #[test]
    fn jammed_medium_fails_channel_access() {
        let medium = Medium::new();
        let a = medium.attach();
        medium.set_jammed(true);
        assert_eq!(medium.transmit(a, None, &[1]), Err(NetstackError::ChannelAccessFailure));
    }

    #[test]
    fn radio_settings_follow_ioctls() {
        let medium = Medium::new();
        let mut rf = LoopbackRf::new(&medium);
        let mut node = NodeContext::default();
        rf.init(&mut node).expect("init");

        let mut value = IoctlValue::None;
        rf.ioctl(IoctlCmd::RfTxPowerGet, &mut value, &mut node).expect("get power");
        assert_eq!(value.as_i8(), Ok(11));

        rf.ioctl(IoctlCmd::RfSensSet, &mut IoctlValue::I8(-90), &mut node).expect("set sens");
        rf.ioctl(IoctlCmd::RfSensGet, &mut value, &mut node).expect("get sens");
        assert_eq!(value.as_i8(), Ok(-90));

        rf.ioctl(IoctlCmd::RfSyncSet, &mut IoctlValue::U16(0x7e7e), &mut node).expect("set sync");
        rf.ioctl(IoctlCmd::RfSyncGet, &mut value, &mut node).expect("get sync");
        assert_eq!(value.as_u64(), Ok(0x7e7e));

        assert_eq!(
            rf.ioctl(IoctlCmd::RfSyncSet, &mut IoctlValue::U32(0x1_0000), &mut node),
            Err(NetstackError::InvalidArgument)
        );
        assert_eq!(
            rf.ioctl(IoctlCmd::TschStateGet, &mut value, &mut node),
            Err(NetstackError::CmdUnsupported)
        );
    }

    #[test]
    fn clear_channel_reflects_jamming() {
        let medium = Medium::new();
        let mut rf = LoopbackRf::new(&medium);
        let mut node = NodeContext::default();
        let mut value = IoctlValue::None;

        rf.ioctl(IoctlCmd::RfCcaGet, &mut value, &mut node).expect("cca");
        assert_eq!(value.as_bool(), Ok(true));
        medium.set_jammed(true);
        rf.ioctl(IoctlCmd::RfCcaGet, &mut value, &mut node).expect("cca");
        assert_eq!(value.as_bool(), Ok(false));
    }
}
