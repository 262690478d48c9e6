use crate::buffer::FrameBuf;
use crate::chain::Chain;
use crate::error::{NetstackError, Result};
use crate::frame::{FrameInfo, FrameType};
use crate::ioctl::{IoctlCmd, IoctlValue, TxCallback};
use crate::module::{Driver, Module};
use crate::node::NodeContext;

const DEFAULT_MAX_BACKOFF_ATTEMPTS: u8 = 4;

/// Unslotted CSMA MAC.
///
/// Outbound packets are compressed, framed and secured (in that order) and
/// retried while the channel is busy. Inbound frames are verified by link
/// security before address filtering and decompression.
pub struct Mac802154 {
    seq: u8,
    max_backoff_attempts: u8,
    tx_callback: Option<TxCallback>,
}

impl Mac802154 {
    pub fn new() -> Self {
        Self { seq: 0, max_backoff_attempts: DEFAULT_MAX_BACKOFF_ATTEMPTS, tx_callback: None }
    }

    pub fn with_max_backoff_attempts(mut self, attempts: u8) -> Self {
        self.max_backoff_attempts = attempts;
        self
    }

    fn next_seq(&mut self) -> u8 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    fn transmit(&mut self, frame: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        let mut attempt = 0u8;
        loop {
            match chain.send_down(frame) {
                Err(NetstackError::ChannelAccessFailure) if attempt < self.max_backoff_attempts => {
                    attempt += 1;
                    log::debug!("mac: channel busy, backoff attempt {}", attempt);
                }
                result => return result,
            }
        }
    }
}

impl Default for Mac802154 {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for Mac802154 {
    fn name(&self) -> &'static str {
        "mac-802154"
    }

    fn init(&mut self, node: &mut NodeContext) -> Result<()> {
        self.seq = node.link_addr.as_bytes()[7];
        Ok(())
    }

    fn ioctl(&mut self, cmd: IoctlCmd, value: &mut IoctlValue, _node: &mut NodeContext) -> Result<()> {
        match cmd {
            IoctlCmd::TxCallbackSet => {
                self.tx_callback = value.take_tx_callback()?;
                Ok(())
            }
            _ => Err(NetstackError::CmdUnsupported),
        }
    }
}

impl Module for Mac802154 {
    fn send(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        let mut payload = FrameBuf::new();
        chain.hc().compress(data, &mut payload)?;

        let seq = self.next_seq();
        let node = chain.node();
        let mut info = FrameInfo::data(seq, node.pan_id(), node.link_addr, chain.attrs().dst);
        info.security_enabled = node.is_pan_secured;

        let mut frame = FrameBuf::new();
        let header_len = chain.framer().create(&info, payload.as_slice(), &mut frame)?;
        chain.llsec().on_frame_created(&mut frame, header_len)?;

        let result = self.transmit(frame.as_slice(), chain);
        if let Err(err) = result {
            log::debug!("mac: seq {} to {} failed: {}", seq, info.dst, err);
        }
        if let Some(callback) = self.tx_callback.as_mut() {
            callback(result);
        }
        result
    }

    fn recv(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        let parsed = chain.framer().parse(data)?;
        let mut frame = FrameBuf::new_from_slice(data)?;
        chain.llsec().input(&mut frame, &parsed)?;

        let pan_id = chain.node().pan_id();
        let link_addr = chain.node().link_addr;
        if !parsed.info.is_for(pan_id, &link_addr) {
            log::trace!("mac: frame for {} filtered", parsed.info.dst);
            return Ok(());
        }
        if parsed.info.frame_type != FrameType::Data {
            log::trace!("mac: ignoring {:?} frame", parsed.info.frame_type);
            return Ok(());
        }

        let payload = frame.as_slice().get(parsed.header_len..).ok_or(NetstackError::InvalidFrame)?;
        let mut packet = FrameBuf::new();
        chain.hc().decompress(payload, &mut packet)?;

        chain.attrs_mut().src = parsed.info.src.as_link_addr();
        chain.deliver_up(packet.as_slice())
    }
}
