//! Driver contract shared by every netstack role.
//!
//! A netstack is a fixed chain of roles:
//!
//! ```text
//!   LLC -> MAC -> PHY -> RF          data path (Module)
//!   framer, header compressor,       services consulted by MAC/LLC
//!   link-layer security
//! ```
//!
//! Every role implements [`Driver`] for its lifecycle and out-of-band
//! control. The data-path roles additionally implement [`Module`] and are
//! handed a [`Chain`] that lets them reach the layer directly below (when
//! sending) or above (when receiving), and nothing else.

use crate::buffer::FrameBuf;
use crate::chain::Chain;
use crate::error::{NetstackError, Result};
use crate::frame::{FrameInfo, ParsedFrame};
use crate::ioctl::{IoctlCmd, IoctlValue};
use crate::node::NodeContext;

pub trait Driver {
    /// Stable driver identifier used in logs.
    fn name(&self) -> &'static str;

    /// One-time setup. Called exactly once, after every layer this one
    /// depends on has been initialized.
    fn init(&mut self, node: &mut NodeContext) -> Result<()>;

    fn on(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }

    /// Must be safe to call repeatedly and without a prior `on`.
    fn off(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }

    fn ioctl(
        &mut self,
        _cmd: IoctlCmd,
        _value: &mut IoctlValue,
        _node: &mut NodeContext,
    ) -> Result<()> {
        Err(NetstackError::CmdUnsupported)
    }
}

/// LLC, MAC, PHY and RF drivers.
pub trait Module: Driver {
    /// Hands a frame downward. Returns once this layer has queued or
    /// transmitted it; a frame is never dropped without an error.
    fn send(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()>;

    /// Delivers a frame upward. Invoked by the layer below.
    fn recv(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()>;

    /// Runs deferred work (drained receive queues, timers) from the
    /// cooperative loop.
    fn poll(&mut self, _chain: &mut Chain<'_>) -> Result<()> {
        Ok(())
    }
}

pub trait Framer: Driver {
    fn header_len(&self, info: &FrameInfo) -> usize;

    /// Writes header and payload into `out`, returning the header length.
    fn create(&mut self, info: &FrameInfo, payload: &[u8], out: &mut FrameBuf) -> Result<usize>;

    fn parse(&self, frame: &[u8]) -> Result<ParsedFrame>;
}

pub trait HeaderCompressor: Driver {
    fn compress(&mut self, packet: &[u8], out: &mut FrameBuf) -> Result<()>;

    fn decompress(&mut self, payload: &[u8], out: &mut FrameBuf) -> Result<()>;
}

pub trait LinkSecurity: Driver {
    /// Bytes appended to every secured frame.
    fn overhead(&self) -> usize;

    /// Runs once the framer has written the complete frame; may append an
    /// authentication tag covering the whole frame.
    fn on_frame_created(&mut self, frame: &mut FrameBuf, header_len: usize) -> Result<()>;

    /// Verifies (and strips) security material of an inbound frame. Replayed
    /// or unauthenticated frames fail with [`NetstackError::InvalidFrame`].
    fn input(&mut self, frame: &mut FrameBuf, parsed: &ParsedFrame) -> Result<()>;
}
