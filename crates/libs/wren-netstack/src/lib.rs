//! Layered 802.15.4 netstack.
//!
//! A [`Netstack`] binds one driver per role and dispatches frames through
//! them. Data-path drivers implement [`Module`]; the framer, header
//! compressor and link-layer security drivers are services the MAC and LLC
//! consult while building or parsing frames.

pub mod buffer;
pub mod chain;
pub mod config;
pub mod drivers;
pub mod error;
pub mod frame;
pub mod ioctl;
pub mod linkaddr;
pub mod module;
pub mod netstack;
pub mod node;
pub mod runtime;

pub use buffer::{FrameBuf, OutputBuffer, StaticBuffer, FRAME_MAX_LEN};
pub use chain::{Chain, PacketAttrs};
pub use config::{MacPhyConfig, Modulation};
pub use error::{LprError, NetstackError, Result};
pub use frame::{Address, FrameInfo, FrameType, FrameVersion, ParsedFrame};
pub use ioctl::{IoctlCmd, IoctlValue, RxCallback, TxCallback};
pub use linkaddr::{LinkAddr, LINKADDR_SIZE};
pub use module::{Driver, Framer, HeaderCompressor, LinkSecurity, Module};
pub use netstack::{Netstack, Role, Roles};
pub use node::NodeContext;
