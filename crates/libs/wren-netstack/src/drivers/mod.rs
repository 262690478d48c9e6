//! Reference drivers.
//!
//! The null drivers pass frames through untouched and make a stack usable
//! before any real radio or MAC exists. [`LoopbackRf`] joins several stacks
//! over an in-memory [`Medium`]; [`Framer802154`] and [`Mac802154`] give a
//! plain CSMA-style 802.15.4 link on top of it.

mod framer802154;
mod loopback;
mod mac802154;
mod null;

pub use framer802154::Framer802154;
pub use loopback::{LoopbackRf, Medium, PortId};
pub use mac802154::Mac802154;
pub use null::{NullFramer, NullHc, NullLlc, NullMac, NullPhy, NullRf, NullSec};
