//! # wren
//!
//! Meta-crate re-exporting the wren library crates.
//!
//! Instead of depending on each crate individually:
//!
//! ```toml
//! [dependencies]
//! wren-netstack = "0.1"
//! wren-tsch = "0.1"
//! wren-thread = "0.1"
//! ```
//!
//! You can depend on the meta-crate:
//!
//! ```toml
//! [dependencies]
//! wren = "0.1"
//! ```
//!
//! ## Crate Family
//!
//! - `wren-netstack`: driver contract, dispatch chain and reference drivers
//! - `wren-tsch`: time-slotted channel hopping MAC
//! - `wren-thread`: mesh addressing and the MLE TLV codec

/// Driver contract, netstack composition and reference drivers.
pub use netstack;

/// Time-slotted channel hopping MAC driver.
pub use tsch;

/// Mesh-local/RLOC addressing and TLV codec.
pub use thread_mesh as thread;
