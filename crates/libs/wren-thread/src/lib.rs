//! Thread-style mesh addressing and the TLV codec carried by mesh link
//! establishment messages.

pub mod addr;
pub mod tlv;

pub use addr::{AddrError, MeshLocalPrefix, Rloc16, MAX_ROUTER_ID};
pub use tlv::{
    find, Connectivity, LeaderData, LeaderDataValue, MlEid, NetTlvType, Rloc16Tlv, Route64,
    RouteEntry, TargetEid, TlvCursor, TlvError, TlvRef, TlvType, TlvWriter,
};
