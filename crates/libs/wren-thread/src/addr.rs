//! Mesh-local, RLOC and EUI-64 derived IPv6 addresses.
//!
//! An RLOC interface identifier is `0000:00ff:fe00:<rloc16>`. Random
//! identifiers must never collide with that pattern; [`set_random_iid`] does
//! not retry on its own, callers check [`is_iid_valid`] or use
//! [`random_ml_eid`].

use core::fmt;
use std::net::Ipv6Addr;

use netstack::LinkAddr;
use rand_core::RngCore;

/// First six bytes of every RLOC interface identifier.
pub const RLOC_IID_PATTERN: [u8; 6] = [0x00, 0x00, 0x00, 0xff, 0xfe, 0x00];

pub const MAX_ROUTER_ID: u8 = 62;

const ROUTER_ID_SHIFT: u16 = 10;
const CHILD_ID_MASK: u16 = 0x01ff;
const UNIVERSAL_LOCAL_BIT: u8 = 0x02;
const LINK_LOCAL_PREFIX: [u8; 8] = [0xfe, 0x80, 0, 0, 0, 0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AddrError {
    #[error("router id {0} out of range (max {MAX_ROUTER_ID})")]
    RouterIdOutOfRange(u8),
    #[error("child id {0} exceeds 9 bits")]
    ChildIdOutOfRange(u16),
    #[error("no valid interface identifier after {0} attempts")]
    IidExhausted(usize),
}

/// Upper 64 bits shared by every address of one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshLocalPrefix([u8; 8]);

impl MeshLocalPrefix {
    pub const fn new(prefix: [u8; 8]) -> Self {
        Self(prefix)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        addr.octets()[..8] == self.0
    }
}

/// `fd00::/64`
impl Default for MeshLocalPrefix {
    fn default() -> Self {
        Self([0xfd, 0x00, 0, 0, 0, 0, 0, 0])
    }
}

impl fmt::Display for MeshLocalPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut octets = [0u8; 16];
        octets[..8].copy_from_slice(&self.0);
        write!(f, "{}/64", Ipv6Addr::from(octets))
    }
}

/// Routing locator: router id in the top 6 bits, child id in the low 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rloc16(u16);

impl Rloc16 {
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn from_router_id(router_id: u8) -> Result<Self, AddrError> {
        Self::from_parts(router_id, 0)
    }

    pub fn from_parts(router_id: u8, child_id: u16) -> Result<Self, AddrError> {
        if router_id > MAX_ROUTER_ID {
            return Err(AddrError::RouterIdOutOfRange(router_id));
        }
        if child_id > CHILD_ID_MASK {
            return Err(AddrError::ChildIdOutOfRange(child_id));
        }
        Ok(Self((u16::from(router_id) << ROUTER_ID_SHIFT) | child_id))
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn router_id(&self) -> u8 {
        (self.0 >> ROUTER_ID_SHIFT) as u8
    }

    pub fn child_id(&self) -> u16 {
        self.0 & CHILD_ID_MASK
    }

    pub fn is_router(&self) -> bool {
        self.child_id() == 0
    }

    pub fn is_valid(&self) -> bool {
        self.router_id() <= MAX_ROUTER_ID
    }

    pub fn to_be_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl From<Rloc16> for u16 {
    fn from(rloc16: Rloc16) -> Self {
        rloc16.0
    }
}

impl fmt::Display for Rloc16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

fn update(addr: &mut Ipv6Addr, f: impl FnOnce(&mut [u8; 16])) {
    let mut octets = addr.octets();
    f(&mut octets);
    *addr = Ipv6Addr::from(octets);
}

pub fn set_mesh_local_prefix(addr: &mut Ipv6Addr, prefix: &MeshLocalPrefix) {
    update(addr, |octets| octets[..8].copy_from_slice(prefix.as_bytes()));
}

/// Fills the interface identifier from `rng`. The result may hit the
/// reserved RLOC pattern.
pub fn set_random_iid(addr: &mut Ipv6Addr, rng: &mut impl RngCore) {
    update(addr, |octets| rng.fill_bytes(&mut octets[8..]));
}

/// False for identifiers in the reserved `0000:00ff:fe00:xxxx` range.
pub fn is_iid_valid(addr: &Ipv6Addr) -> bool {
    addr.octets()[8..14] != RLOC_IID_PATTERN
}

pub fn set_rloc_iid(addr: &mut Ipv6Addr, rloc16: Rloc16) {
    update(addr, |octets| {
        octets[8..14].copy_from_slice(&RLOC_IID_PATTERN);
        octets[14..].copy_from_slice(&rloc16.to_be_bytes());
    });
}

/// Modified EUI-64 identifier of `link`.
pub fn set_eui64_iid(addr: &mut Ipv6Addr, link: &LinkAddr) {
    update(addr, |octets| {
        octets[8..].copy_from_slice(link.as_bytes());
        octets[8] ^= UNIVERSAL_LOCAL_BIT;
    });
}

/// Router id of an RLOC address. Only meaningful when the address passes
/// [`is_link_local_rloc`] or [`is_mesh_local_rloc`].
pub fn extract_router_id(addr: &Ipv6Addr) -> u8 {
    extract_rloc16(addr).router_id()
}

pub fn extract_rloc16(addr: &Ipv6Addr) -> Rloc16 {
    let octets = addr.octets();
    Rloc16(u16::from_be_bytes([octets[14], octets[15]]))
}

/// Router id of an RLOC link address, see [`is_rloc_linkaddr`].
pub fn router_id_from_linkaddr(link: &LinkAddr) -> u8 {
    rloc16_from_linkaddr(link).router_id()
}

pub fn rloc16_from_linkaddr(link: &LinkAddr) -> Rloc16 {
    let bytes = link.as_bytes();
    Rloc16(u16::from_be_bytes([bytes[6], bytes[7]]))
}

pub fn is_link_local_rloc(addr: &Ipv6Addr) -> bool {
    addr.octets()[..8] == LINK_LOCAL_PREFIX && !is_iid_valid(addr)
}

pub fn is_mesh_local_rloc(addr: &Ipv6Addr, prefix: &MeshLocalPrefix) -> bool {
    prefix.contains(addr) && !is_iid_valid(addr)
}

/// Link addresses carrying an RLOC16 use the RLOC identifier layout.
pub fn is_rloc_linkaddr(link: &LinkAddr) -> bool {
    link.as_bytes()[..6] == RLOC_IID_PATTERN
}

pub fn is_rloc16_valid(rloc16: u16) -> bool {
    Rloc16(rloc16).is_valid()
}

/// Link-local RLOC address of router `router_id`.
pub fn next_hop_addr(router_id: u8) -> Result<Ipv6Addr, AddrError> {
    let rloc16 = Rloc16::from_router_id(router_id)?;
    let mut addr = Ipv6Addr::UNSPECIFIED;
    update(&mut addr, |octets| octets[..8].copy_from_slice(&LINK_LOCAL_PREFIX));
    set_rloc_iid(&mut addr, rloc16);
    Ok(addr)
}

pub fn invert_universal_local_bit(link: &mut LinkAddr) {
    let mut bytes = link.to_bytes();
    bytes[0] ^= UNIVERSAL_LOCAL_BIT;
    *link = LinkAddr::new(bytes);
}

/// RLOC link address for `rloc16`.
pub fn rloc_linkaddr(rloc16: Rloc16) -> LinkAddr {
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&RLOC_IID_PATTERN);
    bytes[6..].copy_from_slice(&rloc16.to_be_bytes());
    LinkAddr::new(bytes)
}

/// Mesh-local EID under `prefix`, drawing identifiers until one is valid.
pub fn random_ml_eid(prefix: &MeshLocalPrefix, rng: &mut impl RngCore) -> Result<Ipv6Addr, AddrError> {
    const ATTEMPTS: usize = 8;

    let mut addr = Ipv6Addr::UNSPECIFIED;
    set_mesh_local_prefix(&mut addr, prefix);
    for _ in 0..ATTEMPTS {
        set_random_iid(&mut addr, rng);
        if is_iid_valid(&addr) {
            return Ok(addr);
        }
        log::debug!("thrd: random iid collided with the rloc range, drawing again");
    }
    Err(AddrError::IidExhausted(ATTEMPTS))
}
