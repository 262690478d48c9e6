//! Frame metadata exchanged between MAC drivers and framers.

use core::fmt;

use crate::linkaddr::LinkAddr;

pub const BROADCAST_SHORT_ADDR: u16 = 0xffff;
pub const BROADCAST_PAN_ID: u16 = 0xffff;

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum FrameType {
    Beacon = 0b000,
    #[default]
    Data = 0b001,
    Ack = 0b010,
    MacCommand = 0b011,
}

impl FrameType {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b111 {
            0b000 => Some(Self::Beacon),
            0b001 => Some(Self::Data),
            0b010 => Some(Self::Ack),
            0b011 => Some(Self::MacCommand),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum FrameVersion {
    Ieee802154_2003 = 0b00,
    #[default]
    Ieee802154_2006 = 0b01,
    Ieee802154_2015 = 0b10,
}

impl FrameVersion {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b00 => Some(Self::Ieee802154_2003),
            0b01 => Some(Self::Ieee802154_2006),
            0b10 => Some(Self::Ieee802154_2015),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum Address {
    #[default]
    Absent,
    Short(u16),
    Extended(LinkAddr),
}

impl Address {
    pub const BROADCAST: Self = Self::Short(BROADCAST_SHORT_ADDR);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_absent(&self) -> bool {
        *self == Self::Absent
    }

    /// Addressing mode as encoded in the frame control field.
    pub fn mode(&self) -> u8 {
        match self {
            Self::Absent => 0b00,
            Self::Short(_) => 0b10,
            Self::Extended(_) => 0b11,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Absent => 0,
            Self::Short(_) => 2,
            Self::Extended(_) => 8,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_link_addr(&self) -> Option<LinkAddr> {
        match self {
            Self::Extended(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl From<Option<LinkAddr>> for Address {
    /// `None` and the null address map to the broadcast address.
    fn from(addr: Option<LinkAddr>) -> Self {
        match addr {
            Some(addr) if !addr.is_null() => Self::Extended(addr),
            _ => Self::BROADCAST,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "-"),
            Self::Short(addr) => write!(f, "{addr:04x}"),
            Self::Extended(addr) => write!(f, "{addr}"),
        }
    }
}

/// Header fields a framer needs to synthesize, or recovers when parsing.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct FrameInfo {
    pub frame_type: FrameType,
    pub version: FrameVersion,
    pub security_enabled: bool,
    pub frame_pending: bool,
    pub ack_request: bool,
    pub ie_present: bool,
    pub seq: u8,
    pub dst_pan: u16,
    pub dst: Address,
    pub src_pan: u16,
    pub src: Address,
}

impl FrameInfo {
    pub fn data(seq: u8, pan_id: u16, src: LinkAddr, dst: Option<LinkAddr>) -> Self {
        let dst = Address::from(dst);
        Self {
            frame_type: FrameType::Data,
            ack_request: !dst.is_broadcast(),
            seq,
            dst_pan: pan_id,
            dst,
            src_pan: pan_id,
            src: Address::Extended(src),
            ..Self::default()
        }
    }

    pub fn is_for(&self, pan_id: u16, addr: &LinkAddr) -> bool {
        let pan_ok = self.dst_pan == pan_id || self.dst_pan == BROADCAST_PAN_ID;
        let addr_ok = match self.dst {
            Address::Absent => true,
            Address::Short(short) => short == BROADCAST_SHORT_ADDR,
            Address::Extended(dst) => dst == *addr,
        };
        pan_ok && addr_ok
    }
}

/// Result of parsing a received frame header.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct ParsedFrame {
    pub info: FrameInfo,
    pub header_len: usize,
}
