//! Type-length-value records used by mesh link establishment (MLE) and the
//! network layer.
//!
//! Each record is one type byte, one length byte and `length` value bytes;
//! messages are flat concatenations of records. Reading goes through
//! [`TlvCursor`], which never trusts a declared length: a record that runs
//! past the end of the buffer is reported as [`TlvError::Truncated`]. Typed
//! views such as [`LeaderData`] borrow the value bytes of one record and
//! check its length once, on construction.

use core::fmt;
use std::net::Ipv6Addr;

use netstack::{NetstackError, OutputBuffer};

use crate::addr::Rloc16;

pub const TLV_HEADER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TlvError {
    #[error("record at offset {offset} overruns the buffer")]
    Truncated { offset: usize },
    #[error("value of {0} bytes does not fit a length byte")]
    ValueTooLong(usize),
    #[error("output buffer full")]
    BufferFull,
    #[error("tlv type {ty} is not {expected}")]
    UnexpectedType { ty: u8, expected: u8 },
    #[error("tlv type {ty} has a {found} byte value")]
    BadLength { ty: u8, found: usize },
}

impl From<TlvError> for NetstackError {
    fn from(err: TlvError) -> Self {
        match err {
            TlvError::BufferFull | TlvError::ValueTooLong(_) => NetstackError::BufOverflow,
            _ => NetstackError::InvalidFrame,
        }
    }
}

/// MLE record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlvType {
    SourceAddress = 0,
    Mode = 1,
    Timeout = 2,
    Challenge = 3,
    Response = 4,
    LinkLayerFrameCounter = 5,
    LinkQuality = 6,
    NetworkParameter = 7,
    MleFrameCounter = 8,
    Route64 = 9,
    Address16 = 10,
    LeaderData = 11,
    NetworkData = 12,
    TlvRequest = 13,
    ScanMask = 14,
    Connectivity = 15,
    LinkMargin = 16,
    Status = 17,
    Version = 18,
    AddressRegistration = 19,
}

impl TlvType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use TlvType::*;
        Some(match value {
            0 => SourceAddress,
            1 => Mode,
            2 => Timeout,
            3 => Challenge,
            4 => Response,
            5 => LinkLayerFrameCounter,
            6 => LinkQuality,
            7 => NetworkParameter,
            8 => MleFrameCounter,
            9 => Route64,
            10 => Address16,
            11 => LeaderData,
            12 => NetworkData,
            13 => TlvRequest,
            14 => ScanMask,
            15 => Connectivity,
            16 => LinkMargin,
            17 => Status,
            18 => Version,
            19 => AddressRegistration,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceAddress => "SOURCE_ADDRESS",
            Self::Mode => "MODE",
            Self::Timeout => "TIME_OUT",
            Self::Challenge => "CHALLENGE",
            Self::Response => "RESPONSE",
            Self::LinkLayerFrameCounter => "LINK_LAYER_FRAME_COUNTER",
            Self::LinkQuality => "LINK_QUALITY",
            Self::NetworkParameter => "NETWORK_PARAMETER",
            Self::MleFrameCounter => "MLE_FRAME_COUNTER",
            Self::Route64 => "ROUTE64",
            Self::Address16 => "ADDRESS16",
            Self::LeaderData => "LEADER_DATA",
            Self::NetworkData => "NETWORK_DATA",
            Self::TlvRequest => "TLV_REQUEST",
            Self::ScanMask => "SCAN_MASK",
            Self::Connectivity => "CONNECTIVITY",
            Self::LinkMargin => "LINK_MARGIN",
            Self::Status => "STATUS",
            Self::Version => "VERSION",
            Self::AddressRegistration => "ADDRESS_REGISTRATION",
        }
    }
}

impl From<TlvType> for u8 {
    fn from(ty: TlvType) -> Self {
        ty as u8
    }
}

impl fmt::Display for TlvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Network-layer (address query / registration) record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NetTlvType {
    TargetEid = 0,
    MacExtendedAddress = 1,
    Rloc16 = 2,
    MlEid = 3,
    Status = 4,
    LastTransactionTime = 6,
    RouterMask = 7,
}

impl NetTlvType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::TargetEid,
            1 => Self::MacExtendedAddress,
            2 => Self::Rloc16,
            3 => Self::MlEid,
            4 => Self::Status,
            6 => Self::LastTransactionTime,
            7 => Self::RouterMask,
            _ => return None,
        })
    }
}

impl From<NetTlvType> for u8 {
    fn from(ty: NetTlvType) -> Self {
        ty as u8
    }
}

/// One record borrowed from a message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvRef<'a> {
    pub ty: u8,
    pub value: &'a [u8],
    /// Position of the type byte in the scanned buffer.
    pub offset: usize,
}

impl<'a> TlvRef<'a> {
    pub fn length(&self) -> u8 {
        // Bounded by the length byte the record was read from.
        self.value.len() as u8
    }

    pub fn mle_type(&self) -> Option<TlvType> {
        TlvType::from_u8(self.ty)
    }

    fn check_type(&self, ty: impl Into<u8>) -> Result<(), TlvError> {
        let expected = ty.into();
        if self.ty != expected {
            return Err(TlvError::UnexpectedType { ty: self.ty, expected });
        }
        Ok(())
    }

    fn bad_length(&self) -> TlvError {
        TlvError::BadLength { ty: self.ty, found: self.value.len() }
    }

    fn fixed<const N: usize>(&self) -> Result<&'a [u8; N], TlvError> {
        self.value.try_into().map_err(|_| self.bad_length())
    }
}

/// Renders like `LEADER_DATA, length: 8, value: 00 00 00 01 40 02 02 05`.
impl fmt::Display for TlvRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mle_type() {
            Some(ty) => write!(f, "{ty}")?,
            None => write!(f, "type {}", self.ty)?,
        }
        write!(f, ", length: {}, value:", self.value.len())?;
        for byte in self.value {
            write!(f, " {byte:02x}")?;
        }
        Ok(())
    }
}

/// Walks the records of a buffer front to back.
///
/// Yields `Err(TlvError::Truncated)` once for a record whose header or value
/// runs past the end, then stops.
#[derive(Debug, Clone)]
pub struct TlvCursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> TlvCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for TlvCursor<'a> {
    type Item = Result<TlvRef<'a>, TlvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buf.len() {
            return None;
        }
        let offset = self.offset;
        let buf = self.buf;
        let record = match buf[offset..] {
            [ty, length, ref rest @ ..] if rest.len() >= usize::from(length) => {
                Ok(TlvRef { ty, value: &rest[..usize::from(length)], offset })
            }
            _ => Err(TlvError::Truncated { offset }),
        };
        self.offset = match &record {
            Ok(tlv) => offset + TLV_HEADER_LEN + tlv.value.len(),
            Err(_) => self.buf.len(),
        };
        Some(record)
    }
}

/// First record of type `ty` in `buf`.
///
/// Records before the match are bounds-checked; a malformed record ahead of
/// it fails the whole search.
pub fn find(buf: &[u8], ty: impl Into<u8>) -> Result<Option<TlvRef<'_>>, TlvError> {
    let ty = ty.into();
    for record in TlvCursor::new(buf) {
        let record = record?;
        if record.ty == ty {
            log::trace!("tlv: found {}", record);
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Appends records to a caller-owned buffer. A record is written whole or
/// not at all.
pub struct TlvWriter<'a> {
    out: OutputBuffer<'a>,
}

impl<'a> TlvWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { out: OutputBuffer::new(buf) }
    }

    pub fn write(&mut self, ty: impl Into<u8>, value: &[u8]) -> Result<usize, TlvError> {
        let length = u8::try_from(value.len()).map_err(|_| TlvError::ValueTooLong(value.len()))?;
        if self.out.remaining() < TLV_HEADER_LEN + value.len() {
            return Err(TlvError::BufferFull);
        }
        let map = |_: NetstackError| TlvError::BufferFull;
        self.out.write(&[ty.into(), length]).map_err(map)?;
        self.out.write(value).map_err(map)?;
        Ok(TLV_HEADER_LEN + value.len())
    }

    pub fn write_u8(&mut self, ty: impl Into<u8>, value: u8) -> Result<usize, TlvError> {
        self.write(ty, &[value])
    }

    pub fn write_u16(&mut self, ty: impl Into<u8>, value: u16) -> Result<usize, TlvError> {
        self.write(ty, &value.to_be_bytes())
    }

    pub fn write_u32(&mut self, ty: impl Into<u8>, value: u32) -> Result<usize, TlvError> {
        self.write(ty, &value.to_be_bytes())
    }

    pub fn leader_data(&mut self, leader: &LeaderDataValue) -> Result<usize, TlvError> {
        let mut value = [0u8; LeaderData::LEN];
        value[..4].copy_from_slice(&leader.partition_id.to_be_bytes());
        value[4] = leader.weighting;
        value[5] = leader.data_version;
        value[6] = leader.stable_data_version;
        value[7] = leader.leader_router_id;
        self.write(TlvType::LeaderData, &value)
    }

    pub fn target_eid(&mut self, eid: &Ipv6Addr) -> Result<usize, TlvError> {
        self.write(NetTlvType::TargetEid, &eid.octets())
    }

    pub fn rloc16(&mut self, rloc16: Rloc16) -> Result<usize, TlvError> {
        self.write(NetTlvType::Rloc16, &rloc16.to_be_bytes())
    }

    pub fn ml_eid(&mut self, iid: &[u8; 8]) -> Result<usize, TlvError> {
        self.write(NetTlvType::MlEid, iid)
    }

    pub fn len(&self) -> usize {
        self.out.offset()
    }

    pub fn is_empty(&self) -> bool {
        self.out.offset() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        self.out.as_slice()
    }
}

/// Owned leader data for writing; read through [`LeaderData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaderDataValue {
    pub partition_id: u32,
    pub weighting: u8,
    pub data_version: u8,
    pub stable_data_version: u8,
    pub leader_router_id: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderData<'a>(&'a [u8; 8]);

impl<'a> LeaderData<'a> {
    pub const LEN: usize = 8;

    pub fn new(tlv: &TlvRef<'a>) -> Result<Self, TlvError> {
        tlv.check_type(TlvType::LeaderData)?;
        Ok(Self(tlv.fixed()?))
    }

    pub fn partition_id(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn weighting(&self) -> u8 {
        self.0[4]
    }

    pub fn data_version(&self) -> u8 {
        self.0[5]
    }

    pub fn stable_data_version(&self) -> u8 {
        self.0[6]
    }

    pub fn leader_router_id(&self) -> u8 {
        self.0[7]
    }

    pub fn to_value(&self) -> LeaderDataValue {
        LeaderDataValue {
            partition_id: self.partition_id(),
            weighting: self.weighting(),
            data_version: self.data_version(),
            stable_data_version: self.stable_data_version(),
            leader_router_id: self.leader_router_id(),
        }
    }
}

/// One entry of a [`Route64`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub router_id: u8,
    pub link_quality_out: u8,
    pub link_quality_in: u8,
    pub route_cost: u8,
}

/// Router id sequence, a 64-bit router mask and one route byte per
/// allocated router id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route64<'a> {
    id_sequence: u8,
    mask: &'a [u8; 8],
    routes: &'a [u8],
}

impl<'a> Route64<'a> {
    pub fn new(tlv: &TlvRef<'a>) -> Result<Self, TlvError> {
        tlv.check_type(TlvType::Route64)?;
        let value = tlv.value;
        if value.len() < 9 {
            return Err(tlv.bad_length());
        }
        let mask: &[u8; 8] = value[1..9].try_into().map_err(|_| tlv.bad_length())?;
        let routes = &value[9..];
        let allocated: u32 = mask.iter().map(|byte| byte.count_ones()).sum();
        if routes.len() != allocated as usize {
            return Err(tlv.bad_length());
        }
        Ok(Self { id_sequence: value[0], mask, routes })
    }

    pub fn id_sequence(&self) -> u8 {
        self.id_sequence
    }

    pub fn is_allocated(&self, router_id: u8) -> bool {
        let byte = usize::from(router_id / 8);
        byte < self.mask.len() && self.mask[byte] & (0x80 >> (router_id % 8)) != 0
    }

    pub fn router_ids(&self) -> impl Iterator<Item = u8> + '_ {
        (0..64u8).filter(|router_id| self.is_allocated(*router_id))
    }

    pub fn entries(&self) -> impl Iterator<Item = RouteEntry> + '_ {
        self.router_ids().zip(self.routes.iter()).map(|(router_id, &route)| RouteEntry {
            router_id,
            link_quality_out: route >> 6,
            link_quality_in: (route >> 4) & 0x03,
            route_cost: route & 0x0f,
        })
    }
}

/// Parent connectivity advertised to children. The sleepy end device
/// fields are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity<'a>(&'a [u8]);

impl<'a> Connectivity<'a> {
    pub fn new(tlv: &TlvRef<'a>) -> Result<Self, TlvError> {
        tlv.check_type(TlvType::Connectivity)?;
        match tlv.value.len() {
            7 | 10 => Ok(Self(tlv.value)),
            _ => Err(tlv.bad_length()),
        }
    }

    /// Two-bit preference: `01` high, `00` medium, `11` low.
    pub fn parent_priority(&self) -> u8 {
        (self.0[0] >> 6) & 0x03
    }

    pub fn link_quality_3(&self) -> u8 {
        self.0[1]
    }

    pub fn link_quality_2(&self) -> u8 {
        self.0[2]
    }

    pub fn link_quality_1(&self) -> u8 {
        self.0[3]
    }

    pub fn leader_cost(&self) -> u8 {
        self.0[4]
    }

    pub fn id_sequence(&self) -> u8 {
        self.0[5]
    }

    pub fn active_routers(&self) -> u8 {
        self.0[6]
    }

    pub fn sed_buffer_size(&self) -> Option<u16> {
        self.0.get(7..9).map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn sed_datagram_count(&self) -> Option<u8> {
        self.0.get(9).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetEid<'a>(&'a [u8; 16]);

impl<'a> TargetEid<'a> {
    pub fn new(tlv: &TlvRef<'a>) -> Result<Self, TlvError> {
        tlv.check_type(NetTlvType::TargetEid)?;
        Ok(Self(tlv.fixed()?))
    }

    pub fn addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(*self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rloc16Tlv<'a>(&'a [u8; 2]);

impl<'a> Rloc16Tlv<'a> {
    pub fn new(tlv: &TlvRef<'a>) -> Result<Self, TlvError> {
        tlv.check_type(NetTlvType::Rloc16)?;
        Ok(Self(tlv.fixed()?))
    }

    pub fn rloc16(&self) -> Rloc16 {
        Rloc16::new(u16::from_be_bytes(*self.0))
    }
}

/// Mesh-local EID interface identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlEid<'a>(&'a [u8; 8]);

impl<'a> MlEid<'a> {
    pub fn new(tlv: &TlvRef<'a>) -> Result<Self, TlvError> {
        tlv.check_type(NetTlvType::MlEid)?;
        Ok(Self(tlv.fixed()?))
    }

    pub fn iid(&self) -> &[u8; 8] {
        self.0
    }
}
