//! Netstack error taxonomy.
//!
//! Codes are stable and grouped in numeric bands so that layer specific
//! errors can be added without renumbering the common set:
//!
//! ```text
//!   0..=10   common
//!   100..    LLC
//!   200..    MAC
//!   300..    PHY
//!   400..    low-power radio (LPR)
//!   500..    RF
//! ```
//!
//! `NONE` (code 0) has no variant; success is `Ok(())`.

pub type Result<T> = core::result::Result<T, NetstackError>;

const LLC_BAND: u16 = 100;
const MAC_BAND: u16 = 200;
const PHY_BAND: u16 = 300;
const LPR_BAND: u16 = 400;
const RF_BAND: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum NetstackError {
    #[error("netstack not initialized")]
    Init,
    #[error("layer busy")]
    Busy,
    #[error("buffer overflow")]
    BufOverflow,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid frame")]
    InvalidFrame,
    #[error("transmission timeout")]
    TxTimeout,
    #[error("transmission not acknowledged")]
    TxNoAck,
    #[error("command unsupported")]
    CmdUnsupported,
    #[error("channel access failure")]
    ChannelAccessFailure,
    #[error("fatal netstack error")]
    Fatal,
    #[error("llc error {0}")]
    Llc(u8),
    #[error("mac error {0}")]
    Mac(u8),
    #[error("phy error {0}")]
    Phy(u8),
    #[error("low-power radio error: {0:?}")]
    Lpr(LprError),
    #[error("rf error {0}")]
    Rf(u8),
}

/// Detail codes of the low-power radio band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LprError {
    Unspecified = 0,
    UnsupportedFrame = 1,
    BroadcastLastStrobe = 2,
    BroadcastNoAck = 3,
    InvalidAddr = 4,
    TxCollisionSameDest = 5,
    TxCollisionDiffDest = 6,
    InvalidAck = 7,
    NoStrobe = 8,
}

impl LprError {
    fn from_detail(detail: u8) -> Option<Self> {
        Some(match detail {
            0 => Self::Unspecified,
            1 => Self::UnsupportedFrame,
            2 => Self::BroadcastLastStrobe,
            3 => Self::BroadcastNoAck,
            4 => Self::InvalidAddr,
            5 => Self::TxCollisionSameDest,
            6 => Self::TxCollisionDiffDest,
            7 => Self::InvalidAck,
            8 => Self::NoStrobe,
            _ => return None,
        })
    }
}

impl NetstackError {
    /// The top layer has no receiver registered for inbound data.
    pub const LLC_NO_RECEIVER: Self = Self::Llc(1);
    /// The radio refused to start a transmission.
    pub const RF_SEND: Self = Self::Rf(1);

    pub fn code(&self) -> u16 {
        match *self {
            Self::Init => 1,
            Self::Busy => 2,
            Self::BufOverflow => 3,
            Self::InvalidArgument => 4,
            Self::InvalidFrame => 5,
            Self::TxTimeout => 6,
            Self::TxNoAck => 7,
            Self::CmdUnsupported => 8,
            Self::ChannelAccessFailure => 9,
            Self::Fatal => 10,
            Self::Llc(detail) => LLC_BAND + u16::from(detail),
            Self::Mac(detail) => MAC_BAND + u16::from(detail),
            Self::Phy(detail) => PHY_BAND + u16::from(detail),
            Self::Lpr(detail) => LPR_BAND + detail as u16,
            Self::Rf(detail) => RF_BAND + u16::from(detail),
        }
    }

    /// Maps a numeric code back to an error. Code 0 (`NONE`) and codes
    /// outside every band yield `None`.
    pub fn from_code(code: u16) -> Option<Self> {
        let detail = |band: u16| u8::try_from(code - band).ok();
        match code {
            1 => Some(Self::Init),
            2 => Some(Self::Busy),
            3 => Some(Self::BufOverflow),
            4 => Some(Self::InvalidArgument),
            5 => Some(Self::InvalidFrame),
            6 => Some(Self::TxTimeout),
            7 => Some(Self::TxNoAck),
            8 => Some(Self::CmdUnsupported),
            9 => Some(Self::ChannelAccessFailure),
            10 => Some(Self::Fatal),
            100..=199 => detail(LLC_BAND).map(Self::Llc),
            200..=299 => detail(MAC_BAND).map(Self::Mac),
            300..=399 => detail(PHY_BAND).map(Self::Phy),
            400..=499 => detail(LPR_BAND).and_then(LprError::from_detail).map(Self::Lpr),
            500..=599 => detail(RF_BAND).map(Self::Rf),
            _ => None,
        }
    }

    /// Fatal and uninitialized-stack conditions cannot be handled inside the
    /// stack; the host decides whether to reset.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Init | Self::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_codes_match_the_published_numbering() {
        assert_eq!(NetstackError::Init.code(), 1);
        assert_eq!(NetstackError::CmdUnsupported.code(), 8);
        assert_eq!(NetstackError::ChannelAccessFailure.code(), 9);
        assert_eq!(NetstackError::Fatal.code(), 10);
        assert_eq!(NetstackError::RF_SEND.code(), 501);
        assert_eq!(NetstackError::Lpr(LprError::InvalidAck).code(), 407);
    }

    #[test]
    fn codes_map_back_to_errors() {
        for code in [1u16, 5, 8, 10, 100, 101, 250, 399, 401, 408, 501] {
            let err = NetstackError::from_code(code).expect("code in band");
            assert_eq!(err.code(), code);
        }
        assert_eq!(NetstackError::from_code(0), None);
        assert_eq!(NetstackError::from_code(11), None);
        assert_eq!(NetstackError::from_code(409), None);
        assert_eq!(NetstackError::from_code(600), None);
    }

    #[test]
    fn unsupported_command_is_distinct_from_failure() {
        assert_ne!(NetstackError::CmdUnsupported, NetstackError::Fatal);
        assert!(NetstackError::CmdUnsupported.is_recoverable());
        assert!(!NetstackError::Fatal.is_recoverable());
        assert!(!NetstackError::Init.is_recoverable());
    }
}
