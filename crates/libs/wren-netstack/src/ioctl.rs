//! Out-of-band I/O control commands and their values.

use core::fmt;

use crate::error::{NetstackError, Result};

/// Called by a layer once a transmission it accepted has completed.
pub type TxCallback = Box<dyn FnMut(Result<()>)>;

/// Receives every frame a layer delivers to its registered observer.
pub type RxCallback = Box<dyn FnMut(&[u8]) -> Result<()>>;

/// I/O control commands. Numeric values are grouped in the same bands as
/// [`NetstackError`] so each layer can grow its own command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum IoctlCmd {
    TxCallbackSet = 1,
    RxCallbackSet = 3,

    // MAC (200..)
    TschJoinPrioritySet = 201,
    TschJoinPriorityGet = 202,
    TschEbPeriodSet = 203,
    TschKaTimeoutSet = 204,
    TschCoordinatorSet = 205,
    TschPanSecuredSet = 206,
    TschStateGet = 207,
    TschAsnGet = 208,
    TschLeave = 209,

    // RF (500..)
    RfTxPowerSet = 501,
    RfTxPowerGet = 502,
    RfSensSet = 503,
    RfSensGet = 504,
    RfRssiGet = 505,
    RfCcaGet = 506,
    RfAntDivSet = 507,
    RfSwitch = 508,
    RfIsRxBusy = 509,
    RfIsTxBusy = 510,
    RfSyncSet = 511,
    RfSyncGet = 512,
}

impl IoctlCmd {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        use IoctlCmd::*;
        Some(match code {
            1 => TxCallbackSet,
            3 => RxCallbackSet,
            201 => TschJoinPrioritySet,
            202 => TschJoinPriorityGet,
            203 => TschEbPeriodSet,
            204 => TschKaTimeoutSet,
            205 => TschCoordinatorSet,
            206 => TschPanSecuredSet,
            207 => TschStateGet,
            208 => TschAsnGet,
            209 => TschLeave,
            501 => RfTxPowerSet,
            502 => RfTxPowerGet,
            503 => RfSensSet,
            504 => RfSensGet,
            505 => RfRssiGet,
            506 => RfCcaGet,
            507 => RfAntDivSet,
            508 => RfSwitch,
            509 => RfIsRxBusy,
            510 => RfIsTxBusy,
            511 => RfSyncSet,
            512 => RfSyncGet,
            _ => return None,
        })
    }
}

/// Argument and result slot of an ioctl call. Getters overwrite the slot,
/// setters read it.
#[derive(Default)]
pub enum IoctlValue {
    #[default]
    None,
    Bool(bool),
    I8(i8),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    TxCallback(Option<TxCallback>),
    RxCallback(Option<RxCallback>),
}

impl IoctlValue {
    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Self::Bool(v) => Ok(v),
            _ => Err(NetstackError::InvalidArgument),
        }
    }

    pub fn as_i8(&self) -> Result<i8> {
        match *self {
            Self::I8(v) => Ok(v),
            _ => Err(NetstackError::InvalidArgument),
        }
    }

    pub fn as_u8(&self) -> Result<u8> {
        match *self {
            Self::U8(v) => Ok(v),
            _ => Err(NetstackError::InvalidArgument),
        }
    }

    pub fn as_u32(&self) -> Result<u32> {
        match *self {
            Self::U32(v) => Ok(v),
            _ => Err(NetstackError::InvalidArgument),
        }
    }

    /// Accepts any unsigned integer slot.
    pub fn as_u64(&self) -> Result<u64> {
        match *self {
            Self::U8(v) => Ok(u64::from(v)),
            Self::U16(v) => Ok(u64::from(v)),
            Self::U32(v) => Ok(u64::from(v)),
            Self::U64(v) => Ok(v),
            _ => Err(NetstackError::InvalidArgument),
        }
    }

    pub fn take_tx_callback(&mut self) -> Result<Option<TxCallback>> {
        match self {
            Self::TxCallback(cb) => Ok(cb.take()),
            _ => Err(NetstackError::InvalidArgument),
        }
    }

    pub fn take_rx_callback(&mut self) -> Result<Option<RxCallback>> {
        match self {
            Self::RxCallback(cb) => Ok(cb.take()),
            _ => Err(NetstackError::InvalidArgument),
        }
    }
}

impl fmt::Debug for IoctlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::I8(v) => write!(f, "I8({v})"),
            Self::U8(v) => write!(f, "U8({v})"),
            Self::U16(v) => write!(f, "U16({v})"),
            Self::U32(v) => write!(f, "U32({v})"),
            Self::U64(v) => write!(f, "U64({v})"),
            Self::TxCallback(cb) => write!(f, "TxCallback({})", cb.is_some()),
            Self::RxCallback(cb) => write!(f, "RxCallback({})", cb.is_some()),
        }
    }
}
