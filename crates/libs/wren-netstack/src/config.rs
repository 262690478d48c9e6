use serde::{Deserialize, Serialize};

use crate::linkaddr::LinkAddr;

pub const DEFAULT_MAC_ADDRESS: LinkAddr =
    LinkAddr::new([0x00, 0x50, 0xc2, 0xff, 0xfe, 0xa8, 0xdd, 0xdd]);
pub const DEFAULT_PAN_ID: u16 = 0xabcd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modulation {
    Qpsk100,
    #[default]
    Bpsk20,
}

/// Initial MAC and PHY parameters. Changing them at runtime requires the
/// radio layers to be re-initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacPhyConfig {
    pub mac_address: LinkAddr,
    pub pan_id: u16,
    /// Initial TX power in dBm.
    pub init_power: i8,
    /// Initial RX sensitivity in dBm.
    pub init_sensitivity: i8,
    pub modulation: Modulation,
}

impl MacPhyConfig {
    pub fn new(mac_address: LinkAddr) -> Self {
        Self { mac_address, ..Self::default() }
    }

    pub fn set_pan_id(&mut self, pan_id: u16) {
        self.pan_id = pan_id;
    }

    pub fn set_init_power(&mut self, dbm: i8) {
        self.init_power = dbm;
    }

    pub fn set_init_sensitivity(&mut self, dbm: i8) {
        self.init_sensitivity = dbm;
    }
}

impl Default for MacPhyConfig {
    fn default() -> Self {
        Self {
            mac_address: DEFAULT_MAC_ADDRESS,
            pan_id: DEFAULT_PAN_ID,
            init_power: 11,
            init_sensitivity: -100,
            modulation: Modulation::Bpsk20,
        }
    }
}
