use crate::config::MacPhyConfig;
use crate::linkaddr::LinkAddr;

/// Per-node state shared by every layer of one netstack instance.
///
/// Each stack owns its own context, so several stacks can run side by side
/// in one process (simulation) without sharing flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    pub link_addr: LinkAddr,
    pub is_coordinator: bool,
    pub is_associated: bool,
    pub is_pan_secured: bool,
    pub mac_phy: MacPhyConfig,
}

impl NodeContext {
    pub fn new(mac_phy: MacPhyConfig) -> Self {
        Self {
            link_addr: mac_phy.mac_address,
            is_coordinator: false,
            is_associated: false,
            is_pan_secured: false,
            mac_phy,
        }
    }

    pub fn coordinator(mut self) -> Self {
        self.is_coordinator = true;
        self
    }

    pub fn pan_id(&self) -> u16 {
        self.mac_phy.pan_id
    }
}

impl Default for NodeContext {
    fn default() -> Self {
        Self::new(MacPhyConfig::default())
    }
}
