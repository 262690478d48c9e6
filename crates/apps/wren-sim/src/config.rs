use serde::de::Error as _;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use wren::netstack::config::DEFAULT_PAN_ID;
use wren::netstack::{LinkAddr, MacPhyConfig};
use wren::tsch::TschConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Host loop period in milliseconds.
    pub tick_ms: u64,
    pub pan_id: u16,
    pub tsch: TschConfig,
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    pub mac_address: LinkAddr,
    #[serde(default)]
    pub coordinator: bool,
    pub tx_power: Option<i8>,
}

impl SimConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        let config: Self = toml::from_str(input)?;
        if config.nodes.iter().any(|node| node.mac_address.is_null()) {
            return Err(toml::de::Error::custom("mac_address must not be all zero"));
        }
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    /// One coordinator followed by `count - 1` joining nodes.
    pub fn with_node_count(count: usize) -> Self {
        let nodes = (0..count.max(1))
            .map(|index| NodeConfig {
                mac_address: node_address(index),
                coordinator: index == 0,
                tx_power: None,
            })
            .collect();
        Self { nodes, ..Self::default() }
    }

    pub fn mac_phy(&self, node: &NodeConfig) -> MacPhyConfig {
        let mut mac_phy = MacPhyConfig::new(node.mac_address);
        mac_phy.set_pan_id(self.pan_id);
        if let Some(dbm) = node.tx_power {
            mac_phy.set_init_power(dbm);
        }
        mac_phy
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            pan_id: DEFAULT_PAN_ID,
            tsch: TschConfig::default(),
            nodes: Vec::new(),
        }
    }
}

fn node_address(index: usize) -> LinkAddr {
    let [hi, lo] = (index as u16 + 1).to_be_bytes();
    LinkAddr::new([0x00, 0x50, 0xc2, 0xff, 0xfe, 0xa8, hi, lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_builds_one_coordinator() {
        let config = SimConfig::with_node_count(3);
        assert_eq!(config.nodes.len(), 3);
        assert!(config.nodes[0].coordinator);
        assert!(!config.nodes[1].coordinator && !config.nodes[2].coordinator);
        assert_eq!(config.nodes[2].mac_address.to_string(), "00:50:c2:ff:fe:a8:00:03");
    }

    #[test]
    fn null_mac_address_is_rejected() {
        let err = SimConfig::from_toml(
            r#"
            [[nodes]]
            mac_address = "0000000000000000"
            coordinator = true
            "#,
        )
        .expect_err("null address");
        assert!(err.to_string().contains("all zero"));
    }

    #[test]
    fn parses_nodes_and_tsch_overrides() {
        let config = SimConfig::from_toml(
            r#"
            tick_ms = 5
            pan_id = 0x1234

            [tsch]
            max_join_priority = 8
            listen_only = true

            [[nodes]]
            mac_address = "02:00:00:00:00:00:00:01"
            coordinator = true

            [[nodes]]
            mac_address = "0200000000000002"
            tx_power = -3
            "#,
        )
        .expect("valid config");

        assert_eq!(config.tick_ms, 5);
        assert_eq!(config.tsch.max_join_priority, 8);
        assert!(config.tsch.listen_only);
        assert_eq!(config.tsch.ka_timeout, TschConfig::default().ka_timeout);

        let joiner = &config.nodes[1];
        assert!(!joiner.coordinator);
        let mac_phy = config.mac_phy(joiner);
        assert_eq!(mac_phy.pan_id, 0x1234);
        assert_eq!(mac_phy.init_power, -3);
        assert_eq!(mac_phy.mac_address, LinkAddr::new([2, 0, 0, 0, 0, 0, 0, 2]));
    }
}
