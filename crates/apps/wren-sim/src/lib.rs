//! Runs several wren nodes over a shared loopback medium.

pub mod config;
pub mod sim;

pub use config::{NodeConfig, SimConfig};
pub use sim::{NodeReport, SimNode, Simulation};
