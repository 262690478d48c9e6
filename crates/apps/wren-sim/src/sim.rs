use std::fmt;
use std::net::Ipv6Addr;

use rand_core::RngCore;
use wren::netstack::drivers::{Framer802154, LoopbackRf, Medium, NullHc, NullLlc, NullPhy, NullSec};
use wren::netstack::{runtime, LinkAddr, Netstack, NodeContext, Result, Roles};
use wren::thread::addr::{self, MeshLocalPrefix};
use wren::tsch::{Asn, Clock, Tsch, TschState};

use crate::config::SimConfig;

pub struct SimNode {
    pub addr: LinkAddr,
    pub stack: Netstack,
    /// Mesh-local EID drawn at start-up.
    pub ml_eid: Ipv6Addr,
}

/// Snapshot of one node for the host to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub addr: LinkAddr,
    pub state: TschState,
    pub asn: Asn,
    pub link_local: Ipv6Addr,
    pub ml_eid: Ipv6Addr,
}

impl fmt::Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} asn={} ll={} ml-eid={}",
            self.addr, self.state, self.asn, self.link_local, self.ml_eid
        )
    }
}

/// Stacks sharing one loopback medium and one clock.
pub struct Simulation {
    pub medium: Medium,
    pub nodes: Vec<SimNode>,
}

impl Simulation {
    pub fn new<C: Clock + Clone + 'static>(
        config: &SimConfig,
        clock: &C,
        rng: &mut impl RngCore,
    ) -> anyhow::Result<Self> {
        let medium = Medium::new();
        let prefix = MeshLocalPrefix::default();
        let mut nodes = Vec::with_capacity(config.nodes.len());

        for node in &config.nodes {
            let mut mac = Tsch::new(config.tsch.clone(), clock.clone());
            mac.set_coordinator(node.coordinator);
            let addr = node.mac_address;
            mac.set_event_listener(move |event| log::info!("sim({addr}): {event}"));

            let mut stack = Netstack::new(NodeContext::new(config.mac_phy(node)));
            stack.configure(Roles::new(
                Framer802154::new(),
                NullHc,
                NullSec,
                NullLlc::new(),
                mac,
                NullPhy,
                LoopbackRf::new(&medium),
            ))?;

            let ml_eid = addr::random_ml_eid(&prefix, rng)?;
            nodes.push(SimNode { addr, stack, ml_eid });
        }

        Ok(Self { medium, nodes })
    }

    pub fn start(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            runtime::init(&mut node.stack)?;
        }
        Ok(())
    }

    /// One pass of every node's process loop.
    pub fn step(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.stack.process()?;
        }
        Ok(())
    }

    pub fn associated(&mut self) -> usize {
        self.nodes
            .iter_mut()
            .map(|node| wren::tsch::state_of(&mut node.stack))
            .filter(|state| *state == Ok(TschState::Associated))
            .count()
    }

    pub fn report(&mut self) -> Result<Vec<NodeReport>> {
        self.nodes
            .iter_mut()
            .map(|node| {
                let mut link_local = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0);
                addr::set_eui64_iid(&mut link_local, &node.addr);
                Ok(NodeReport {
                    addr: node.addr,
                    state: wren::tsch::state_of(&mut node.stack)?,
                    asn: wren::tsch::asn_of(&mut node.stack)?,
                    link_local,
                    ml_eid: node.ml_eid,
                })
            })
            .collect()
    }
}
