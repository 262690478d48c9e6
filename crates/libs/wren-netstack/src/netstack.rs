use crate::chain::{Chain, PacketAttrs};
use crate::error::{NetstackError, Result};
use crate::ioctl::{IoctlCmd, IoctlValue};
use crate::linkaddr::LinkAddr;
use crate::module::{Framer, HeaderCompressor, LinkSecurity, Module};
use crate::node::NodeContext;

const LLC: usize = 0;
const MAC: usize = 1;
const PHY: usize = 2;
const RF: usize = 3;

#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Role {
    Framer,
    Hc,
    Llsec,
    Llc,
    Mac,
    Phy,
    Rf,
}

impl Role {
    /// Initialization order, innermost first.
    pub const INIT_ORDER: [Role; 7] =
        [Role::Rf, Role::Phy, Role::Mac, Role::Llc, Role::Hc, Role::Llsec, Role::Framer];
}

/// Driver bindings handed to [`Netstack::configure`].
#[derive(Default)]
pub struct Roles {
    pub framer: Option<Box<dyn Framer>>,
    pub hc: Option<Box<dyn HeaderCompressor>>,
    pub llsec: Option<Box<dyn LinkSecurity>>,
    pub llc: Option<Box<dyn Module>>,
    pub mac: Option<Box<dyn Module>>,
    pub phy: Option<Box<dyn Module>>,
    pub rf: Option<Box<dyn Module>>,
}

impl Roles {
    pub fn new(
        framer: impl Framer + 'static,
        hc: impl HeaderCompressor + 'static,
        llsec: impl LinkSecurity + 'static,
        llc: impl Module + 'static,
        mac: impl Module + 'static,
        phy: impl Module + 'static,
        rf: impl Module + 'static,
    ) -> Self {
        Self {
            framer: Some(Box::new(framer)),
            hc: Some(Box::new(hc)),
            llsec: Some(Box::new(llsec)),
            llc: Some(Box::new(llc)),
            mac: Some(Box::new(mac)),
            phy: Some(Box::new(phy)),
            rf: Some(Box::new(rf)),
        }
    }

    fn missing(&self) -> Option<Role> {
        if self.framer.is_none() {
            Some(Role::Framer)
        } else if self.hc.is_none() {
            Some(Role::Hc)
        } else if self.llsec.is_none() {
            Some(Role::Llsec)
        } else if self.llc.is_none() {
            Some(Role::Llc)
        } else if self.mac.is_none() {
            Some(Role::Mac)
        } else if self.phy.is_none() {
            Some(Role::Phy)
        } else if self.rf.is_none() {
            Some(Role::Rf)
        } else {
            None
        }
    }
}

struct Bound {
    framer: Box<dyn Framer>,
    hc: Box<dyn HeaderCompressor>,
    llsec: Box<dyn LinkSecurity>,
    /// LLC, MAC, PHY, RF.
    layers: Vec<Box<dyn Module>>,
}

/// Runs `$body` with `$driver` bound to the driver of `$role`.
macro_rules! with_driver {
    ($bound:expr, $role:expr, |$driver:ident| $body:expr) => {
        match $role {
            Role::Framer => {
                let $driver = $bound.framer.as_mut();
                $body
            }
            Role::Hc => {
                let $driver = $bound.hc.as_mut();
                $body
            }
            Role::Llsec => {
                let $driver = $bound.llsec.as_mut();
                $body
            }
            Role::Llc => {
                let $driver = $bound.layers[LLC].as_mut();
                $body
            }
            Role::Mac => {
                let $driver = $bound.layers[MAC].as_mut();
                $body
            }
            Role::Phy => {
                let $driver = $bound.layers[PHY].as_mut();
                $body
            }
            Role::Rf => {
                let $driver = $bound.layers[RF].as_mut();
                $body
            }
        }
    };
}

/// One node's protocol stack: seven driver roles bound once, plus the node
/// context they share.
pub struct Netstack {
    node: NodeContext,
    bound: Option<Bound>,
    initialized: bool,
}

impl Netstack {
    pub fn new(node: NodeContext) -> Self {
        Self { node, bound: None, initialized: false }
    }

    /// Binds all seven roles. A missing role leaves the stack unconfigured.
    /// Bindings are write-once.
    pub fn configure(&mut self, roles: Roles) -> Result<()> {
        if self.bound.is_some() {
            log::warn!("netstk: already configured, refusing to rebind drivers");
            return Err(NetstackError::InvalidArgument);
        }

        if let Some(role) = roles.missing() {
            log::error!("netstk: no driver bound for {:?}", role);
            return Err(NetstackError::Init);
        }

        let (
            Some(framer),
            Some(hc),
            Some(llsec),
            Some(llc),
            Some(mac),
            Some(phy),
            Some(rf),
        ) = (roles.framer, roles.hc, roles.llsec, roles.llc, roles.mac, roles.phy, roles.rf)
        else {
            return Err(NetstackError::Init);
        };

        log::debug!(
            "netstk: configured llc={} mac={} phy={} rf={} framer={} hc={} llsec={}",
            llc.name(),
            mac.name(),
            phy.name(),
            rf.name(),
            framer.name(),
            hc.name(),
            llsec.name()
        );

        self.bound = Some(Bound { framer, hc, llsec, layers: vec![llc, mac, phy, rf] });
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.bound.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn node(&self) -> &NodeContext {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut NodeContext {
        &mut self.node
    }

    /// Initializes every role once, innermost first. The first failure
    /// aborts the sequence and is returned. A node without a link address
    /// (all zero) is never brought up.
    pub fn initialize(&mut self) -> Result<()> {
        let bound = self.bound.as_mut().ok_or(NetstackError::Init)?;
        if self.initialized {
            return Err(NetstackError::InvalidArgument);
        }
        if self.node.link_addr.is_null() {
            log::error!("netstk: refusing to initialize a node with the null link address");
            return Err(NetstackError::InvalidArgument);
        }

        for role in Role::INIT_ORDER {
            let node = &mut self.node;
            with_driver!(bound, role, |driver| {
                if let Err(err) = driver.init(node) {
                    log::error!("netstk: init of {} ({:?}) failed: {}", driver.name(), role, err);
                    return Err(err);
                }
            });
        }

        self.initialized = true;
        log::info!("netstk: initialized node {}", self.node.link_addr);
        Ok(())
    }

    /// Switches every role on, innermost first.
    pub fn on(&mut self) -> Result<()> {
        let bound = Self::ready_bound(&mut self.bound, self.initialized)?;
        for role in Role::INIT_ORDER {
            let node = &mut self.node;
            with_driver!(bound, role, |driver| driver.on(node))?;
        }
        Ok(())
    }

    /// Switches every role off, outermost first.
    pub fn off(&mut self) -> Result<()> {
        let bound = Self::ready_bound(&mut self.bound, self.initialized)?;
        for role in Role::INIT_ORDER.iter().rev() {
            let node = &mut self.node;
            with_driver!(bound, *role, |driver| driver.off(node))?;
        }
        Ok(())
    }

    /// Broadcast send entering at the LLC.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.send_with(data, PacketAttrs::default())
    }

    /// Unicast send entering at the LLC.
    pub fn send_to(&mut self, dst: LinkAddr, data: &[u8]) -> Result<()> {
        self.send_with(data, PacketAttrs::to(dst))
    }

    fn send_with(&mut self, data: &[u8], attrs: PacketAttrs) -> Result<()> {
        let bound = Self::ready_bound(&mut self.bound, self.initialized)?;
        let (top, below) = bound.layers.split_at_mut(MAC);
        let mut chain = Chain::new(
            &mut [],
            below,
            bound.framer.as_mut(),
            bound.hc.as_mut(),
            bound.llsec.as_mut(),
            &mut self.node,
        )
        .with_attrs(attrs);
        top[LLC].send(data, &mut chain)
    }

    /// Hands a frame received by the radio to the RF driver, which delivers
    /// it upward.
    pub fn recv(&mut self, data: &[u8]) -> Result<()> {
        let bound = Self::ready_bound(&mut self.bound, self.initialized)?;
        let (above, rf) = bound.layers.split_at_mut(RF);
        let mut chain = Chain::new(
            above,
            &mut [],
            bound.framer.as_mut(),
            bound.hc.as_mut(),
            bound.llsec.as_mut(),
            &mut self.node,
        );
        rf[0].recv(data, &mut chain)
    }

    /// Lets every layer run its deferred work once, innermost first.
    /// Recoverable errors are logged; unrecoverable ones stop the round.
    pub fn process(&mut self) -> Result<()> {
        let bound = Self::ready_bound(&mut self.bound, self.initialized)?;

        for index in (LLC..=RF).rev() {
            let (above, rest) = bound.layers.split_at_mut(index);
            let Some((layer, below)) = rest.split_first_mut() else {
                continue;
            };
            let mut chain = Chain::new(
                above,
                below,
                bound.framer.as_mut(),
                bound.hc.as_mut(),
                bound.llsec.as_mut(),
                &mut self.node,
            );
            if let Err(err) = layer.poll(&mut chain) {
                if !err.is_recoverable() {
                    log::error!("netstk: {} poll failed: {}", layer.name(), err);
                    return Err(err);
                }
                log::warn!("netstk: {} poll: {}", layer.name(), err);
            }
        }

        Ok(())
    }

    pub fn ioctl(&mut self, role: Role, cmd: IoctlCmd, value: &mut IoctlValue) -> Result<()> {
        let bound = self.bound.as_mut().ok_or(NetstackError::Init)?;
        let node = &mut self.node;
        with_driver!(bound, role, |driver| driver.ioctl(cmd, value, node))
    }

    pub fn driver_name(&self, role: Role) -> Option<&'static str> {
        let bound = self.bound.as_ref()?;
        Some(match role {
            Role::Framer => bound.framer.name(),
            Role::Hc => bound.hc.name(),
            Role::Llsec => bound.llsec.name(),
            Role::Llc => bound.layers[LLC].name(),
            Role::Mac => bound.layers[MAC].name(),
            Role::Phy => bound.layers[PHY].name(),
            Role::Rf => bound.layers[RF].name(),
        })
    }

    fn ready_bound(bound: &mut Option<Bound>, initialized: bool) -> Result<&mut Bound> {
        match bound {
            Some(bound) if initialized => Ok(bound),
            _ => Err(NetstackError::Init),
        }
    }
}
