use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use netstack::drivers::{
    Framer802154, LoopbackRf, Mac802154, Medium, NullFramer, NullHc, NullLlc, NullMac, NullPhy,
    NullRf, NullSec,
};
use netstack::{
    Chain, Driver, FrameBuf, FrameInfo, Framer, HeaderCompressor, IoctlCmd, IoctlValue, LinkAddr,
    LinkSecurity, MacPhyConfig, Module, Netstack, NetstackError, NodeContext, ParsedFrame, Result,
    Role, Roles,
};

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .is_test(true)
            .try_init();
    });
}

type Journal = Rc<RefCell<Vec<String>>>;

/// Stand-in for any role that journals lifecycle calls.
struct Probe {
    label: &'static str,
    journal: Journal,
    fail_init: bool,
}

impl Probe {
    fn new(label: &'static str, journal: &Journal) -> Self {
        Self { label, journal: Rc::clone(journal), fail_init: false }
    }

    fn failing(mut self) -> Self {
        self.fail_init = true;
        self
    }

    fn note(&self, event: &str) {
        self.journal.borrow_mut().push(format!("{event}:{}", self.label));
    }
}

impl Driver for Probe {
    fn name(&self) -> &'static str {
        self.label
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        self.note("init");
        if self.fail_init {
            return Err(NetstackError::Fatal);
        }
        Ok(())
    }

    fn on(&mut self, _node: &mut NodeContext) -> Result<()> {
        self.note("on");
        Ok(())
    }

    fn off(&mut self, _node: &mut NodeContext) -> Result<()> {
        self.note("off");
        Ok(())
    }
}

impl Module for Probe {
    fn send(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        if chain.has_below() {
            chain.send_down(data)
        } else {
            Ok(())
        }
    }

    fn recv(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        if chain.has_above() {
            chain.deliver_up(data)
        } else {
            Ok(())
        }
    }
}

impl Framer for Probe {
    fn header_len(&self, _info: &FrameInfo) -> usize {
        0
    }

    fn create(&mut self, _info: &FrameInfo, payload: &[u8], out: &mut FrameBuf) -> Result<usize> {
        out.reset();
        out.write(payload)?;
        Ok(0)
    }

    fn parse(&self, _frame: &[u8]) -> Result<ParsedFrame> {
        Ok(ParsedFrame::default())
    }
}

impl HeaderCompressor for Probe {
    fn compress(&mut self, packet: &[u8], out: &mut FrameBuf) -> Result<()> {
        out.reset();
        out.write(packet).map(|_| ())
    }

    fn decompress(&mut self, payload: &[u8], out: &mut FrameBuf) -> Result<()> {
        self.compress(payload, out)
    }
}

impl LinkSecurity for Probe {
    fn overhead(&self) -> usize {
        0
    }

    fn on_frame_created(&mut self, _frame: &mut FrameBuf, _header_len: usize) -> Result<()> {
        Ok(())
    }

    fn input(&mut self, _frame: &mut FrameBuf, _parsed: &ParsedFrame) -> Result<()> {
        Ok(())
    }
}

fn probe_roles(journal: &Journal, failing: Option<&'static str>) -> Roles {
    let probe = |label: &'static str| {
        let probe = Probe::new(label, journal);
        if failing == Some(label) {
            probe.failing()
        } else {
            probe
        }
    };
    Roles::new(
        probe("framer"),
        probe("hc"),
        probe("llsec"),
        probe("llc"),
        probe("mac"),
        probe("phy"),
        probe("rf"),
    )
}

fn null_roles(rf: impl Module + 'static) -> Roles {
    Roles::new(NullFramer, NullHc, NullSec, NullLlc::new(), NullMac, NullPhy, rf)
}

fn node(last: u8) -> NodeContext {
    let mut addr = [0x00, 0x50, 0xc2, 0xff, 0xfe, 0xa8, 0xdd, 0x00];
    addr[7] = last;
    NodeContext::new(MacPhyConfig::new(LinkAddr::new(addr)))
}

fn capture_rx(stack: &mut Netstack, role: Role) -> Rc<RefCell<Vec<Vec<u8>>>> {
    let frames = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&frames);
    let mut slot = IoctlValue::RxCallback(Some(Box::new(move |data: &[u8]| {
        sink.borrow_mut().push(data.to_vec());
        Ok(())
    })));
    stack.ioctl(role, IoctlCmd::RxCallbackSet, &mut slot).expect("rx callback accepted");
    frames
}

#[test]
fn missing_role_leaves_the_stack_unconfigured() {
    setup();
    let mut stack = Netstack::new(NodeContext::default());
    let mut roles = null_roles(NullRf);
    roles.hc = None;

    assert_eq!(stack.configure(roles), Err(NetstackError::Init));
    assert!(!stack.is_configured());
    assert_eq!(stack.initialize(), Err(NetstackError::Init));
    assert_eq!(stack.send(&[1, 2, 3]), Err(NetstackError::Init));
    assert_eq!(stack.recv(&[1, 2, 3]), Err(NetstackError::Init));
    assert_eq!(
        stack.ioctl(Role::Rf, IoctlCmd::RfRssiGet, &mut IoctlValue::None),
        Err(NetstackError::Init)
    );
}

#[test]
fn configured_but_uninitialized_stack_refuses_traffic() {
    setup();
    let mut stack = Netstack::new(NodeContext::default());
    stack.configure(null_roles(NullRf)).expect("configured");
    assert!(stack.is_configured());
    assert_eq!(stack.send(&[1]), Err(NetstackError::Init));
    assert_eq!(stack.process(), Err(NetstackError::Init));
}

#[test]
fn bindings_are_write_once() {
    setup();
    let mut stack = Netstack::new(NodeContext::default());
    stack.configure(null_roles(NullRf)).expect("configured");
    assert_eq!(stack.configure(null_roles(NullRf)), Err(NetstackError::InvalidArgument));
    assert_eq!(stack.driver_name(Role::Llc), Some("llc-null"));
}

#[test]
fn layers_initialize_innermost_first_exactly_once() {
    setup();
    let journal = Journal::default();
    let mut stack = Netstack::new(NodeContext::default());
    stack.configure(probe_roles(&journal, None)).expect("configured");

    netstack::runtime::init(&mut stack).expect("stack comes up");
    assert_eq!(stack.initialize(), Err(NetstackError::InvalidArgument));
    stack.off().expect("off");

    let expected: Vec<String> = [
        "init:rf", "init:phy", "init:mac", "init:llc", "init:hc", "init:llsec", "init:framer",
        "on:rf", "on:phy", "on:mac", "on:llc", "on:hc", "on:llsec", "on:framer",
        "off:framer", "off:llsec", "off:hc", "off:llc", "off:mac", "off:phy", "off:rf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(*journal.borrow(), expected);
}

#[test]
fn null_link_address_is_never_brought_up() {
    setup();
    let journal = Journal::default();
    let mut stack = Netstack::new(NodeContext::new(MacPhyConfig::new(LinkAddr::NULL)));
    stack.configure(probe_roles(&journal, None)).expect("configured");

    assert_eq!(netstack::runtime::init(&mut stack), Err(NetstackError::InvalidArgument));
    assert!(!stack.is_initialized());
    assert!(journal.borrow().is_empty());
    assert_eq!(stack.send(&[1]), Err(NetstackError::Init));

    stack.node_mut().link_addr = LinkAddr::new([0x02, 0, 0, 0, 0, 0, 0, 0x01]);
    netstack::runtime::init(&mut stack).expect("addressed node comes up");
}

#[test]
fn first_init_failure_aborts_the_sequence() {
    setup();
    let journal = Journal::default();
    let mut stack = Netstack::new(NodeContext::default());
    stack.configure(probe_roles(&journal, Some("mac"))).expect("configured");

    assert_eq!(stack.initialize(), Err(NetstackError::Fatal));
    assert!(!stack.is_initialized());
    assert_eq!(*journal.borrow(), vec!["init:rf", "init:phy", "init:mac"]);
    assert_eq!(stack.send(&[1]), Err(NetstackError::Init));
}

#[test]
fn null_stack_bytes_arrive_unchanged_at_the_peer_radio() {
    setup();
    let medium = Medium::new();
    let mut sender = Netstack::new(node(1));
    sender.configure(null_roles(LoopbackRf::new(&medium))).expect("configured");
    let mut peer = Netstack::new(node(2));
    peer.configure(null_roles(LoopbackRf::new(&medium))).expect("configured");

    netstack::runtime::init(&mut sender).expect("sender up");
    netstack::runtime::init(&mut peer).expect("peer up");
    let at_rf = capture_rx(&mut peer, Role::Rf);
    let at_llc = capture_rx(&mut peer, Role::Llc);

    sender.send(&[0x01, 0x02, 0x03]).expect("sent");
    assert!(at_rf.borrow().is_empty(), "nothing delivered before the peer polls");

    peer.process().expect("peer drains its radio");
    assert_eq!(*at_rf.borrow(), vec![vec![0x01, 0x02, 0x03]]);
    assert_eq!(*at_llc.borrow(), vec![vec![0x01, 0x02, 0x03]]);
}

#[test]
fn switched_off_radio_refuses_to_send() {
    setup();
    let medium = Medium::new();
    let mut stack = Netstack::new(node(1));
    stack.configure(null_roles(LoopbackRf::new(&medium))).expect("configured");
    netstack::runtime::init(&mut stack).expect("up");

    stack.ioctl(Role::Rf, IoctlCmd::RfSwitch, &mut IoctlValue::Bool(false)).expect("switch");
    assert_eq!(stack.send(&[1]), Err(NetstackError::RF_SEND));
}

#[test]
fn unsupported_commands_are_not_failures() {
    setup();
    let mut stack = Netstack::new(NodeContext::default());
    stack.configure(null_roles(NullRf)).expect("configured");
    stack.initialize().expect("init");

    for role in [Role::Framer, Role::Hc, Role::Llsec, Role::Mac, Role::Phy, Role::Rf] {
        assert_eq!(
            stack.ioctl(role, IoctlCmd::RfTxPowerGet, &mut IoctlValue::None),
            Err(NetstackError::CmdUnsupported),
            "{role:?}"
        );
    }
}

/// Appends a frame counter after framing and rejects counters it has seen.
#[derive(Default)]
struct CounterSec {
    next: u8,
    highest_seen: Option<u8>,
}

impl Driver for CounterSec {
    fn name(&self) -> &'static str {
        "llsec-counter"
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }
}

impl LinkSecurity for CounterSec {
    fn overhead(&self) -> usize {
        1
    }

    fn on_frame_created(&mut self, frame: &mut FrameBuf, _header_len: usize) -> Result<()> {
        self.next += 1;
        frame.write_byte(self.next).map(|_| ())
    }

    fn input(&mut self, frame: &mut FrameBuf, _parsed: &ParsedFrame) -> Result<()> {
        let counter = *frame.as_slice().last().ok_or(NetstackError::InvalidFrame)?;
        if self.highest_seen.is_some_and(|seen| counter <= seen) {
            return Err(NetstackError::InvalidFrame);
        }
        self.highest_seen = Some(counter);
        frame.truncate(frame.len() - 1);
        Ok(())
    }
}

fn secured_stack(medium: &Medium, last: u8) -> Netstack {
    let mut stack = Netstack::new(node(last));
    stack
        .configure(Roles::new(
            Framer802154::new(),
            NullHc,
            CounterSec::default(),
            NullLlc::new(),
            Mac802154::new(),
            NullPhy,
            LoopbackRf::new(medium),
        ))
        .expect("configured");
    netstack::runtime::init(&mut stack).expect("up");
    stack
}

#[test]
fn replayed_frames_never_reach_the_llc() {
    setup();
    let medium = Medium::new();
    let mut alice = secured_stack(&medium, 1);
    let mut bob = secured_stack(&medium, 2);
    let on_air = capture_rx(&mut bob, Role::Rf);
    let delivered = capture_rx(&mut bob, Role::Llc);

    alice.send_to(bob.node().link_addr, b"hello").expect("sent");
    bob.process().expect("processed");
    assert_eq!(*delivered.borrow(), vec![b"hello".to_vec()]);

    let replay = on_air.borrow()[0].clone();
    assert_eq!(bob.recv(&replay), Err(NetstackError::InvalidFrame));
    assert_eq!(delivered.borrow().len(), 1);
}

#[test]
fn frames_from_a_foreign_pan_are_dropped() {
    setup();
    let medium = Medium::new();
    let mut alice = secured_stack(&medium, 1);
    let mut bob = Netstack::new({
        let mut ctx = node(2);
        ctx.mac_phy.set_pan_id(0x1234);
        ctx
    });
    bob.configure(Roles::new(
        Framer802154::new(),
        NullHc,
        NullSec,
        NullLlc::new(),
        Mac802154::new(),
        NullPhy,
        LoopbackRf::new(&medium),
    ))
    .expect("configured");
    netstack::runtime::init(&mut bob).expect("up");
    let delivered = capture_rx(&mut bob, Role::Llc);

    alice.send(b"anyone").expect("sent");
    bob.process().expect("processed");
    assert!(delivered.borrow().is_empty());
}
