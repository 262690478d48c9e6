//! TSCH MAC driver.
//!
//! The driver runs two loops over one [`Clock`]. The synchronization loop
//! (association polls, EB and keep-alive timers, desync supervision) moves
//! the node between [`TschState`]s; the slot loop walks the schedule one
//! timeslot at a time and is the only place frames are handed to the layer
//! below. Both are entries in a [`TaskQueue`] drained from [`Module::poll`],
//! so no timer ever fires inside the receive path.

use std::collections::VecDeque;

use netstack::{
    Address, Chain, Driver, FrameBuf, FrameInfo, FrameType, FrameVersion, IoctlCmd, IoctlValue,
    LinkAddr, Module, NetstackError, NodeContext, Result, TxCallback,
};

use crate::asn::Asn;
use crate::clock::Clock;
use crate::config::TschConfig;
use crate::eb::{self, EnhancedBeacon};
use crate::events::{EventListener, TschEvent};
use crate::queue::{FrameKind, Outgoing, TxQueues};
use crate::schedule::{channel_at, LinkType, Schedule};
use crate::tasks::{TaskQueue, TschTask};

/// Consecutive synchronizations after which the keep-alive timeout grows.
pub const ADAPTIVE_CONVERGENCE_SYNCS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TschState {
    #[default]
    Unassociated = 0,
    Scanning = 1,
    Associated = 2,
    Leaving = 3,
}

impl TryFrom<u8> for TschState {
    type Error = NetstackError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Unassociated),
            1 => Ok(Self::Scanning),
            2 => Ok(Self::Associated),
            3 => Ok(Self::Leaving),
            _ => Err(NetstackError::InvalidArgument),
        }
    }
}

struct Candidate {
    addr: LinkAddr,
    beacon: EnhancedBeacon,
    info: FrameInfo,
}

pub struct Tsch<C: Clock> {
    config: TschConfig,
    clock: C,
    state: TschState,
    running: bool,
    coordinator: bool,
    pan_secured: bool,
    tasks: TaskQueue,
    asn_base: Asn,
    asn_epoch: u64,
    schedule: Schedule,
    join_priority: u8,
    time_source: Option<LinkAddr>,
    last_sync: u64,
    ka_timeout: u64,
    eb_period: u64,
    consecutive_syncs: u8,
    eb_pending: bool,
    queues: TxQueues,
    seq: u8,
    candidates: Vec<Candidate>,
    events: VecDeque<TschEvent>,
    listener: Option<EventListener>,
    tx_callback: Option<TxCallback>,
}

impl<C: Clock> Tsch<C> {
    pub fn new(config: TschConfig, clock: C) -> Self {
        Self {
            clock,
            state: TschState::Unassociated,
            running: false,
            coordinator: false,
            pan_secured: false,
            tasks: TaskQueue::new(),
            asn_base: Asn::default(),
            asn_epoch: 0,
            schedule: Schedule::new(),
            join_priority: 0,
            time_source: None,
            last_sync: 0,
            ka_timeout: config.ka_timeout,
            eb_period: config.eb_period,
            consecutive_syncs: 0,
            eb_pending: false,
            queues: TxQueues::new(config.queue_capacity),
            seq: 0,
            candidates: Vec::new(),
            events: VecDeque::new(),
            listener: None,
            tx_callback: None,
            config,
        }
    }

    /// Originate the PAN instead of joining one.
    pub fn set_coordinator(&mut self, enable: bool) {
        self.coordinator = enable;
    }

    pub fn set_pan_secured(&mut self, enable: bool) {
        self.pan_secured = enable;
    }

    pub fn set_join_priority(&mut self, priority: u8) {
        self.join_priority = priority;
    }

    pub fn set_eb_period(&mut self, ticks: u64) {
        self.eb_period = ticks.clamp(1, self.config.max_eb_period.max(1));
    }

    pub fn set_ka_timeout(&mut self, ticks: u64) {
        self.ka_timeout = ticks.max(1);
    }

    /// Receives every event drained by [`Tsch::process_pending_events`].
    pub fn set_event_listener(&mut self, listener: impl FnMut(&TschEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn state(&self) -> TschState {
        self.state
    }

    pub fn config(&self) -> &TschConfig {
        &self.config
    }

    pub fn join_priority(&self) -> u8 {
        self.join_priority
    }

    pub fn time_source(&self) -> Option<LinkAddr> {
        self.time_source
    }

    pub fn ka_timeout(&self) -> u64 {
        self.ka_timeout
    }

    pub fn eb_period(&self) -> u64 {
        self.eb_period
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn asn(&self) -> Asn {
        if self.state == TschState::Associated {
            self.asn_at(self.clock.now())
        } else {
            self.asn_base
        }
    }

    /// Hands queued events to the listener. Runs at the end of every poll;
    /// never called from the receive path.
    pub fn process_pending_events(&mut self) {
        while let Some(event) = self.events.pop_front() {
            log::debug!("tsch: {}", event);
            if let Some(listener) = self.listener.as_mut() {
                listener(&event);
            }
        }
    }

    fn asn_at(&self, now: u64) -> Asn {
        let slots = now.saturating_sub(self.asn_epoch) / self.timeslot_length();
        self.asn_base.add(slots)
    }

    fn time_of(&self, asn: Asn) -> u64 {
        self.asn_epoch.saturating_add(asn.since(self.asn_base).saturating_mul(self.timeslot_length()))
    }

    fn timeslot_length(&self) -> u64 {
        self.config.timeslot_length.max(1)
    }

    fn next_seq(&mut self) -> u8 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    fn set_state(&mut self, to: TschState) {
        if self.state != to {
            self.events.push_back(TschEvent::StateChanged { from: self.state, to });
            self.state = to;
        }
    }

    fn start_coordinator(&mut self, now: u64, node: &mut NodeContext) {
        self.asn_base = Asn::new(0);
        self.asn_epoch = now;
        self.schedule = Schedule::minimal(self.config.slotframe_length);
        self.time_source = None;
        self.last_sync = now;
        node.is_associated = true;
        node.is_pan_secured = self.pan_secured;

        self.set_state(TschState::Associated);
        self.events.push_back(TschEvent::ScheduleChanged { slotframes: self.schedule.slotframes().len() });
        if !self.config.listen_only {
            self.tasks.schedule(now, TschTask::SendEb);
        }
        self.tasks.schedule(now, TschTask::Slot);
        log::info!("tsch: coordinating PAN {:#06x} as {}", node.pan_id(), node.link_addr);
    }

    fn start_scanning(&mut self, now: u64) {
        self.set_state(TschState::Scanning);
        self.tasks.schedule(now + self.config.association_poll_interval(), TschTask::AssociationPoll);
    }

    fn associate(&mut self, now: u64, addr: LinkAddr, beacon: EnhancedBeacon, info: &FrameInfo, node: &mut NodeContext) {
        self.asn_base = beacon.asn;
        self.asn_epoch = now;
        self.schedule = if self.config.init_schedule_from_eb && !beacon.slotframes.is_empty() {
            Schedule::from_slotframes(beacon.slotframes)
        } else {
            Schedule::minimal(self.config.slotframe_length)
        };
        self.time_source = Some(addr);
        self.join_priority = beacon.join_priority.saturating_add(1);
        self.last_sync = now;
        self.ka_timeout = self.config.ka_timeout.max(1);
        self.eb_period = self.config.eb_period.max(1);
        self.consecutive_syncs = 0;
        self.candidates.clear();

        if !self.config.join_my_panid_only {
            node.mac_phy.set_pan_id(info.src_pan);
        }
        node.is_pan_secured = info.security_enabled;
        node.is_associated = true;

        self.tasks.cancel(TschTask::AssociationPoll);
        self.set_state(TschState::Associated);
        self.events.push_back(TschEvent::Joined { time_source: addr, join_priority: self.join_priority });
        self.events.push_back(TschEvent::ScheduleChanged { slotframes: self.schedule.slotframes().len() });

        self.tasks.schedule(self.time_of(self.asn_base.add(1)), TschTask::Slot);
        self.tasks.schedule(now + self.ka_timeout, TschTask::SendKeepalive);
        self.tasks.schedule(now + self.config.desync_threshold + 1, TschTask::DesyncCheck);
        if !self.config.listen_only {
            self.tasks.schedule(now + self.eb_period, TschTask::SendEb);
        }
        log::info!(
            "tsch: associated with {} at asn {} (join priority {})",
            addr,
            self.asn_base,
            self.join_priority
        );
    }

    fn teardown(&mut self, node: &mut NodeContext) {
        self.tasks.clear();
        self.schedule.clear();
        self.queues.clear();
        self.candidates.clear();
        self.time_source = None;
        self.eb_pending = false;
        self.consecutive_syncs = 0;
        self.ka_timeout = self.config.ka_timeout.max(1);
        node.is_associated = false;
    }

    /// Drops synchronization. Non-coordinators start scanning again after
    /// one association poll interval.
    fn leave(&mut self, now: u64, node: &mut NodeContext) {
        let was_associated = self.state == TschState::Associated;
        if self.state != TschState::Unassociated {
            self.set_state(TschState::Leaving);
        }
        self.teardown(node);
        self.set_state(TschState::Unassociated);
        if was_associated {
            self.events.push_back(TschEvent::Left);
        }
        if self.running && !self.coordinator {
            self.tasks.schedule(now + self.config.association_poll_interval(), TschTask::AssociationPoll);
        }
    }

    fn switch_role(&mut self, coordinator: bool, node: &mut NodeContext) {
        node.is_coordinator = coordinator;
        if self.coordinator == coordinator {
            return;
        }
        self.coordinator = coordinator;

        let now = self.clock.now();
        self.leave(now, node);
        if self.running && coordinator {
            self.start_coordinator(now, node);
        }
    }

    fn note_sync(&mut self, now: u64) {
        self.last_sync = now;
        if !self.config.adaptive_timesync {
            return;
        }
        self.consecutive_syncs += 1;
        if self.consecutive_syncs >= ADAPTIVE_CONVERGENCE_SYNCS {
            self.consecutive_syncs = 0;
            let grown = self.ka_timeout.saturating_mul(2).min(self.config.max_ka_timeout.max(1));
            if grown != self.ka_timeout {
                log::debug!("tsch: keep-alive timeout {} -> {}", self.ka_timeout, grown);
                self.ka_timeout = grown;
            }
        }
    }

    fn run_task(&mut self, task: TschTask, now: u64, chain: &mut Chain<'_>) -> Result<()> {
        match task {
            TschTask::AssociationPoll => {
                self.association_poll(now, chain.node_mut());
                Ok(())
            }
            TschTask::Slot => self.run_slot(now, chain),
            TschTask::SendEb => {
                if self.state == TschState::Associated && !self.config.listen_only {
                    self.eb_pending = true;
                    self.tasks.schedule(now + self.eb_period.max(1), TschTask::SendEb);
                }
                Ok(())
            }
            TschTask::SendKeepalive => self.queue_keepalive(now, chain),
            TschTask::DesyncCheck => {
                self.desync_check(now, chain.node_mut());
                Ok(())
            }
        }
    }

    fn association_poll(&mut self, now: u64, node: &mut NodeContext) {
        match self.state {
            TschState::Unassociated if self.coordinator => {
                self.start_coordinator(now, node);
                return;
            }
            TschState::Unassociated => self.set_state(TschState::Scanning),
            TschState::Scanning if self.config.autoselect_time_source => {
                let best = self
                    .candidates
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, candidate)| candidate.beacon.join_priority)
                    .map(|(index, _)| index);
                if let Some(index) = best {
                    let candidate = self.candidates.swap_remove(index);
                    self.associate(now, candidate.addr, candidate.beacon, &candidate.info, node);
                    return;
                }
            }
            TschState::Scanning => {}
            TschState::Associated | TschState::Leaving => return,
        }
        self.tasks.schedule(now + self.config.association_poll_interval(), TschTask::AssociationPoll);
    }

    fn run_slot(&mut self, now: u64, chain: &mut Chain<'_>) -> Result<()> {
        if self.state != TschState::Associated {
            return Ok(());
        }
        let asn = self.asn_at(now);
        self.tasks.schedule(self.time_of(asn.add(1)), TschTask::Slot);

        let Some(link) = self.schedule.link_at(asn).copied() else {
            return Ok(());
        };
        if !link.is_tx() {
            return Ok(());
        }
        let channel = channel_at(asn, link.channel_offset, &self.config.hopping_sequence);

        if link.link_type == LinkType::Advertising && self.eb_pending {
            self.eb_pending = false;
            let frame = self.build_eb(asn, chain)?;
            chain.attrs_mut().dst = None;
            log::trace!("tsch: EB at asn {} on channel {:?}", asn, channel);
            if let Err(err) = chain.send_down(&frame) {
                log::debug!("tsch: EB at asn {} not sent: {}", asn, err);
            }
            self.eb_period = self.eb_period.saturating_mul(2).min(self.config.max_eb_period.max(1));
            return Ok(());
        }

        let Some(outgoing) = self.queues.pop_for(&link) else {
            return Ok(());
        };
        log::trace!("tsch: {:?} at asn {} on channel {:?}", outgoing.kind, asn, channel);
        chain.attrs_mut().dst = outgoing.dst;
        let result = chain.send_down(&outgoing.frame);
        match outgoing.kind {
            FrameKind::Keepalive => self.keepalive_done(now, result),
            FrameKind::Data => {
                if let Some(callback) = self.tx_callback.as_mut() {
                    callback(result);
                }
            }
        }
        Ok(())
    }

    fn queue_keepalive(&mut self, now: u64, chain: &mut Chain<'_>) -> Result<()> {
        if self.state != TschState::Associated {
            return Ok(());
        }
        let Some(time_source) = self.time_source else {
            return Ok(());
        };
        if self.queues.has_keepalive_for(&time_source) {
            return Ok(());
        }

        let frame = self.build_data_frame(&[], Some(time_source), chain)?;
        let keepalive = Outgoing { frame, kind: FrameKind::Keepalive, dst: Some(time_source) };
        if let Err(err) = self.queues.push(keepalive) {
            log::debug!("tsch: keep-alive to {} not queued: {}", time_source, err);
            self.tasks.schedule(now + (self.ka_timeout / 4).max(1), TschTask::SendKeepalive);
        }
        Ok(())
    }

    /// A single failed keep-alive only shortens the retry interval; leaving
    /// is up to the desync check.
    fn keepalive_done(&mut self, now: u64, result: Result<()>) {
        match result {
            Ok(()) => {
                self.note_sync(now);
                self.tasks.schedule(now + self.ka_timeout.max(1), TschTask::SendKeepalive);
            }
            Err(err) => {
                log::info!("tsch: keep-alive failed: {}", err);
                self.consecutive_syncs = 0;
                self.ka_timeout = self.config.ka_timeout.max(1);
                self.tasks.schedule(now + (self.ka_timeout / 4).max(1), TschTask::SendKeepalive);
            }
        }
    }

    fn desync_check(&mut self, now: u64, node: &mut NodeContext) {
        if self.state != TschState::Associated || self.coordinator {
            return;
        }
        let silent = now.saturating_sub(self.last_sync);
        if silent > self.config.desync_threshold {
            log::warn!("tsch: no synchronization for {} ticks, leaving", silent);
            self.leave(now, node);
        } else {
            self.tasks.schedule(self.last_sync + self.config.desync_threshold + 1, TschTask::DesyncCheck);
        }
    }

    fn build_data_frame(&mut self, packet: &[u8], dst: Option<LinkAddr>, chain: &mut Chain<'_>) -> Result<Vec<u8>> {
        let mut payload = FrameBuf::new();
        if !packet.is_empty() {
            chain.hc().compress(packet, &mut payload)?;
        }

        let seq = self.next_seq();
        let node = chain.node();
        let mut info = FrameInfo::data(seq, node.pan_id(), node.link_addr, dst);
        info.version = FrameVersion::Ieee802154_2015;
        info.security_enabled = node.is_pan_secured;

        let mut frame = FrameBuf::new();
        let header_len = chain.framer().create(&info, payload.as_slice(), &mut frame)?;
        chain.llsec().on_frame_created(&mut frame, header_len)?;
        Ok(frame.as_slice().to_vec())
    }

    fn build_eb(&mut self, asn: Asn, chain: &mut Chain<'_>) -> Result<Vec<u8>> {
        let beacon = EnhancedBeacon {
            asn,
            join_priority: self.join_priority,
            timeslot_template: 0,
            slotframes: self.schedule.slotframes().to_vec(),
        };
        let mut payload = FrameBuf::new();
        beacon.encode(&mut payload)?;

        let seq = self.next_seq();
        let node = chain.node();
        let info = FrameInfo {
            frame_type: FrameType::Beacon,
            version: FrameVersion::Ieee802154_2015,
            security_enabled: node.is_pan_secured,
            ie_present: true,
            seq,
            dst_pan: node.pan_id(),
            dst: Address::BROADCAST,
            src_pan: node.pan_id(),
            src: Address::Extended(node.link_addr),
            ..FrameInfo::default()
        };

        let mut frame = FrameBuf::new();
        let header_len = chain.framer().create(&info, payload.as_slice(), &mut frame)?;
        chain.llsec().on_frame_created(&mut frame, header_len)?;
        Ok(frame.as_slice().to_vec())
    }

    fn handle_eb(&mut self, info: &FrameInfo, payload: &[u8], node: &mut NodeContext) -> Result<()> {
        let src = info.src.as_link_addr().ok_or(NetstackError::InvalidFrame)?;
        let beacon = EnhancedBeacon::decode(payload)?;
        let now = self.clock.now();

        match self.state {
            TschState::Associated if Some(src) == self.time_source => {
                if let Err(rejection) = eb::check_frame(&self.config, info, node.pan_id()) {
                    log::info!("tsch: EB from time source {} ignored: {}", src, rejection);
                    return Ok(());
                }
                self.note_sync(now);
                self.asn_base = beacon.asn;
                self.asn_epoch = now;
            }
            TschState::Associated => {
                let better = beacon.join_priority.saturating_add(1) < self.join_priority;
                if self.config.autoselect_time_source
                    && !self.coordinator
                    && better
                    && beacon.qualify(&self.config, info, node.pan_id(), now).is_ok()
                {
                    if let Some(from) = self.time_source.replace(src) {
                        self.events.push_back(TschEvent::ParentSwitch { from, to: src });
                    }
                    self.join_priority = beacon.join_priority.saturating_add(1);
                    self.last_sync = now;
                    log::info!("tsch: switched time source to {}", src);
                }
            }
            TschState::Scanning => {
                if let Err(rejection) = beacon.qualify(&self.config, info, node.pan_id(), now) {
                    log::info!("tsch: EB from {} rejected: {}", src, rejection);
                    return Ok(());
                }
                if self.config.autoselect_time_source {
                    self.candidates.retain(|candidate| candidate.addr != src);
                    self.candidates.push(Candidate { addr: src, beacon, info: *info });
                } else {
                    self.associate(now, src, beacon, info, node);
                }
            }
            TschState::Unassociated | TschState::Leaving => {
                log::trace!("tsch: EB from {} ignored while {:?}", src, self.state);
            }
        }
        Ok(())
    }
}

impl<C: Clock> Driver for Tsch<C> {
    fn name(&self) -> &'static str {
        "tsch"
    }

    fn init(&mut self, node: &mut NodeContext) -> Result<()> {
        self.coordinator |= node.is_coordinator;
        node.is_coordinator = self.coordinator;
        self.pan_secured |= node.is_pan_secured;
        node.is_pan_secured = self.pan_secured;
        self.teardown(node);
        self.state = TschState::Unassociated;
        log::info!(
            "tsch: init {} as {}",
            node.link_addr,
            if self.coordinator { "coordinator" } else { "node" }
        );
        Ok(())
    }

    fn on(&mut self, node: &mut NodeContext) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.running = true;
        let now = self.clock.now();
        if self.coordinator {
            self.start_coordinator(now, node);
        } else {
            self.start_scanning(now);
        }
        Ok(())
    }

    fn off(&mut self, node: &mut NodeContext) -> Result<()> {
        self.running = false;
        if self.state != TschState::Unassociated {
            let now = self.clock.now();
            self.leave(now, node);
        }
        Ok(())
    }

    fn ioctl(&mut self, cmd: IoctlCmd, value: &mut IoctlValue, node: &mut NodeContext) -> Result<()> {
        match cmd {
            IoctlCmd::TschJoinPrioritySet => self.join_priority = value.as_u8()?,
            IoctlCmd::TschJoinPriorityGet => *value = IoctlValue::U8(self.join_priority),
            IoctlCmd::TschEbPeriodSet => self.set_eb_period(value.as_u64()?),
            IoctlCmd::TschKaTimeoutSet => self.set_ka_timeout(value.as_u64()?),
            IoctlCmd::TschCoordinatorSet => self.switch_role(value.as_bool()?, node),
            IoctlCmd::TschPanSecuredSet => {
                self.pan_secured = value.as_bool()?;
                node.is_pan_secured = self.pan_secured;
            }
            IoctlCmd::TschStateGet => *value = IoctlValue::U8(self.state as u8),
            IoctlCmd::TschAsnGet => *value = IoctlValue::U64(self.asn().value()),
            IoctlCmd::TschLeave => {
                let now = self.clock.now();
                self.leave(now, node);
            }
            IoctlCmd::TxCallbackSet => self.tx_callback = value.take_tx_callback()?,
            _ => return Err(NetstackError::CmdUnsupported),
        }
        Ok(())
    }
}

impl<C: Clock> Module for Tsch<C> {
    /// Queues `data` for the next transmit cell towards its destination.
    fn send(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        if self.state != TschState::Associated {
            return Err(NetstackError::Busy);
        }
        let dst = chain.attrs().dst;
        let frame = self.build_data_frame(data, dst, chain)?;
        self.queues.push(Outgoing { frame, kind: FrameKind::Data, dst })
    }

    fn recv(&mut self, data: &[u8], chain: &mut Chain<'_>) -> Result<()> {
        let parsed = chain.framer().parse(data)?;
        let mut frame = FrameBuf::new_from_slice(data)?;
        chain.llsec().input(&mut frame, &parsed)?;
        let payload = frame.as_slice().get(parsed.header_len..).ok_or(NetstackError::InvalidFrame)?;

        match parsed.info.frame_type {
            FrameType::Beacon => self.handle_eb(&parsed.info, payload, chain.node_mut()),
            FrameType::Data => {
                let pan_id = chain.node().pan_id();
                let link_addr = chain.node().link_addr;
                if !parsed.info.is_for(pan_id, &link_addr) {
                    return Ok(());
                }
                if self.state != TschState::Associated {
                    log::trace!("tsch: data from {} dropped while {:?}", parsed.info.src, self.state);
                    return Ok(());
                }
                if payload.is_empty() {
                    log::trace!("tsch: keep-alive from {}", parsed.info.src);
                    return Ok(());
                }

                let mut packet = FrameBuf::new();
                chain.hc().decompress(payload, &mut packet)?;
                chain.attrs_mut().src = parsed.info.src.as_link_addr();
                chain.deliver_up(packet.as_slice())
            }
            FrameType::Ack | FrameType::MacCommand => Ok(()),
        }
    }

    fn poll(&mut self, chain: &mut Chain<'_>) -> Result<()> {
        let now = self.clock.now();
        while let Some((_, task)) = self.tasks.pop_due(now) {
            if let Err(err) = self.run_task(task, now, chain) {
                if !err.is_recoverable() {
                    return Err(err);
                }
                log::warn!("tsch: {:?} failed: {}", task, err);
            }
        }
        self.process_pending_events();
        Ok(())
    }
}
