use core::fmt;

use netstack::LinkAddr;

use crate::tsch::TschState;

/// Notifications queued by the slot machinery and handed to the listener
/// from the cooperative loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TschEvent {
    StateChanged { from: TschState, to: TschState },
    Joined { time_source: LinkAddr, join_priority: u8 },
    Left,
    ParentSwitch { from: LinkAddr, to: LinkAddr },
    ScheduleChanged { slotframes: usize },
}

impl fmt::Display for TschEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateChanged { from, to } => write!(f, "state {from:?} -> {to:?}"),
            Self::Joined { time_source, join_priority } => {
                write!(f, "joined via {time_source} at priority {join_priority}")
            }
            Self::Left => write!(f, "left network"),
            Self::ParentSwitch { from, to } => write!(f, "time source {from} -> {to}"),
            Self::ScheduleChanged { slotframes } => write!(f, "schedule now has {slotframes} slotframes"),
        }
    }
}

pub type EventListener = Box<dyn FnMut(&TschEvent)>;
