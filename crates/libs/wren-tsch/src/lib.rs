//! Time-slotted channel hopping for the wren netstack.
//!
//! [`Tsch`] is a MAC [`netstack::Module`]: bind it in the MAC role of a
//! [`netstack::Netstack`] and drive the stack's `process` loop. Coordinators
//! start a PAN and advertise it with enhanced beacons; other nodes scan,
//! join through a qualifying beacon and stay synchronized with keep-alives.

pub mod asn;
pub mod clock;
pub mod config;
pub mod eb;
pub mod events;
mod queue;
pub mod schedule;
pub mod tasks;
pub mod tsch;

pub use asn::Asn;
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::TschConfig;
pub use eb::{EbError, EbRejection, EnhancedBeacon};
pub use events::{EventListener, TschEvent};
pub use schedule::{channel_at, Link, LinkOptions, LinkType, Schedule, Slotframe};
pub use tsch::{Tsch, TschState, ADAPTIVE_CONVERGENCE_SYNCS};

use netstack::{IoctlCmd, IoctlValue, Netstack, Result, Role};

/// Association state of the MAC bound in `stack`.
pub fn state_of(stack: &mut Netstack) -> Result<TschState> {
    let mut value = IoctlValue::None;
    stack.ioctl(Role::Mac, IoctlCmd::TschStateGet, &mut value)?;
    TschState::try_from(value.as_u8()?)
}

/// Current absolute slot number of the MAC bound in `stack`.
pub fn asn_of(stack: &mut Netstack) -> Result<Asn> {
    let mut value = IoctlValue::None;
    stack.ioctl(Role::Mac, IoctlCmd::TschAsnGet, &mut value)?;
    Ok(Asn::new(value.as_u64()?))
}

/// Drops synchronization; non-coordinators scan again afterwards.
pub fn leave(stack: &mut Netstack) -> Result<()> {
    stack.ioctl(Role::Mac, IoctlCmd::TschLeave, &mut IoctlValue::None)
}
