//! Host-loop entry points.
//!
//! A host brings a configured stack up once with [`init`] and then calls
//! [`process`] from its main loop:
//!
//! ```no_run
//! # use std::time::Duration;
//! # fn run(stack: &mut netstack::Netstack) -> netstack::Result<()> {
//! netstack::runtime::init(stack)?;
//! loop {
//!     netstack::runtime::process(stack, Duration::from_millis(10))?;
//! }
//! # }
//! ```

use std::time::Duration;

use crate::error::Result;
use crate::netstack::Netstack;

/// Initializes every layer of a configured stack and switches it on.
pub fn init(stack: &mut Netstack) -> Result<()> {
    stack.initialize()?;
    stack.on()?;
    log::info!("netstk: {} up", stack.node().link_addr);
    Ok(())
}

/// Drains one round of deferred work, then idles for `idle`.
///
/// Errors the stack cannot recover from are returned so the host can decide
/// whether to reset.
pub fn process(stack: &mut Netstack, idle: Duration) -> Result<()> {
    stack.process()?;
    if !idle.is_zero() {
        std::thread::sleep(idle);
    }
    Ok(())
}
