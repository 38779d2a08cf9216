//! Substitutable time for multi-threaded programs.
//!
//! Every time-reading and time-blocking operation goes through a [`Clock`].
//! The clock in effect for a thread is resolved by [`VirtualClock`]; with a
//! [`ManualClock`] in effect, timed waits, sleeps and parks only complete once
//! virtual time is advanced past their deadline.

mod clock;
mod constants;
mod epoch;
mod error;
mod manual;
mod monitor;
mod resolver;
mod scaled;
mod schedule;
mod sys;
mod warn;

pub mod conf;
pub mod redirect;
pub mod thread;

pub use clock::Clock;
pub use epoch::FixedEpochClock;
pub use error::is_interrupted;
pub use manual::ManualClock;
pub use monitor::{LockError, Monitor, MonitorGuard, Wait};
pub use resolver::{
  VirtualClock,
  get,
  set_for_child_threads,
  set_for_current_thread,
  set_for_current_thread_and_children,
  set_global,
  set_global_except_current_thread,
  spawn
};
pub use scaled::ScaledClock;
pub use sys::SystemClock;
pub use thread::{ParkTimeout, ThreadHandle};
