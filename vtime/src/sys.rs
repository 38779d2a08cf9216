use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error;
use crate::monitor::Wait;
use crate::thread::{self, ParkTimeout};
use crate::Clock;

/// The system clock: "real" time as perceived by this process.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
  /// The shared instance, also used when no other clock is in effect.
  pub fn instance() -> Arc<dyn Clock> {
    static INSTANCE: OnceLock<Arc<dyn Clock>> = OnceLock::new();
    Arc::clone(INSTANCE.get_or_init(|| Arc::new(SystemClock)))
  }
}

impl fmt::Debug for SystemClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SystemClock")
  }
}

impl Clock for SystemClock {
  fn current_time_millis(&self) -> i64 {
    wall_millis()
  }

  fn nano_time(&self) -> i64 {
    mono_nanos()
  }

  fn object_wait(&self, monitor: &mut dyn Wait, timeout: i64) -> io::Result<()> {
    real_wait(monitor, timeout)
  }

  fn thread_sleep(&self, millis: i64) -> io::Result<()> {
    real_sleep(millis)
  }

  fn park(&self, timeout: ParkTimeout) {
    thread::park(timeout)
  }
}

pub(crate) fn wall_millis() -> i64 {
  match SystemTime::now().duration_since(UNIX_EPOCH) {
    Ok(since) => since.as_millis() as i64,
    Err(before) => -(before.duration().as_millis() as i64)
  }
}

// Nanoseconds since the first reading in this process
pub(crate) fn mono_nanos() -> i64 {
  static ORIGIN: OnceLock<Instant> = OnceLock::new();
  ORIGIN.get_or_init(Instant::now).elapsed().as_nanos() as i64
}

pub(crate) fn real_wait(monitor: &mut dyn Wait, timeout: i64) -> io::Result<()> {
  if timeout < 0 {
    return Err(error::negative_timeout(timeout));
  }
  let timeout = if timeout == 0 { None } else { Some(Duration::from_millis(timeout as u64)) };
  monitor.wait_real(timeout)
}

pub(crate) fn real_sleep(millis: i64) -> io::Result<()> {
  if millis < 0 {
    return Err(error::negative_timeout(millis));
  }
  thread::sleep(Duration::from_millis(millis as u64))
}
