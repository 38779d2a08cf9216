use std::fmt;
use std::io;
use std::sync::Arc;

use crate::constants::NANOS_PER_MILLI;
use crate::monitor::Wait;
use crate::sys::SystemClock;
use crate::thread::ParkTimeout;
use crate::Clock;

/// A clock that behaves as if its base clock had been started at a fixed epoch.
/// Only the readings are rebased; blocking calls go through the base clock unchanged.
pub struct FixedEpochClock {
  base: Arc<dyn Clock>,
  epoch: i64,
  offset: i64
}

impl FixedEpochClock {
  /// `epoch` is in milliseconds since midnight, January 1, 1970 UTC,
  /// and becomes the base clock's current time as of this call.
  pub fn new(base: Arc<dyn Clock>, epoch: i64) -> FixedEpochClock {
    let offset = epoch - base.current_time_millis();
    FixedEpochClock { base, epoch, offset }
  }

  /// Continuously running system time counted from `epoch`.
  pub fn from_system(epoch: i64) -> FixedEpochClock {
    FixedEpochClock::new(SystemClock::instance(), epoch)
  }
}

impl fmt::Debug for FixedEpochClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FixedEpochClock")
      .field("base", &self.base)
      .field("epoch", &self.epoch)
      .finish()
  }
}

impl Clock for FixedEpochClock {
  fn current_time_millis(&self) -> i64 {
    self.base.current_time_millis() + self.offset
  }

  fn nano_time(&self) -> i64 {
    self.base.nano_time().saturating_add(self.offset.saturating_mul(NANOS_PER_MILLI))
  }

  fn object_wait(&self, monitor: &mut dyn Wait, timeout: i64) -> io::Result<()> {
    self.base.object_wait(monitor, timeout)
  }

  fn thread_sleep(&self, millis: i64) -> io::Result<()> {
    self.base.thread_sleep(millis)
  }

  fn park(&self, timeout: ParkTimeout) {
    self.base.park(timeout)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;

  use super::FixedEpochClock;
  use crate::{Clock, ManualClock};

  #[test]
  fn readings_are_rebased() {
    let base = Arc::new(ManualClock::new(5_000).expect("Could not create clock"));
    let clock = FixedEpochClock::new(base.clone(), 100);
    assert_eq!(clock.current_time_millis(), 100);
    assert_eq!(clock.nano_time(), -4_900 * 1_000_000);

    base.advance(Duration::from_millis(25)).expect("Could not advance");
    assert_eq!(clock.current_time_millis(), 125);
    assert_eq!(clock.nano_time() - base.nano_time(), -4_900 * 1_000_000);
  }

  #[test]
  fn system_epoch_starts_near_epoch() {
    let clock = FixedEpochClock::from_system(1_000_000);
    let now = clock.current_time_millis();
    assert!(now >= 1_000_000 && now < 1_000_000 + 60_000);
  }
}
