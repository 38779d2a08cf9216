use std::fmt;
use std::io;
use std::sync::Arc;

use crate::error;
use crate::monitor::Wait;
use crate::sys::SystemClock;
use crate::thread::ParkTimeout;
use crate::Clock;

/// A clock providing time slowed down or sped up relative to a source clock.
///
/// A scale above 1 runs faster than the source, a scale below 1 slower.
/// Time is scaled relative to the source's readings at construction, and
/// blocking calls ask the source to block for the equivalent source duration.
pub struct ScaledClock {
  source: Arc<dyn Clock>,
  scale: f64,
  start_time: i64,
  start_nanos: i64
}

impl ScaledClock {
  pub fn new(source: Arc<dyn Clock>, scale: f64) -> io::Result<ScaledClock> {
    if !(scale > 0.0) {
      return Err(error::non_positive_scale(scale));
    }
    let start_time = source.current_time_millis();
    let start_nanos = source.nano_time();
    Ok(ScaledClock { source, scale, start_time, start_nanos })
  }

  /// Scales the system clock.
  pub fn of_system(scale: f64) -> io::Result<ScaledClock> {
    ScaledClock::new(SystemClock::instance(), scale)
  }

  pub fn scale(&self) -> f64 {
    self.scale
  }

  // Converts a timeout into the source's frame. A positive timeout stays positive,
  // since zero means "until notified" to a wait.
  fn to_source(&self, timeout: i64) -> i64 {
    if timeout <= 0 {
      return timeout;
    }
    ((timeout as f64 / self.scale) as i64).max(1)
  }
}

impl fmt::Debug for ScaledClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScaledClock")
      .field("source", &self.source)
      .field("scale", &self.scale)
      .finish()
  }
}

impl Clock for ScaledClock {
  fn current_time_millis(&self) -> i64 {
    self.start_time + ((self.source.current_time_millis() - self.start_time) as f64 * self.scale) as i64
  }

  fn nano_time(&self) -> i64 {
    // Relative to start_nanos only to keep the scaled number small
    self.start_nanos + ((self.source.nano_time() - self.start_nanos) as f64 * self.scale) as i64
  }

  fn object_wait(&self, monitor: &mut dyn Wait, timeout: i64) -> io::Result<()> {
    self.source.object_wait(monitor, self.to_source(timeout))
  }

  fn thread_sleep(&self, millis: i64) -> io::Result<()> {
    self.source.thread_sleep(self.to_source(millis))
  }

  fn park(&self, timeout: ParkTimeout) {
    match timeout {
      ParkTimeout::Relative(nanos) => self.source.park(ParkTimeout::Relative(self.to_source(nanos))),
      ParkTimeout::Deadline(millis) => {
        let remaining = ((millis - self.current_time_millis()) as f64 / self.scale) as i64;
        self.source.park(ParkTimeout::Deadline(self.source.current_time_millis() + remaining))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io;
  use std::sync::Arc;
  use std::time::Duration;

  use super::ScaledClock;
  use crate::{Clock, ManualClock};

  fn manual() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(1_000_000).expect("Could not create clock"))
  }

  #[test]
  fn rejects_non_positive_scale() {
    for scale in &[0.0, -2.0, f64::NAN] {
      let err = ScaledClock::new(manual(), *scale).expect_err("Expected bad scale to fail");
      assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
  }

  #[test]
  fn reads_source_at_construction() {
    let source = manual();
    source.advance(Duration::from_millis(7)).expect("Could not advance");
    let clock = ScaledClock::new(source.clone(), 3.5).expect("Could not create clock");
    assert_eq!(clock.current_time_millis(), source.current_time_millis());
    assert_eq!(clock.nano_time(), source.nano_time());
  }

  #[test]
  fn scales_elapsed_source_time() {
    let source = manual();
    let fast = ScaledClock::new(source.clone(), 4.0).expect("Could not create clock");
    let slow = ScaledClock::new(source.clone(), 0.5).expect("Could not create clock");

    source.advance(Duration::from_millis(10)).expect("Could not advance");
    assert_eq!(fast.current_time_millis(), 1_000_000 + 40);
    assert_eq!(slow.current_time_millis(), 1_000_000 + 5);
    assert_eq!(fast.nano_time(), 40_000_000);
    assert_eq!(slow.nano_time(), 5_000_000);
  }

  #[test]
  fn truncates_toward_zero() {
    let source = manual();
    let clock = ScaledClock::new(source.clone(), 0.3).expect("Could not create clock");
    source.advance(Duration::from_nanos(10)).expect("Could not advance");
    assert_eq!(clock.nano_time(), 3);
    source.advance(Duration::from_nanos(1)).expect("Could not advance");
    assert_eq!(clock.nano_time(), 3);
  }

  #[test]
  fn positive_timeouts_stay_positive_in_source_frame() {
    let clock = ScaledClock::new(manual(), 10.0).expect("Could not create clock");
    assert_eq!(clock.to_source(100), 10);
    assert_eq!(clock.to_source(5), 1);
    assert_eq!(clock.to_source(0), 0);
    assert_eq!(clock.to_source(-3), -3);
  }
}
