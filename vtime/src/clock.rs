use std::fmt;
use std::io;

use crate::constants::{MAX_NANOS_FRACTION, ROUND_UP_NANOS};
use crate::error;
use crate::monitor::Wait;
use crate::thread::ParkTimeout;

/// Encapsulates every time-related operation: reading the current and the
/// monotonic time, and every blocking call that takes a timeout.
///
/// Installing a clock through [`VirtualClock`](crate::VirtualClock) redirects those operations,
/// so that code can run against virtual time instead of the host's.
pub trait Clock: Send + Sync + fmt::Debug {
  /// Milliseconds between this clock's current time and midnight, January 1, 1970 UTC.
  fn current_time_millis(&self) -> i64;

  /// Current value of this clock's high-resolution time source, in nanoseconds.
  /// Only the difference between two readings of the same clock is meaningful.
  fn nano_time(&self) -> i64;

  /// Waits on a held monitor for at most `timeout` milliseconds of this clock's time.
  /// A zero timeout waits until notified.
  fn object_wait(&self, monitor: &mut dyn Wait, timeout: i64) -> io::Result<()>;

  /// Sleeps for `millis` milliseconds of this clock's time.
  fn thread_sleep(&self, millis: i64) -> io::Result<()>;

  /// Parks the calling thread until unparked or until the timeout passes in this clock's time.
  fn park(&self, timeout: ParkTimeout);

  fn object_wait_nanos(&self, monitor: &mut dyn Wait, timeout: i64, nanos: i32) -> io::Result<()> {
    self.object_wait(monitor, to_millis(timeout, nanos)?)
  }

  fn thread_sleep_nanos(&self, millis: i64, nanos: i32) -> io::Result<()> {
    self.thread_sleep(to_millis(millis, nanos)?)
  }
}

// Rounds a millis+nanos timeout to millisecond granularity.
// A sub-millisecond remainder rounds up when it is at least half a millisecond,
// or when it is all there is.
pub(crate) fn to_millis(millis: i64, nanos: i32) -> io::Result<i64> {
  if millis < 0 {
    return Err(error::negative_timeout(millis));
  }
  if nanos < 0 || nanos > MAX_NANOS_FRACTION {
    return Err(error::nanos_out_of_range(nanos));
  }
  if nanos >= ROUND_UP_NANOS || (nanos != 0 && millis == 0) {
    Ok(millis.saturating_add(1))
  } else {
    Ok(millis)
  }
}

#[cfg(test)]
mod tests {
  use std::io;

  use super::to_millis;

  #[test]
  fn whole_millis_unchanged() {
    assert_eq!(to_millis(0, 0).ok(), Some(0));
    assert_eq!(to_millis(42, 0).ok(), Some(42));
  }

  #[test]
  fn rounds_half_millisecond_up() {
    assert_eq!(to_millis(10, 499_999).ok(), Some(10));
    assert_eq!(to_millis(10, 500_000).ok(), Some(11));
    assert_eq!(to_millis(10, 999_999).ok(), Some(11));
  }

  #[test]
  fn any_nanos_alone_round_to_one_milli() {
    assert_eq!(to_millis(0, 1).ok(), Some(1));
  }

  #[test]
  fn rejects_bad_arguments() {
    let kind = |r: io::Result<i64>| r.map_err(|e| e.kind());
    assert_eq!(kind(to_millis(-1, 0)), Err(io::ErrorKind::InvalidInput));
    assert_eq!(kind(to_millis(1, -1)), Err(io::ErrorKind::InvalidInput));
    assert_eq!(kind(to_millis(1, 1_000_000)), Err(io::ErrorKind::InvalidInput));
  }
}
