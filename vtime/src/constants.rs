pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const MAX_NANOS_FRACTION: i32 = 999_999;
pub const ROUND_UP_NANOS: i32 = 500_000;

pub const ENV_SLOWDOWN: &str = "VTIME_SLOWDOWN";
pub const ENV_EPOCH: &str = "VTIME_EPOCH";

pub mod time_ms {
  use std::time::Duration;

  // Upper bound on how long a lost condvar notify can delay an interrupt
  pub const INTERRUPT_POLL: Duration = Duration::from_millis(10);
}
