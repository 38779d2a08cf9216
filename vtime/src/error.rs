use std::io;
use std::time::Duration;

pub fn negative_timeout(timeout: i64) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, format!("timeout value is negative: {}", timeout))
}

pub fn nanos_out_of_range(nanos: i32) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, format!("nanosecond timeout value out of range: {}", nanos))
}

pub fn non_positive_duration(duration: Duration) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, format!("Duration must be positive; was {:?}", duration))
}

pub fn negative_start_time(start_time: i64) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, format!("Start time must be >= 0; was {}", start_time))
}

pub fn non_positive_scale(scale: f64) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, format!("Scale must be positive; was {}", scale))
}

pub fn bad_config(key: &str, value: &str) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, format!("Could not use {}={:?} as clock configuration", key, value))
}

pub fn interrupted() -> io::Error {
  io::Error::new(io::ErrorKind::Interrupted, "Thread was interrupted while blocked")
}

pub fn is_interrupted(e: &io::Error) -> bool {
  e.kind() == io::ErrorKind::Interrupted
}
