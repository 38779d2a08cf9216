//! The operations a call-site rewriter substitutes for the host's time and
//! blocking calls. Each resolves the clock in effect anew, so installing a
//! different clock takes effect from the next call on.

use std::io;

use crate::monitor::Wait;
use crate::resolver;
use crate::thread::ParkTimeout;

pub fn current_time_millis() -> i64 {
  resolver::get().current_time_millis()
}

pub fn nano_time() -> i64 {
  resolver::get().nano_time()
}

pub fn object_wait(monitor: &mut dyn Wait, timeout: i64) -> io::Result<()> {
  resolver::get().object_wait(monitor, timeout)
}

pub fn object_wait_nanos(monitor: &mut dyn Wait, timeout: i64, nanos: i32) -> io::Result<()> {
  resolver::get().object_wait_nanos(monitor, timeout, nanos)
}

pub fn thread_sleep(millis: i64) -> io::Result<()> {
  resolver::get().thread_sleep(millis)
}

pub fn thread_sleep_nanos(millis: i64, nanos: i32) -> io::Result<()> {
  resolver::get().thread_sleep_nanos(millis, nanos)
}

pub fn park(timeout: ParkTimeout) {
  resolver::get().park(timeout)
}
