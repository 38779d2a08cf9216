use std::convert::TryFrom;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, trace};

use crate::constants::NANOS_PER_MILLI;
use crate::error;
use crate::monitor::Wait;
use crate::schedule::{Key, Schedule};
use crate::sys;
use crate::thread::{self, ParkTimeout, ThreadHandle};
use crate::Clock;

/// How a registered waiter is woken once virtual time reaches its deadline.
#[derive(Debug, Clone)]
enum Wake {
  // Waits and sleeps have no unpark channel; they are interrupted,
  // and must re-check the clock to tell a deadline from a real interrupt.
  Interrupt(ThreadHandle),
  // Parks may return spuriously anyway, so an unpark needs no disambiguation.
  Unpark(ThreadHandle)
}

impl Wake {
  fn fire(&self) {
    match self {
      Wake::Interrupt(thread) => thread.interrupt(),
      Wake::Unpark(thread) => thread.unpark()
    }
  }
}

// When a registration becomes due, fixed against the counter read under the waiters lock
enum Due {
  After(i64),
  AtMillis(i64)
}

struct Registration {
  key: Key,
  deadline: i64
}

/// A clock that only progresses when its time is manually advanced by calls to [`advance`](ManualClock::advance).
///
/// Every timed wait, sleep, or park on this clock registers a deadline and then blocks the
/// real thread with no real timeout; `advance` wakes the waiters it makes due, soonest first.
pub struct ManualClock {
  start_time: i64,
  // Written only while `waiters` is locked
  nanos: AtomicI64,
  waiters: Mutex<Schedule<Wake>>
}

impl ManualClock {
  /// Creates a clock whose `current_time_millis` starts at `start_time`.
  pub fn new(start_time: i64) -> io::Result<ManualClock> {
    if start_time < 0 {
      return Err(error::negative_start_time(start_time));
    }
    Ok(ManualClock {
      start_time,
      nanos: AtomicI64::new(0),
      waiters: Mutex::new(Schedule::new())
    })
  }

  /// Creates a clock starting at the system clock's current time.
  pub fn from_system() -> ManualClock {
    ManualClock {
      start_time: sys::wall_millis().max(0),
      nanos: AtomicI64::new(0),
      waiters: Mutex::new(Schedule::new())
    }
  }

  /// Advances this clock's time by `duration`, waking every waiter it makes due.
  pub fn advance(&self, duration: Duration) -> io::Result<()> {
    if duration == Duration::from_nanos(0) {
      return Err(error::non_positive_duration(duration));
    }
    let delta = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);

    let mut waiters = self.lock_waiters();
    let now = self.nanos.load(Ordering::SeqCst).saturating_add(delta);
    self.nanos.store(now, Ordering::SeqCst);
    debug!("Advanced {:?} by {:?}", self, duration);

    // Anything registered from here on already sees the new time
    for wake in waiters.expire(now) {
      trace!("Waking {:?} at {}ns", wake, now);
      wake.fire();
    }
    Ok(())
  }

  /// Virtual time elapsed since construction.
  pub fn elapsed(&self) -> Duration {
    Duration::from_nanos(self.nanos.load(Ordering::SeqCst).max(0) as u64)
  }

  /// Number of threads currently blocked on this clock with a deadline still ahead.
  pub fn pending_waiters(&self) -> usize {
    self.lock_waiters().len()
  }

  /// Virtual time, since construction, at which the soonest blocked thread becomes due.
  pub fn next_deadline(&self) -> Option<Duration> {
    self.lock_waiters().when_next().map(|deadline| Duration::from_nanos(deadline.max(0) as u64))
  }

  fn lock_waiters(&self) -> MutexGuard<Schedule<Wake>> {
    self.waiters.lock().expect("Could not acquire unpoisoned manual clock waiters lock")
  }

  fn deadline(&self, due: Due, now: i64) -> i64 {
    match due {
      Due::After(nanos) => now.saturating_add(nanos),
      Due::AtMillis(millis) => millis.saturating_sub(self.start_time).saturating_mul(NANOS_PER_MILLI)
    }
  }

  // None if the deadline is already due, in which case the caller must not block
  fn register(&self, due: Due, wake: Wake) -> Option<Registration> {
    let mut waiters = self.lock_waiters();
    let now = self.nanos.load(Ordering::SeqCst);
    let deadline = self.deadline(due, now);
    if deadline <= now {
      trace!("Not registering already due {:?}", wake);
      return None;
    }

    let key = waiters.add(deadline, wake);
    trace!("Registered waiter {:?} for {}ns", key, key.deadline());
    Some(Registration { key, deadline })
  }

  // Decides what an interrupt-woken wait or sleep returns. Once virtual time has reached the
  // deadline, any interrupt is this clock's own and is consumed as a timeout. Before that,
  // the waiter is removed so a later advance cannot deliver a stale interrupt.
  fn resume(&self, registration: Registration, result: io::Result<()>) -> io::Result<()> {
    let mut waiters = self.lock_waiters();
    if self.nanos.load(Ordering::SeqCst) >= registration.deadline {
      thread::interrupted();
      return Ok(());
    }

    trace!("Disabling waiter {:?} woken before its deadline", registration.key);
    waiters.disable(registration.key);
    result
  }
}

impl Default for ManualClock {
  fn default() -> ManualClock {
    ManualClock::from_system()
  }
}

impl fmt::Debug for ManualClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManualClock")
      .field("start_time", &self.start_time)
      .field("nanos", &self.nanos.load(Ordering::SeqCst))
      .finish()
  }
}

impl Clock for ManualClock {
  fn current_time_millis(&self) -> i64 {
    self.start_time + self.nanos.load(Ordering::SeqCst) / NANOS_PER_MILLI
  }

  fn nano_time(&self) -> i64 {
    self.nanos.load(Ordering::SeqCst)
  }

  fn object_wait(&self, monitor: &mut dyn Wait, timeout: i64) -> io::Result<()> {
    if timeout <= 0 {
      return sys::real_wait(monitor, timeout);
    }
    let due = Due::After(timeout.saturating_mul(NANOS_PER_MILLI));
    match self.register(due, Wake::Interrupt(thread::current())) {
      Some(registration) => {
        let result = monitor.wait_real(None);
        self.resume(registration, result)
      },
      None => Ok(())
    }
  }

  fn thread_sleep(&self, millis: i64) -> io::Result<()> {
    if millis <= 0 {
      return sys::real_sleep(millis);
    }
    let due = Due::After(millis.saturating_mul(NANOS_PER_MILLI));
    match self.register(due, Wake::Interrupt(thread::current())) {
      Some(registration) => {
        let result = thread::sleep_indefinitely();
        self.resume(registration, result)
      },
      None => Ok(())
    }
  }

  fn park(&self, timeout: ParkTimeout) {
    let due = match timeout {
      ParkTimeout::Relative(nanos) if nanos > 0 => Due::After(nanos),
      ParkTimeout::Deadline(millis) if millis > 0 => Due::AtMillis(millis),
      _ => return thread::park(timeout)
    };

    let registration = match self.register(due, Wake::Unpark(thread::current())) {
      Some(registration) => registration,
      None => return
    };
    // The unpark token is set after the time is stored, so a wake racing this check is not lost
    while self.nanos.load(Ordering::SeqCst) < registration.deadline {
      thread::park(ParkTimeout::Relative(0));
    }
  }
}
