use std::fmt;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::thread;

pub type LockError<'a, T> = PoisonError<MutexGuard<'a, T>>;

/// Mutex with associated condvar: the object a timed wait is performed on.
/// The condvar can only be waited on through the associated guard,
/// and only while the associated lock is held.
///
/// IE instead of (Mutex<resource>, Condvar), use Monitor<resource>.
/// Waits go through a [`Clock`](crate::Clock) so that their timeouts follow virtual time,
/// and are interruptible through [`ThreadHandle::interrupt`](crate::ThreadHandle::interrupt).
#[derive(Debug, Default)]
pub struct Monitor<T> {
  mx: Mutex<T>,
  cv: Arc<Condvar>
}

/// A held monitor lock which can be released for the duration of a real wait.
pub trait Wait {
  /// Releases the lock and blocks until notified, interrupted, or `timeout` elapses
  /// (`None` blocks until notified or interrupted). Spurious returns are allowed.
  /// The lock is re-acquired before returning, including when returning `Interrupted`.
  fn wait_real(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl<T> Monitor<T> {
  pub fn new(t: T) -> Monitor<T> {
    Monitor {
      mx: Mutex::new(t),
      cv: Arc::new(Condvar::new())
    }
  }

  pub fn lock(&self) -> Result<MonitorGuard<T>, LockError<T>> {
    self.mx.lock()
      .map(|guard| MonitorGuard { guard: Some(guard), cv: &self.cv })
  }

  pub fn notify_one(&self) {
    self.cv.notify_one()
  }

  pub fn notify_all(&self) {
    self.cv.notify_all()
  }

  pub fn into_inner(self) -> Result<T, PoisonError<T>> {
    self.mx.into_inner()
  }
}

pub struct MonitorGuard<'a, T: 'a> {
  // Vacant only while the lock is released inside `wait_real`
  guard: Option<MutexGuard<'a, T>>,
  cv: &'a Arc<Condvar>
}

impl<'a, T> MonitorGuard<'a, T> {
  pub fn notify_one(&self) {
    self.cv.notify_one()
  }

  pub fn notify_all(&self) {
    self.cv.notify_all()
  }

  pub fn into_inner(mut self) -> MutexGuard<'a, T> {
    self.guard.take().expect("Monitor guard is only vacant during a wait")
  }
}

impl<T> Wait for MonitorGuard<'_, T> {
  fn wait_real(&mut self, timeout: Option<Duration>) -> io::Result<()> {
    let guard = self.guard.take().expect("Monitor guard is only vacant during a wait");
    let (guard, result) = thread::wait_on(self.cv, guard, timeout);
    self.guard = Some(guard);
    result
  }
}

impl<T> Deref for MonitorGuard<'_, T> {
  type Target = T;

  fn deref(&self) -> &T {
    self.guard.as_deref().expect("Monitor guard is only vacant during a wait")
  }
}

impl<T> DerefMut for MonitorGuard<'_, T> {
  fn deref_mut(&mut self) -> &mut T {
    self.guard.as_deref_mut().expect("Monitor guard is only vacant during a wait")
  }
}

impl<T: fmt::Debug> fmt::Debug for MonitorGuard<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MonitorGuard").field("value", &**self).finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::{Duration, Instant};

  use crossbeam::channel;

  use super::{Monitor, Wait};
  use crate::{error, thread};

  #[test]
  fn wait_times_out() {
    let monitor = Monitor::new(0u32);
    let mut guard = monitor.lock().expect("Could not acquire unpoisoned monitor lock");
    let start = Instant::now();
    guard.wait_real(Some(Duration::from_millis(30))).expect("Wait should not be interrupted");
    assert!(start.elapsed() >= Duration::from_millis(30));
    *guard += 1;
    assert_eq!(*guard, 1);
  }

  #[test]
  fn notify_wakes_waiter() {
    let monitor = Arc::new(Monitor::new(false));
    let waiter_monitor = Arc::clone(&monitor);
    let waiter = std::thread::spawn(move || {
      let mut guard = waiter_monitor.lock().expect("Could not acquire unpoisoned monitor lock");
      while !*guard {
        guard.wait_real(None).expect("Wait should not be interrupted");
      }
    });

    {
      let mut guard = monitor.lock().expect("Could not acquire unpoisoned monitor lock");
      *guard = true;
      guard.notify_all();
    }
    waiter.join().expect("Waiter panicked");
  }

  #[test]
  fn interrupt_wakes_waiter_with_lock_held() {
    let monitor = Arc::new(Monitor::new(7u32));
    let waiter_monitor = Arc::clone(&monitor);
    let (tx, rx) = channel::unbounded();
    let waiter = std::thread::spawn(move || {
      let mut guard = waiter_monitor.lock().expect("Could not acquire unpoisoned monitor lock");
      tx.send(thread::current()).expect("Could not send handle");
      let result = guard.wait_real(None);
      (result.map_err(|e| error::is_interrupted(&e)), *guard)
    });

    rx.recv().expect("Could not receive handle").interrupt();
    let (result, value) = waiter.join().expect("Waiter panicked");
    assert_eq!(result, Err(true));
    assert_eq!(value, 7);
  }
}
