//! Per-thread interruption and the real blocking primitives every clock
//! eventually bottoms out in.
//!
//! Rust threads carry no interrupt status of their own, so each thread lazily
//! gets a [`ThreadHandle`]: an interrupted flag plus the means to wake the
//! thread out of whichever real primitive it is blocked in. Sleeps block on a
//! per-thread `crossbeam` parker (so they never consume `std::thread` park
//! tokens), monitor waits block on the monitor's condvar, and parks use the
//! `std::thread` token.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crossbeam::sync::{Parker, Unparker};
use log::trace;

use crate::constants::time_ms::INTERRUPT_POLL;
use crate::error;
use crate::sys;

/// How long a [`park`] may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkTimeout {
  /// Relative timeout in nanoseconds. Zero parks until unparked,
  /// a negative value returns immediately.
  Relative(i64),
  /// Absolute deadline in milliseconds since midnight, January 1, 1970 UTC.
  Deadline(i64),
}

#[derive(Debug)]
struct Signal {
  interrupted: AtomicBool,
  unparker: Unparker,
  // Condvar of the monitor the thread is currently waiting on, if any
  blocker: Mutex<Option<Arc<Condvar>>>,
}

impl Signal {
  fn take_interrupt(&self) -> bool {
    self.interrupted.swap(false, Ordering::SeqCst)
  }

  fn lock_blocker(&self) -> MutexGuard<Option<Arc<Condvar>>> {
    self.blocker.lock().expect("Could not acquire unpoisoned blocker lock")
  }
}

/// Identifies one OS thread and lets other threads interrupt or unpark it.
#[derive(Debug, Clone)]
pub struct ThreadHandle {
  thread: std::thread::Thread,
  signal: Arc<Signal>,
}

impl ThreadHandle {
  pub fn id(&self) -> ThreadId {
    self.thread.id()
  }

  /// Sets the thread's interrupted flag and wakes it out of a sleep or monitor wait.
  /// A thread that is not blocked observes the flag at its next sleep or wait.
  pub fn interrupt(&self) {
    trace!("Interrupting thread {:?}", self.thread.id());
    self.signal.interrupted.store(true, Ordering::SeqCst);
    self.signal.unparker.unpark();
    if let Some(cv) = self.signal.lock_blocker().as_ref() {
      cv.notify_all();
    }
  }

  pub fn is_interrupted(&self) -> bool {
    self.signal.interrupted.load(Ordering::SeqCst)
  }

  /// Makes the thread's park token available, as `std::thread::Thread::unpark` does.
  pub fn unpark(&self) {
    self.thread.unpark()
  }
}

struct Local {
  parker: Parker,
  handle: ThreadHandle,
}

impl Local {
  fn new() -> Local {
    let parker = Parker::new();
    let signal = Signal {
      interrupted: AtomicBool::new(false),
      unparker: parker.unparker().clone(),
      blocker: Mutex::new(None),
    };
    Local {
      parker,
      handle: ThreadHandle { thread: std::thread::current(), signal: Arc::new(signal) },
    }
  }
}

thread_local! {
  static LOCAL: Local = Local::new();
}

/// Handle for the calling thread.
pub fn current() -> ThreadHandle {
  LOCAL.with(|local| local.handle.clone())
}

/// Tests and clears the calling thread's interrupted flag.
pub fn interrupted() -> bool {
  LOCAL.with(|local| local.handle.signal.take_interrupt())
}

/// Tests the calling thread's interrupted flag without clearing it.
pub fn is_interrupted() -> bool {
  LOCAL.with(|local| local.handle.is_interrupted())
}

/// Really sleeps for `duration`.
/// Fails with `Interrupted`, clearing the flag, if the thread is interrupted before or while sleeping.
pub fn sleep(duration: Duration) -> io::Result<()> {
  sleep_until(Instant::now().checked_add(duration))
}

/// Really sleeps until the calling thread is interrupted. Always returns `Interrupted`.
pub fn sleep_indefinitely() -> io::Result<()> {
  sleep_until(None)
}

fn sleep_until(deadline: Option<Instant>) -> io::Result<()> {
  LOCAL.with(|local| loop {
    if local.handle.signal.take_interrupt() {
      return Err(error::interrupted());
    }
    match deadline {
      Some(deadline) => {
        let now = Instant::now();
        if now >= deadline {
          return Ok(());
        }
        local.parker.park_timeout(deadline - now);
      },
      None => local.parker.park()
    }
  })
}

/// Really parks the calling thread. Returns early when unparked, and possibly spuriously.
pub fn park(timeout: ParkTimeout) {
  match timeout {
    ParkTimeout::Relative(0) => std::thread::park(),
    ParkTimeout::Relative(nanos) if nanos > 0 => std::thread::park_timeout(Duration::from_nanos(nanos as u64)),
    ParkTimeout::Relative(_) => (),
    ParkTimeout::Deadline(millis) => {
      let now = sys::wall_millis();
      if millis > now {
        std::thread::park_timeout(Duration::from_millis((millis - now) as u64));
      }
    }
  }
}

/// Really waits on `cv`, releasing `guard` while blocked.
/// Returns once notified (or spuriously woken), once `timeout` elapses, or once interrupted.
/// The lock is held again in every case, including `Interrupted`.
pub(crate) fn wait_on<'a, T>(
  cv: &Arc<Condvar>,
  mut guard: MutexGuard<'a, T>,
  timeout: Option<Duration>
) -> (MutexGuard<'a, T>, io::Result<()>) {
  let handle = current();
  *handle.signal.lock_blocker() = Some(Arc::clone(cv));
  let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

  let result = loop {
    if handle.signal.take_interrupt() {
      break Err(error::interrupted());
    }

    let slice = match deadline {
      Some(deadline) => {
        let now = Instant::now();
        if now >= deadline {
          break Ok(());
        }
        std::cmp::min(deadline - now, INTERRUPT_POLL)
      },
      None => INTERRUPT_POLL
    };

    let (next_guard, res) = cv.wait_timeout(guard, slice).expect("Could not acquire unpoisoned monitor lock");
    guard = next_guard;
    if !res.timed_out() {
      break if handle.signal.take_interrupt() { Err(error::interrupted()) } else { Ok(()) };
    }
  };

  *handle.signal.lock_blocker() = None;
  (guard, result)
}
