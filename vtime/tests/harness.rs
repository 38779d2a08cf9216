#![allow(dead_code)]

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver};
use vtime::ManualClock;

// Real time allowed for a woken thread to report back
pub const WAKE_GRACE: Duration = Duration::from_secs(5);
// Real time during which a thread that should stay blocked must not report
pub const STILL_BLOCKED: Duration = Duration::from_millis(100);

pub fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

pub fn manual_clock(start_time: i64) -> Arc<ManualClock> {
  init_logging();
  Arc::new(ManualClock::new(start_time).expect("Could not create manual clock"))
}

/// Blocks (in real time) until `count` threads are registered on the clock.
pub fn wait_for_waiters(clock: &ManualClock, count: usize) {
  let give_up = Instant::now() + WAKE_GRACE;
  while clock.pending_waiters() < count {
    assert!(Instant::now() < give_up, "Expected {} waiters, found {}", count, clock.pending_waiters());
    std::thread::sleep(Duration::from_millis(1));
  }
}

pub struct Blocked<T> {
  pub handle: JoinHandle<()>,
  pub thread: vtime::ThreadHandle,
  pub done: Receiver<T>
}

/// Runs `f` on a new thread, reporting its result over a channel once it returns.
pub fn spawn_blocking<T, F>(f: F) -> Blocked<T>
where T: Send + 'static, F: FnOnce() -> T + Send + 'static {
  let (tx_thread, rx_thread) = channel::bounded(1);
  let (tx_done, rx_done) = channel::unbounded();
  let handle = std::thread::spawn(move || {
    tx_thread.send(vtime::thread::current()).expect("Could not send thread handle");
    tx_done.send(f()).expect("Could not report result");
  });
  let thread = rx_thread.recv().expect("Could not receive thread handle");
  Blocked { handle, thread, done: rx_done }
}

impl<T: std::fmt::Debug> Blocked<T> {
  pub fn assert_still_blocked(&self) {
    if let Ok(result) = self.done.recv_timeout(STILL_BLOCKED) {
      panic!("Expected thread to still be blocked, but it returned {:?}", result);
    }
  }

  pub fn finish(self) -> T {
    let result = self.done.recv_timeout(WAKE_GRACE).expect("Thread did not wake up");
    self.handle.join().expect("Blocked thread panicked");
    result
  }
}
