use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};
use std::thread::{JoinHandle, ThreadId};

use log::{debug, trace, warn};

use crate::sys::SystemClock;
use crate::Clock;

type Tier = HashMap<ThreadId, Arc<dyn Clock>>;

#[derive(Default)]
struct Tiers {
  // lowest priority
  global: RwLock<Option<Arc<dyn Clock>>>,
  // medium priority, copied into children spawned through the resolver
  inheritable: Mutex<Tier>,
  // highest priority
  local: Mutex<Tier>
}

/// Decides which clock is in effect for each thread.
///
/// A thread's own clock takes precedence over the clock it inherited (or set for itself
/// and its children), which takes precedence over the global clock. With none of them set,
/// the [`SystemClock`] is in effect.
///
/// Threads spawned through [`spawn`](VirtualClock::spawn) start with a copy of the parent's
/// inheritable clock. Later changes in the parent do not reach children already spawned.
/// A thread's overrides are dropped when it exits, however it was spawned.
#[derive(Clone, Default)]
pub struct VirtualClock {
  tiers: Arc<Tiers>
}

impl Tiers {
  fn forget(&self, id: ThreadId) {
    lock(&self.inheritable).remove(&id);
    lock(&self.local).remove(&id);
  }
}

// Every resolver holding an entry for this thread, cleared when the thread exits
struct Overrides {
  id: ThreadId,
  tiers: Vec<Weak<Tiers>>
}

impl Drop for Overrides {
  fn drop(&mut self) {
    for tiers in self.tiers.iter().filter_map(Weak::upgrade) {
      tiers.forget(self.id);
    }
  }
}

thread_local! {
  static OVERRIDES: RefCell<Option<Overrides>> = RefCell::new(None);
}

fn forget_on_exit(tiers: &Arc<Tiers>) {
  let tracked = OVERRIDES.try_with(|overrides| {
    let mut overrides = overrides.borrow_mut();
    let overrides = overrides.get_or_insert_with(|| Overrides { id: current_id(), tiers: vec![] });
    overrides.tiers.retain(|held| held.strong_count() > 0);
    let weak = Arc::downgrade(tiers);
    if !overrides.tiers.iter().any(|held| held.ptr_eq(&weak)) {
      overrides.tiers.push(weak);
    }
  });
  if tracked.is_err() {
    warn!("Clock override set while its thread exits will not be cleared");
  }
}

fn insert(tiers: &Arc<Tiers>, tier: &Mutex<Tier>, clock: Arc<dyn Clock>) {
  forget_on_exit(tiers);
  lock(tier).insert(current_id(), clock);
}

fn lock(tier: &Mutex<Tier>) -> MutexGuard<Tier> {
  tier.lock().expect("Could not acquire unpoisoned clock tier lock")
}

fn current_id() -> ThreadId {
  std::thread::current().id()
}

impl VirtualClock {
  pub fn new() -> VirtualClock {
    VirtualClock::default()
  }

  /// The resolver shared by the whole process.
  pub fn process() -> &'static VirtualClock {
    static PROCESS: OnceLock<VirtualClock> = OnceLock::new();
    PROCESS.get_or_init(VirtualClock::new)
  }

  /// Puts `clock` in effect for all threads, unless overridden per thread.
  pub fn set_global(&self, clock: Arc<dyn Clock>) {
    debug!("Global clock set to {:?}", clock);
    *self.tiers.global.write().expect("Could not acquire unpoisoned global clock lock") = Some(clock);
  }

  /// Returns the previously installed global clock, if any.
  pub fn clear_global(&self) -> Option<Arc<dyn Clock>> {
    debug!("Global clock cleared");
    self.tiers.global.write().expect("Could not acquire unpoisoned global clock lock").take()
  }

  pub fn global(&self) -> Option<Arc<dyn Clock>> {
    self.tiers.global.read().expect("Could not acquire unpoisoned global clock lock").clone()
  }

  /// Puts `clock` in effect for the current thread and its future children,
  /// unless overridden by [`set_for_current_thread`](VirtualClock::set_for_current_thread).
  pub fn set_for_current_thread_and_children(&self, clock: Arc<dyn Clock>) {
    debug!("Inheritable clock of {:?} set to {:?}", current_id(), clock);
    insert(&self.tiers, &self.tiers.inheritable, clock);
  }

  /// Puts `clock` in effect for the current thread only.
  pub fn set_for_current_thread(&self, clock: Arc<dyn Clock>) {
    debug!("Clock of {:?} set to {:?}", current_id(), clock);
    insert(&self.tiers, &self.tiers.local, clock);
  }

  /// Puts `clock` in effect for future children, but not the current thread,
  /// which keeps the clock it resolves to now.
  pub fn set_for_child_threads(&self, clock: Arc<dyn Clock>) {
    let current = self.get();
    self.set_for_current_thread_and_children(clock);
    self.set_for_current_thread(current);
  }

  /// Puts `clock` in effect for all threads except the current one,
  /// which keeps the clock it resolves to now.
  pub fn set_global_except_current_thread(&self, clock: Arc<dyn Clock>) {
    let current = self.get();
    self.set_global(clock);
    self.set_for_current_thread(current);
  }

  /// Drops both per-thread overrides of the current thread.
  pub fn clear_current_thread(&self) {
    let id = current_id();
    debug!("Clocks of {:?} cleared", id);
    self.tiers.forget(id);
  }

  /// The clock in effect for the current thread.
  pub fn get(&self) -> Arc<dyn Clock> {
    let id = current_id();
    if let Some(clock) = lock(&self.tiers.local).get(&id) {
      return Arc::clone(clock);
    }
    if let Some(clock) = lock(&self.tiers.inheritable).get(&id) {
      return Arc::clone(clock);
    }
    self.global().unwrap_or_else(SystemClock::instance)
  }

  /// Spawns a thread which inherits the current thread's inheritable clock.
  pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
  where F: FnOnce() -> T + Send + 'static, T: Send + 'static {
    self.spawn_with(std::thread::Builder::new(), f).expect("Could not spawn thread")
  }

  /// Like [`spawn`](VirtualClock::spawn), for a configured `std::thread::Builder`.
  pub fn spawn_with<F, T>(&self, builder: std::thread::Builder, f: F) -> io::Result<JoinHandle<T>>
  where F: FnOnce() -> T + Send + 'static, T: Send + 'static {
    let inherited = lock(&self.tiers.inheritable).get(&current_id()).cloned();
    let tiers = Arc::clone(&self.tiers);
    builder.spawn(move || {
      if let Some(clock) = inherited {
        trace!("{:?} inherits {:?}", current_id(), clock);
        insert(&tiers, &tiers.inheritable, clock);
      }
      f()
    })
  }
}

impl fmt::Debug for VirtualClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VirtualClock")
      .field("global", &self.global())
      .field("inheritable", &lock(&self.tiers.inheritable).len())
      .field("local", &lock(&self.tiers.local).len())
      .finish()
  }
}

// Process-wide shorthands

pub fn set_global(clock: Arc<dyn Clock>) {
  VirtualClock::process().set_global(clock)
}

pub fn set_for_current_thread(clock: Arc<dyn Clock>) {
  VirtualClock::process().set_for_current_thread(clock)
}

pub fn set_for_current_thread_and_children(clock: Arc<dyn Clock>) {
  VirtualClock::process().set_for_current_thread_and_children(clock)
}

pub fn set_for_child_threads(clock: Arc<dyn Clock>) {
  VirtualClock::process().set_for_child_threads(clock)
}

pub fn set_global_except_current_thread(clock: Arc<dyn Clock>) {
  VirtualClock::process().set_global_except_current_thread(clock)
}

pub fn get() -> Arc<dyn Clock> {
  VirtualClock::process().get()
}

pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where F: FnOnce() -> T + Send + 'static, T: Send + 'static {
  VirtualClock::process().spawn(f)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crossbeam::channel;

  use super::VirtualClock;
  use crate::{Clock, ManualClock};

  fn clock(start_time: i64) -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(start_time).expect("Could not create clock"))
  }

  #[test]
  fn defaults_to_system_clock() {
    let resolver = VirtualClock::new();
    assert_eq!(format!("{:?}", resolver.get()), "SystemClock");
  }

  #[test]
  fn clear_current_thread_falls_back_to_global() {
    let resolver = VirtualClock::new();
    resolver.set_global(clock(1));
    resolver.set_for_current_thread_and_children(clock(2));
    resolver.set_for_current_thread(clock(3));
    assert_eq!(resolver.get().current_time_millis(), 3);

    resolver.clear_current_thread();
    assert_eq!(resolver.get().current_time_millis(), 1);
    assert!(resolver.clear_global().is_some());
    assert_eq!(format!("{:?}", resolver.get()), "SystemClock");
  }

  #[test]
  fn spawned_thread_entries_are_dropped_on_exit() {
    let resolver = VirtualClock::new();
    resolver.set_for_current_thread_and_children(clock(2));
    let child_resolver = resolver.clone();
    resolver.spawn(move || child_resolver.set_for_current_thread(clock(3)))
      .join().expect("Child panicked");

    // Only the parent's inheritable entry is left
    assert_eq!(format!("{:?}", resolver), "VirtualClock { global: None, inheritable: 1, local: 0 }");
  }

  #[test]
  fn plain_thread_entries_are_dropped_on_exit() {
    let resolver = VirtualClock::new();
    let threads: Vec<_> = (0..50).map(|i| {
      let resolver = resolver.clone();
      std::thread::spawn(move || {
        resolver.set_for_current_thread(clock(i));
        resolver.set_for_current_thread_and_children(clock(i));
        assert_eq!(resolver.get().current_time_millis(), i);
      })
    }).collect();
    for thread in threads {
      thread.join().expect("Thread panicked");
    }

    assert_eq!(format!("{:?}", resolver), "VirtualClock { global: None, inheritable: 0, local: 0 }");
  }

  #[test]
  fn thread_outliving_its_resolver_exits_cleanly() {
    let resolver = VirtualClock::new();
    let (tx, rx) = channel::bounded::<()>(0);
    let child_resolver = resolver.clone();
    let child = std::thread::spawn(move || {
      child_resolver.set_for_current_thread(clock(4));
      drop(child_resolver);
      rx.recv().expect("Could not receive exit signal");
    });

    drop(resolver);
    tx.send(()).expect("Could not send exit signal");
    child.join().expect("Child panicked");
  }
}
