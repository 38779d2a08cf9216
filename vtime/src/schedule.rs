use std::cmp::Ordering;

/// Position of one entry in a [`Schedule`]: its deadline, then its arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key {
  deadline: i64,
  seq: u64
}

impl Key {
  pub fn deadline(&self) -> i64 {
    self.deadline
  }
}

/// Entries sorted by deadline, ties in arrival order.
pub struct Schedule<T> {
  entries: Vec<(Key, T)>,
  next_seq: u64
}

impl<T> Schedule<T> {
  pub fn new() -> Schedule<T> {
    Schedule {
      entries: vec![],
      next_seq: 0
    }
  }

  fn find(&self, key: Key) -> Result<usize, usize> {
    self.entries.binary_search_by(|(existing, _)| existing.cmp(&key))
  }

  // Index of the first entry due strictly after `now`
  fn find_after(&self, now: i64) -> usize {
    self.entries.binary_search_by(|(existing, _)| {
      if existing.deadline <= now { Ordering::Less } else { Ordering::Greater }
    }).unwrap_or_else(|idx| idx)
  }

  pub fn add(&mut self, deadline: i64, what: T) -> Key {
    let key = Key { deadline, seq: self.next_seq };
    self.next_seq += 1;
    let idx = self.find(key).unwrap_or_else(|idx| idx);
    self.entries.insert(idx, (key, what));
    key
  }

  /// Removes the entry so it is never yielded. Returns false if it already expired.
  pub fn disable(&mut self, key: Key) -> bool {
    match self.find(key) {
      Ok(idx) => {
        self.entries.remove(idx);
        true
      },
      Err(_) => false
    }
  }

  pub fn when_next(&self) -> Option<i64> {
    self.entries.first().map(|(key, _)| key.deadline)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Removes every entry due at or before `now`, yielding them in order.
  pub fn expire(&mut self, now: i64) -> impl Iterator<Item = T> + '_ {
    let range_end = self.find_after(now);
    self.entries.drain(..range_end).map(|(_, what)| what)
  }
}
