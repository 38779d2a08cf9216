use std::env;
use std::io;
use std::sync::Arc;

use log::info;

use crate::constants::{ENV_EPOCH, ENV_SLOWDOWN};
use crate::epoch::FixedEpochClock;
use crate::error;
use crate::resolver::VirtualClock;
use crate::scaled::ScaledClock;
use crate::sys::SystemClock;
use crate::warn;
use crate::Clock;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conf {
  // Run N times slower than the base clock
  pub slowdown: Option<u32>,

  // Milliseconds since 1970 the base clock should appear to start at
  pub epoch: Option<i64>
}

impl Conf {
  /// Reads `VTIME_SLOWDOWN` and `VTIME_EPOCH`. Unset variables leave the setting empty.
  pub fn from_env() -> io::Result<Conf> {
    Conf::from_lookup(|key| env::var(key).ok())
  }

  fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> io::Result<Conf> {
    Ok(Conf {
      slowdown: parse(ENV_SLOWDOWN, lookup(ENV_SLOWDOWN))?,
      epoch: parse(ENV_EPOCH, lookup(ENV_EPOCH))?
    })
  }
}

fn parse<T: std::str::FromStr>(key: &str, value: Option<String>) -> io::Result<Option<T>> {
  match value {
    None => Ok(None),
    Some(value) => value.trim().parse().map(Some).map_err(|_| error::bad_config(key, &value))
  }
}

/// Composes a clock from a [`Conf`]: base clock, then epoch rebasing, then slowdown.
pub struct Builder {
  conf: Conf,
  base: Option<Arc<dyn Clock>>
}

impl Builder {
  pub fn new() -> Builder {
    Builder { conf: Conf::default(), base: None }
  }

  pub fn from_env() -> io::Result<Builder> {
    Ok(Builder::from_conf(Conf::from_env()?))
  }

  pub fn from_conf(conf: Conf) -> Builder {
    Builder { conf, base: None }
  }

  pub fn slowdown(mut self, slowdown: u32) -> Builder {
    self.conf.slowdown = Some(slowdown);
    self
  }

  pub fn epoch(mut self, epoch: i64) -> Builder {
    self.conf.epoch = Some(epoch);
    self
  }

  /// Base clock to compose on; the system clock by default.
  pub fn clock(mut self, base: Arc<dyn Clock>) -> Builder {
    self.base = Some(base);
    self
  }

  pub fn build(self) -> io::Result<Arc<dyn Clock>> {
    let mut clock = self.base.unwrap_or_else(SystemClock::instance);
    if let Some(epoch) = self.conf.epoch {
      clock = Arc::new(FixedEpochClock::new(clock, epoch));
    }
    match self.conf.slowdown {
      Some(0) => return Err(error::bad_config(ENV_SLOWDOWN, "0")),
      Some(1) => warn::slowdown_without_effect(),
      Some(slowdown) => clock = Arc::new(ScaledClock::new(clock, 1.0 / f64::from(slowdown))?),
      None => ()
    }
    Ok(clock)
  }

  /// Builds the clock and puts it in effect globally in `resolver`.
  pub fn install_in(self, resolver: &VirtualClock) -> io::Result<Arc<dyn Clock>> {
    let clock = self.build()?;
    if let Some(previous) = resolver.global() {
      warn::replacing_global_clock(&*previous);
    }
    info!("Virtual time in effect: {:?}", clock);
    resolver.set_global(Arc::clone(&clock));
    Ok(clock)
  }

  /// Builds the clock and puts it in effect for the whole process.
  pub fn install(self) -> io::Result<Arc<dyn Clock>> {
    self.install_in(VirtualClock::process())
  }
}

impl Default for Builder {
  fn default() -> Builder {
    Builder::new()
  }
}
