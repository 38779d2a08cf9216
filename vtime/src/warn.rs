use log::warn;

use crate::Clock;

pub fn replacing_global_clock(previous: &dyn Clock) {
  warn!("A global clock was already installed and will be replaced: {:?}", previous)
}

pub fn slowdown_without_effect() {
  warn!("Slowdown of 1 leaves the clock running at real speed")
}
