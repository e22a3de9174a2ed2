// marketplace/src/clock.rs

//! Wall-clock access. The 48-hour fund-release lock is evaluated against
//! `Clock::now()` at the moment of the release action, so tests swap in a
//! [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    ManualClock(Mutex::new(start))
  }

  pub fn set(&self, at: DateTime<Utc>) {
    *self.0.lock() = at;
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.0.lock();
    *now = *now + by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.0.lock()
  }
}
