use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "serde")] {
        use serde::{Deserialize, Serialize};
    }
}

/// Monotonic node time in seconds since boot.
pub type Tick = u64;

/// Restart-only timer over the node's tick clock. There is no mid-flight
/// cancel: a timer is re-armed with `restart` or left to expire.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timer {
    deadline: Tick,
    interval: Tick,
    periodic: bool,
    armed: bool,
}

impl Timer {
    pub fn periodic(now: Tick, interval: Tick) -> Self {
        Self {
            deadline: now + interval,
            interval,
            periodic: true,
            armed: true,
        }
    }

    pub fn oneshot(now: Tick, delay: Tick) -> Self {
        Self {
            deadline: now + delay,
            interval: delay,
            periodic: false,
            armed: true,
        }
    }

    pub fn expired(&self, now: Tick) -> bool {
        self.armed && now >= self.deadline
    }

    /// Consume an expiry: a periodic timer re-arms one interval from `now`,
    /// a one-shot disarms. Returns whether the timer had expired.
    pub fn fire(&mut self, now: Tick) -> bool {
        if !self.expired(now) {
            return false;
        }
        if self.periodic {
            self.deadline = now + self.interval;
        } else {
            self.armed = false;
        }
        true
    }

    /// Re-arm one full interval from `now`.
    pub fn restart(&mut self, now: Tick) {
        self.deadline = now + self.interval;
        self.armed = true;
    }

    pub fn remaining(&self, now: Tick) -> Option<Tick> {
        if !self.armed {
            return None;
        }
        Some(self.deadline.saturating_sub(now))
    }
}
