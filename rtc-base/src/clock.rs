// A Clock is a monotonic millisecond source. RTC never reads the wall clock
// directly: every timestamp used for reaping or lock bookkeeping comes from
// a Clock so that tests can drive time forward without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since some fixed epoch. Only meaningful relative to other
/// `Millis` values produced by the same `Clock`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Millis(pub i64);

impl Millis {
    /// The sentinel value meaning "currently executing, do not reap".
    pub const SUSPENDED_ZERO: Millis = Millis(0);

    pub fn is_suspended(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: Millis) -> i64 {
        self.0.saturating_sub(other.0)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

/// A real wall-clock source, backed by `SystemTime`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Millis(d.as_millis() as i64)
    }
}

/// A settable clock for deterministic tests (Reaper timeout scenarios in
/// particular need to advance time without sleeping).
#[derive(Debug, Default)]
pub struct FakeClock {
    millis: AtomicI64,
}

impl FakeClock {
    pub fn new(start: i64) -> Self {
        Self {
            millis: AtomicI64::new(start),
        }
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Millis {
        Millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let c = FakeClock::new(10);
        assert_eq!(c.now(), Millis(10));
        c.advance(5);
        assert_eq!(c.now(), Millis(15));
        c.set(0);
        assert!(c.now().is_suspended());
    }

    #[test]
    fn system_clock_is_nonzero() {
        let c = SystemClock;
        assert!(c.now().0 > 0);
    }
}
