use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// A monotonically non-decreasing nanosecond time source.
///
/// The cache core never reads wall-clock time directly; it only ever asks a
/// `Clock` for `now_nanos()`. This keeps the core immune to clock adjustments
/// and makes TTL behavior fully deterministic under test with [`FakeClock`].
pub trait Clock: fmt::Debug {
    /// Returns a monotonically non-decreasing nanosecond reading.
    fn now_nanos(&self) -> u64;
}

/// The default [`Clock`], backed by [`std::time::Instant`].
///
/// Readings are nanoseconds elapsed since the first call made to *any*
/// `SystemClock` in the process, so that timestamps taken from distinct
/// `SystemClock` instances remain comparable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    fn epoch() -> Instant {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        *EPOCH.get_or_init(Instant::now)
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        Self::epoch().elapsed().as_nanos() as u64
    }
}

/// A [`Clock`] whose reading only moves when told to, for deterministic tests
/// of TTL expiry boundaries without real sleeps.
///
/// Cloning a `FakeClock` shares its underlying reading, so a test can hand
/// one clone to a [`Cache`](crate::Cache) via `with_clock` and keep the other
/// to advance time from the outside:
///
/// ```
/// use boundedcache::clock::{Clock, FakeClock};
///
/// let clock = FakeClock::new();
/// assert_eq!(clock.now_nanos(), 0);
/// clock.advance(1_000);
/// assert_eq!(clock.now_nanos(), 1_000);
/// assert_eq!(clock.clone().now_nanos(), 1_000);
/// ```
#[derive(Debug, Default, Clone)]
pub struct FakeClock(Arc<AtomicU64>);

impl FakeClock {
    /// Creates a clock starting at reading `0`.
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    /// Advances the clock's reading by `nanos`.
    pub fn advance(&self, nanos: u64) {
        self.0.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Sets the clock's reading directly. Must not move it backward.
    pub fn set(&self, nanos: u64) {
        self.0.store(nanos, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_nanos(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
