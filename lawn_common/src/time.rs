//! Monotonic timestamps shared by every safety component.
//!
//! `Timestamp` is microseconds since a process-wide monotonic origin. It is
//! `Copy`, totally ordered, and serializable so audit entries can carry it
//! verbatim. Tests construct timestamps directly with [`Timestamp::from_micros`].

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

static ORIGIN: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Monotonic instant in microseconds since process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Zero instant.
    pub const ZERO: Self = Self(0);

    /// Current monotonic time.
    #[inline]
    pub fn now() -> Self {
        Self(ORIGIN.elapsed().as_micros() as u64)
    }

    #[inline]
    pub const fn from_micros(us: u64) -> Self {
        Self(us)
    }

    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1000)
    }

    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Elapsed time from `earlier` to `self`. Saturates at zero when
    /// `earlier` is in the future (clock skew between producers).
    #[inline]
    pub const fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    #[inline]
    pub const fn offset_by(&self, d: Duration) -> Self {
        Self(self.0 + d.as_micros() as u64)
    }
}

/// Wall-clock microseconds since the UNIX epoch, for persisted records.
pub fn unix_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
