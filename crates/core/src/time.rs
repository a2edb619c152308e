use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Time source shared by services so that exam timing stays deterministic in tests.
///
/// `Manual` clocks share their instant between clones: advancing one handle
/// moves every copy, which lets a test hand a clock to the engine and still
/// move time forward between load and submit.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
    /// Returns a clock that reads the current system time.
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    /// Returns a manual clock starting at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(Mutex::new(at)))
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Manual(at) => *at.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Move a manual clock forward by `delta`. No effect on `Clock::System`.
    pub fn advance(&self, delta: Duration) {
        if let Clock::Manual(at) = self {
            let mut guard = at.lock().unwrap_or_else(PoisonError::into_inner);
            *guard += delta;
        }
    }

    /// Whole seconds elapsed since `since`, floored and never negative.
    #[must_use]
    pub fn seconds_since(&self, since: DateTime<Utc>) -> u64 {
        let elapsed = self.now().signed_duration_since(since).num_seconds();
        u64::try_from(elapsed).unwrap_or(0)
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Clock::System)
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a manual `Clock` starting at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
