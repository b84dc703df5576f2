//! # OnePass Testing
//!
//! Testing utilities for OnePass reducers.
//!
//! This crate provides:
//! - Deterministic [`Clock`] implementations ([`FixedClock`], [`ManualClock`])
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - Effect assertion helpers
//!
//! ## Example
//!
//! ```ignore
//! use onepass_testing::{test_clock, ReducerTest, assertions};
//!
//! ReducerTest::new(FeedReducer::new())
//!     .with_env(test_environment())
//!     .given_state(FeedState::default())
//!     .when_action(FeedAction::SetMode { mode: FeedMode::Favorites })
//!     .then_state(|state| assert_eq!(state.mode, FeedMode::Favorites))
//!     .then_effects(assertions::assert_no_effects)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use onepass_core::environment::Clock;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use onepass_testing::mocks::FixedClock;
    /// use onepass_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// Create a fixed clock at the given epoch second
        ///
        /// Out-of-range values fall back to the Unix epoch.
        #[must_use]
        pub fn at_epoch_seconds(seconds: i64) -> Self {
            Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test advances it
    ///
    /// Clones share the same underlying time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        seconds: Arc<AtomicI64>,
    }

    impl ManualClock {
        /// Create a manual clock starting at the given epoch second
        #[must_use]
        pub fn starting_at(seconds: i64) -> Self {
            Self {
                seconds: Arc::new(AtomicI64::new(seconds)),
            }
        }

        /// Move the clock forward by `seconds`
        pub fn advance(&self, seconds: i64) {
            self.seconds.fetch_add(seconds, Ordering::SeqCst);
        }

        /// Jump to an absolute epoch second
        pub fn set(&self, seconds: i64) {
            self.seconds.store(seconds, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.seconds.load(Ordering::SeqCst), 0).unwrap_or_default()
        }
    }

    /// Epoch second used by [`test_clock`]: 2025-01-01 00:00:00 UTC
    pub const TEST_EPOCH_SECONDS: i64 = 1_735_689_600;

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::at_epoch_seconds(TEST_EPOCH_SECONDS)
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock, ManualClock, TEST_EPOCH_SECONDS};
pub use reducer_test::{assertions, ReducerTest};
