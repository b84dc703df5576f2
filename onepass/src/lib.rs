//! # OnePass
//!
//! Signed digital passes and a content-based event feed.
//!
//! - [`pass`]: the `onepass:user:v1.` QR token format. Encodes a pass's
//!   identity fields into a URL-safe signed token, decodes it back with
//!   strict rejection of unreadable input, and checks signature shape.
//! - [`feed`]: ranks live event snapshots for a user. Scores candidates by
//!   tag affinity, recency and urgency, demotes events about to close,
//!   splits a ranked main feed from a chronological favorites feed, and
//!   re-derives the list whenever one of its inputs changes.
//!
//! # Architecture
//!
//! ```text
//!  EventSource ──┐                       ┌──► FeedState.events
//!                ├─► FeedSubscription ─► Store<FeedReducer>
//!  LikesSource ──┘                       └──► Effects (refresh, debounce)
//! ```
//!
//! The feed reducer is pure; the [`onepass_runtime::Store`] serialises every
//! action through it and runs the effects it returns. Time comes from an
//! injected [`onepass_core::environment::Clock`].

pub mod config;
pub mod feed;
pub mod metrics;
pub mod pass;

pub use config::{Config, ConfigError};
pub use feed::{FeedAction, FeedError, FeedState, FeedStore};
pub use pass::{Pass, PassError, PassStatus};
