//! Content-based event feed.
//!
//! - [`ranking`]: pure scoring, filtering and ordering
//! - [`reducer`]: state machine holding the last-known snapshots
//! - [`sources`]: collaborator traits for events and likes
//! - [`subscription`]: merges live streams into a [`FeedStore`]
//! - [`memory`]: in-memory sources for demos and tests

pub mod error;
pub mod memory;
pub mod ranking;
pub mod reducer;
pub mod sources;
pub mod subscription;
pub mod types;

pub use error::FeedError;
pub use memory::{InMemoryEventSource, InMemoryLikesSource};
pub use ranking::{
    active_events, favorites_feed, is_active, rank_main_feed, recalculate, score_event,
    FeedInputs, InterestProfile, ScoreBreakdown, MAX_FEED_RESULTS,
};
pub use reducer::{FeedAction, FeedEnvironment, FeedReducer, FeedSettings, FeedState};
pub use sources::{EventFetch, EventSource, EventStream, LikesSource, LikesStream, SourceError};
pub use subscription::{FeedSources, FeedSubscription};
pub use types::{DateRange, Event, EventFilters, EventStatus, FeedMode, FeedScope};

use onepass_runtime::Store;

/// Store running the feed reducer
pub type FeedStore = Store<FeedState, FeedAction, FeedEnvironment, FeedReducer>;
