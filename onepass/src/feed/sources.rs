//! Upstream collaborators the feed consumes.
//!
//! Implementations live outside this crate (a document database in the
//! mobile app). Traits return boxed streams and futures so they can be used
//! as `Arc<dyn EventSource>` inside a reducer environment.

use super::types::{Event, EventStatus};
use futures::Stream;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors reported by event and likes sources
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The backend could not be reached or answered with an error
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The caller may not read this data
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The live subscription ended
    #[error("Subscription closed")]
    Closed,
}

/// Live stream of full event snapshots
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Vec<Event>, SourceError>> + Send>>;

/// Pending one-shot read of an event snapshot
pub type EventFetch<'a> = Pin<Box<dyn Future<Output = Result<Vec<Event>, SourceError>> + Send + 'a>>;

/// Live stream of liked event id snapshots
pub type LikesStream = Pin<Box<dyn Stream<Item = Result<HashSet<String>, SourceError>> + Send>>;

/// Source of events
pub trait EventSource: Send + Sync {
    /// Live snapshots of every event with the given status
    fn events_by_status(&self, status: EventStatus) -> EventStream;

    /// Live snapshots of every event published by one organization
    fn events_by_organization(&self, organization_id: &str) -> EventStream;

    /// One-shot read of every event with the given status
    fn fetch_events(&self, status: EventStatus) -> EventFetch<'_>;

    /// One-shot read of every event of one organization
    fn fetch_events_by_organization(&self, organization_id: &str) -> EventFetch<'_>;
}

/// Source of a user's liked events
pub trait LikesSource: Send + Sync {
    /// Live snapshots of the ids a user has liked
    fn favorite_events(&self, user_id: &str) -> LikesStream;
}
