//! Bridges live upstream streams into a feed store.
//!
//! One consumer task owns both subscriptions and forwards whichever emits
//! first. Ordering between the two streams is never assumed; the reducer
//! recomputes from its latest snapshots on every delivery.

use super::reducer::FeedAction;
use super::sources::{EventSource, LikesSource};
use super::types::{EventStatus, FeedScope};
use super::FeedStore;
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The upstream collaborators a subscription reads from
#[derive(Clone)]
pub struct FeedSources {
    /// Event snapshots
    pub events: Arc<dyn EventSource>,
    /// Liked ids
    pub likes: Arc<dyn LikesSource>,
}

impl FeedSources {
    /// Bundle both sources
    #[must_use]
    pub fn new(events: Arc<dyn EventSource>, likes: Arc<dyn LikesSource>) -> Self {
        Self { events, likes }
    }
}

/// Running subscription; dropping it stops the consumer task
pub struct FeedSubscription {
    task: JoinHandle<()>,
}

impl FeedSubscription {
    /// Start forwarding both live streams into `store`
    ///
    /// `scope` should match the scope of the store's [`FeedEnvironment`] so
    /// that a manual refresh reads the same event set.
    ///
    /// [`FeedEnvironment`]: super::FeedEnvironment
    ///
    /// The task ends when both streams have ended or the store stops
    /// accepting actions.
    #[must_use]
    pub fn spawn(
        store: FeedStore,
        sources: &FeedSources,
        scope: FeedScope,
        user_id: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        let mut events = match &scope {
            FeedScope::Published => sources.events.events_by_status(EventStatus::Published),
            FeedScope::Organization(id) => sources.events.events_by_organization(id),
        };
        let mut likes = sources.likes.favorite_events(&user_id);

        let task = tokio::spawn(async move {
            tracing::info!(?scope, user_id = %user_id, "Feed subscription started");
            let mut events_open = true;
            let mut likes_open = true;

            loop {
                let action = tokio::select! {
                    next = events.next(), if events_open => match next {
                        Some(Ok(events)) => Some(FeedAction::EventsSnapshot { events }),
                        Some(Err(error)) => Some(FeedAction::EventsLoadFailed { error }),
                        None => {
                            events_open = false;
                            None
                        },
                    },
                    next = likes.next(), if likes_open => match next {
                        Some(Ok(liked)) => Some(FeedAction::LikesSnapshot { liked }),
                        Some(Err(error)) => {
                            // Likes only personalise the feed; keep the last snapshot.
                            tracing::warn!(%error, "Likes subscription failed");
                            None
                        },
                        None => {
                            likes_open = false;
                            None
                        },
                    },
                    else => break,
                };

                if let Some(action) = action {
                    if let Err(error) = store.send(action).await {
                        tracing::debug!(%error, "Feed store gone, stopping subscription");
                        break;
                    }
                }
            }

            tracing::info!("Feed subscription stopped");
        });

        Self { task }
    }

    /// Whether the consumer task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the consumer task
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
