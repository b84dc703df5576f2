//! In-memory event and likes sources backed by `tokio::sync::watch`.
//!
//! Used by the demo binary and tests. Every mutation replaces the stored
//! snapshot and wakes live subscribers, mirroring how a document database
//! pushes whole query results.

use super::sources::{
    EventFetch, EventSource, EventStream, LikesSource, LikesStream, SourceError,
};
use super::types::{Event, EventStatus};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

fn read<T: Clone>(slot: &Mutex<T>) -> T {
    match slot.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write<T>(slot: &Mutex<T>, value: T) {
    match slot.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

/// Event source holding one shared snapshot
#[derive(Clone)]
pub struct InMemoryEventSource {
    events: Arc<watch::Sender<Vec<Event>>>,
    fetch_failure: Arc<Mutex<Option<SourceError>>>,
    fetch_delay: Arc<Mutex<Duration>>,
    fetches: Arc<AtomicUsize>,
}

impl InMemoryEventSource {
    /// Create a source seeded with `events`
    #[must_use]
    pub fn new(events: Vec<Event>) -> Self {
        let (events, _) = watch::channel(events);
        Self {
            events: Arc::new(events),
            fetch_failure: Arc::new(Mutex::new(None)),
            fetch_delay: Arc::new(Mutex::new(Duration::ZERO)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the whole snapshot
    pub fn publish(&self, events: Vec<Event>) {
        self.events.send_replace(events);
    }

    /// Insert or replace one event by id
    pub fn upsert(&self, event: Event) {
        self.events.send_modify(|events| {
            match events.iter_mut().find(|e| e.event_id == event.event_id) {
                Some(existing) => *existing = event,
                None => events.push(event),
            }
        });
    }

    /// Remove one event by id
    pub fn remove(&self, event_id: &str) {
        self.events
            .send_modify(|events| events.retain(|e| e.event_id != event_id));
    }

    /// Make one-shot fetches fail with `error` until reset with `None`
    pub fn fail_fetches_with(&self, error: Option<SourceError>) {
        write(&self.fetch_failure, error);
    }

    /// Delay every one-shot fetch by `delay`
    pub fn set_fetch_delay(&self, delay: Duration) {
        write(&self.fetch_delay, delay);
    }

    /// Number of one-shot fetches served so far
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn watch_filtered<F>(&self, keep: F) -> EventStream
    where
        F: Fn(&Event) -> bool + Send + 'static,
    {
        let mut receiver = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                let snapshot: Vec<Event> = receiver
                    .borrow_and_update()
                    .iter()
                    .filter(|event| keep(event))
                    .cloned()
                    .collect();
                yield Ok(snapshot);

                if receiver.changed().await.is_err() {
                    yield Err(SourceError::Closed);
                    break;
                }
            }
        })
    }

    fn fetch_filtered<F>(&self, keep: F) -> EventFetch<'_>
    where
        F: Fn(&Event) -> bool + Send + 'static,
    {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);

            let delay = read(&self.fetch_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = read(&self.fetch_failure) {
                return Err(error);
            }

            Ok(self
                .events
                .borrow()
                .iter()
                .filter(|event| keep(event))
                .cloned()
                .collect())
        })
    }
}

impl EventSource for InMemoryEventSource {
    fn events_by_status(&self, status: EventStatus) -> EventStream {
        self.watch_filtered(move |event| event.status == status)
    }

    fn events_by_organization(&self, organization_id: &str) -> EventStream {
        let organization_id = organization_id.to_owned();
        self.watch_filtered(move |event| event.organization_id == organization_id)
    }

    fn fetch_events(&self, status: EventStatus) -> EventFetch<'_> {
        self.fetch_filtered(move |event| event.status == status)
    }

    fn fetch_events_by_organization(&self, organization_id: &str) -> EventFetch<'_> {
        let organization_id = organization_id.to_owned();
        self.fetch_filtered(move |event| event.organization_id == organization_id)
    }
}

/// Likes source keyed by user id
#[derive(Clone)]
pub struct InMemoryLikesSource {
    likes: Arc<watch::Sender<HashMap<String, HashSet<String>>>>,
}

impl Default for InMemoryLikesSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLikesSource {
    /// Create a source with no likes
    #[must_use]
    pub fn new() -> Self {
        let (likes, _) = watch::channel(HashMap::new());
        Self {
            likes: Arc::new(likes),
        }
    }

    /// Replace a user's liked ids
    pub fn set_likes<I, T>(&self, user_id: &str, event_ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let ids: HashSet<String> = event_ids.into_iter().map(Into::into).collect();
        self.likes.send_modify(|likes| {
            likes.insert(user_id.to_owned(), ids);
        });
    }

    /// Add one like
    pub fn like(&self, user_id: &str, event_id: &str) {
        self.likes.send_modify(|likes| {
            likes
                .entry(user_id.to_owned())
                .or_default()
                .insert(event_id.to_owned());
        });
    }

    /// Remove one like
    pub fn unlike(&self, user_id: &str, event_id: &str) {
        self.likes.send_modify(|likes| {
            if let Some(ids) = likes.get_mut(user_id) {
                ids.remove(event_id);
            }
        });
    }
}

impl LikesSource for InMemoryLikesSource {
    fn favorite_events(&self, user_id: &str) -> LikesStream {
        let user_id = user_id.to_owned();
        let mut receiver = self.likes.subscribe();

        Box::pin(async_stream::stream! {
            let mut last: Option<HashSet<String>> = None;
            loop {
                let current = receiver
                    .borrow_and_update()
                    .get(&user_id)
                    .cloned()
                    .unwrap_or_default();

                // Other users' changes wake us too; only emit our own.
                if last.as_ref() != Some(&current) {
                    last = Some(current.clone());
                    yield Ok(current);
                }

                if receiver.changed().await.is_err() {
                    yield Err(SourceError::Closed);
                    break;
                }
            }
        })
    }
}
