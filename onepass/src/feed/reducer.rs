//! Feed state machine.
//!
//! The reducer owns the last-known snapshot of every ranking input (events,
//! likes, mode, filters, settled search text) and recomputes the visible list
//! from those snapshots whenever one of the re-derivation triggers fires:
//!
//! - a new event snapshot arrives
//! - a new likes snapshot arrives while the favorites feed is shown
//! - the mode changes
//! - filters or the settled search text change
//!
//! Likes arriving while the main feed is shown only update the stored
//! snapshot. The main feed picks them up on the next recomputation, which
//! keeps the discovery list from jumping under the user's finger.

use super::error::FeedError;
use super::ranking::{self, FeedInputs, MAX_FEED_RESULTS};
use super::sources::{EventSource, SourceError};
use super::types::{Event, EventFilters, EventStatus, FeedMode, FeedScope};
use onepass_core::effect::{Effect, EffectId};
use onepass_core::environment::Clock;
use onepass_core::reducer::Reducer;
use onepass_core::{smallvec, SmallVec};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Id of the pending search debounce timer
pub const SEARCH_DEBOUNCE: EffectId = EffectId::new("feed.search_debounce");

/// Id of the running manual refresh
pub const REFRESH: EffectId = EffectId::new("feed.refresh");

/// Tunables of the feed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedSettings {
    /// Main feed size limit
    pub max_results: usize,
    /// Shortest time a manual refresh takes
    pub refresh_min_duration: Duration,
    /// Deadline for a manual refresh
    pub refresh_timeout: Duration,
    /// Quiet period before search text is applied
    pub search_debounce: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            max_results: MAX_FEED_RESULTS,
            refresh_min_duration: Duration::from_secs(1),
            refresh_timeout: Duration::from_secs(10),
            search_debounce: Duration::from_millis(300),
        }
    }
}

/// Everything the feed screen renders
#[derive(Clone, Debug, PartialEq)]
pub struct FeedState {
    /// Latest raw snapshot from the event source
    pub all_events: Vec<Event>,
    /// Active subset of `all_events`, recomputed per snapshot
    pub active_events: Vec<Event>,
    /// Latest liked-ids snapshot
    pub liked_event_ids: HashSet<String>,
    /// Feed currently shown
    pub mode: FeedMode,
    /// Filters currently applied
    pub filters: EventFilters,
    /// Search text as typed
    pub search_input: String,
    /// Search text applied to the list
    pub search_query: String,
    /// Visible, ordered list
    pub events: Vec<Event>,
    /// Waiting for the first event snapshot
    pub is_loading: bool,
    /// A manual refresh is running
    pub is_refreshing: bool,
    /// Last failure, shown next to the (unchanged) list
    pub error: Option<FeedError>,
    /// Completion time of the last successful refresh, epoch seconds
    pub last_refreshed_at: Option<i64>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            all_events: Vec::new(),
            active_events: Vec::new(),
            liked_event_ids: HashSet::new(),
            mode: FeedMode::default(),
            filters: EventFilters::default(),
            search_input: String::new(),
            search_query: String::new(),
            events: Vec::new(),
            is_loading: true,
            is_refreshing: false,
            error: None,
            last_refreshed_at: None,
        }
    }
}

impl FeedState {
    /// Error text for display, if any
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Whether an event is in the user's likes
    #[must_use]
    pub fn is_liked(&self, event_id: &str) -> bool {
        self.liked_event_ids.contains(event_id)
    }
}

/// Inputs of the feed
#[derive(Clone, Debug, PartialEq)]
pub enum FeedAction {
    // ========== Upstream snapshots ==========
    /// The live event subscription emitted a snapshot
    EventsSnapshot {
        /// Full raw snapshot
        events: Vec<Event>,
    },
    /// The live event subscription failed
    EventsLoadFailed {
        /// What went wrong
        error: SourceError,
    },
    /// The live likes subscription emitted a snapshot
    LikesSnapshot {
        /// Every liked event id
        liked: HashSet<String>,
    },

    // ========== User intents ==========
    /// Switch between main and favorites feed
    SetMode {
        /// Feed to show
        mode: FeedMode,
    },
    /// Replace the filters
    ApplyFilters {
        /// New filters
        filters: EventFilters,
    },
    /// Reset every filter
    ClearFilters,
    /// Search text was edited
    SearchChanged {
        /// Text as typed
        query: String,
    },
    /// Pull to refresh
    Refresh,
    /// Hide the current error
    DismissError,

    // ========== Effect results ==========
    /// Debounce elapsed for a search text
    SearchSettled {
        /// Text to apply
        query: String,
    },
    /// Manual refresh fetched a snapshot
    RefreshCompleted {
        /// Fetched snapshot
        events: Vec<Event>,
    },
    /// Manual refresh failed or timed out
    RefreshFailed {
        /// What went wrong
        error: FeedError,
    },
}

/// Dependencies of the feed reducer
#[derive(Clone)]
pub struct FeedEnvironment {
    /// Time source for ranking and refresh stamps
    pub clock: Arc<dyn Clock>,
    /// Used by manual refresh
    pub events: Arc<dyn EventSource>,
    /// Event set a manual refresh reads
    pub scope: FeedScope,
    /// Tunables
    pub settings: FeedSettings,
}

impl FeedEnvironment {
    /// Create an environment with default settings
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, events: Arc<dyn EventSource>) -> Self {
        Self {
            clock,
            events,
            scope: FeedScope::default(),
            settings: FeedSettings::default(),
        }
    }

    /// Follow another event set on manual refresh
    #[must_use]
    pub fn with_scope(mut self, scope: FeedScope) -> Self {
        self.scope = scope;
        self
    }

    /// Replace the settings
    #[must_use]
    pub const fn with_settings(mut self, settings: FeedSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Reducer driving the feed
#[derive(Clone, Debug, Default)]
pub struct FeedReducer;

impl FeedReducer {
    /// Creates a new `FeedReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Rebuild the visible list from the stored snapshots
    fn recalculate(state: &mut FeedState, env: &FeedEnvironment) {
        let inputs = FeedInputs {
            all_events: &state.all_events,
            active_events: &state.active_events,
            liked: &state.liked_event_ids,
            mode: state.mode,
            filters: &state.filters,
            search_query: &state.search_query,
            now: env.clock.now_epoch_seconds(),
            max_results: env.settings.max_results,
        };
        state.events = ranking::recalculate(&inputs);
    }

    /// Store a raw snapshot, refresh the active subset and recompute
    fn apply_snapshot(state: &mut FeedState, events: Vec<Event>, env: &FeedEnvironment) {
        state.active_events = ranking::active_events(&events, env.clock.now_epoch_seconds());
        state.all_events = events;
        state.is_loading = false;
        Self::recalculate(state, env);
    }

    /// Fetch once, never faster than the floor, never slower than the deadline
    fn refresh_effect(env: &FeedEnvironment) -> Effect<FeedAction> {
        let source = Arc::clone(&env.events);
        let scope = env.scope.clone();
        let floor = env.settings.refresh_min_duration;
        let deadline = env.settings.refresh_timeout;

        Effect::Future(Box::pin(async move {
            let started = tokio::time::Instant::now();
            let fetch = match &scope {
                FeedScope::Published => source.fetch_events(EventStatus::Published),
                FeedScope::Organization(id) => source.fetch_events_by_organization(id),
            };
            let attempt = async {
                let (fetched, ()) = tokio::join!(fetch, tokio::time::sleep(floor));
                fetched
            };

            let outcome = tokio::time::timeout(deadline, attempt).await;
            metrics::histogram!("onepass_feed_refresh_duration_seconds")
                .record(started.elapsed().as_secs_f64());

            Some(match outcome {
                Ok(Ok(events)) => FeedAction::RefreshCompleted { events },
                Ok(Err(error)) => FeedAction::RefreshFailed {
                    error: FeedError::Source(error),
                },
                Err(_) => FeedAction::RefreshFailed {
                    error: FeedError::RefreshTimeout(deadline),
                },
            })
        }))
        .cancellable(REFRESH)
    }
}

impl Reducer for FeedReducer {
    type State = FeedState;
    type Action = FeedAction;
    type Environment = FeedEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Upstream snapshots ==========
            FeedAction::EventsSnapshot { events } => {
                tracing::debug!(events = events.len(), "Received event snapshot");
                // A live snapshot means the source recovered.
                if matches!(state.error, Some(FeedError::Source(_))) {
                    state.error = None;
                }
                Self::apply_snapshot(state, events, env);
                SmallVec::new()
            },

            FeedAction::EventsLoadFailed { error } => {
                tracing::warn!(%error, "Event subscription failed");
                state.is_loading = false;
                state.error = Some(FeedError::Source(error));
                SmallVec::new()
            },

            FeedAction::LikesSnapshot { liked } => {
                tracing::debug!(liked = liked.len(), "Received likes snapshot");
                state.liked_event_ids = liked;
                if state.mode == FeedMode::Favorites {
                    Self::recalculate(state, env);
                }
                SmallVec::new()
            },

            // ========== User intents ==========
            FeedAction::SetMode { mode } => {
                state.mode = mode;
                Self::recalculate(state, env);
                SmallVec::new()
            },

            FeedAction::ApplyFilters { filters } => {
                state.filters = filters;
                Self::recalculate(state, env);
                SmallVec::new()
            },

            FeedAction::ClearFilters => {
                state.filters = EventFilters::default();
                Self::recalculate(state, env);
                SmallVec::new()
            },

            FeedAction::SearchChanged { query } => {
                state.search_input.clone_from(&query);

                if query.trim().is_empty() {
                    // Clearing the box applies at once and drops any pending timer.
                    state.search_query.clear();
                    Self::recalculate(state, env);
                    return smallvec![Effect::Cancel(SEARCH_DEBOUNCE)];
                }

                smallvec![Effect::Delay {
                    duration: env.settings.search_debounce,
                    action: Box::new(FeedAction::SearchSettled { query }),
                }
                .cancellable(SEARCH_DEBOUNCE)]
            },

            FeedAction::Refresh => {
                if state.is_refreshing {
                    tracing::debug!("Refresh already running");
                    return SmallVec::new();
                }
                state.is_refreshing = true;
                smallvec![Self::refresh_effect(env)]
            },

            FeedAction::DismissError => {
                state.error = None;
                SmallVec::new()
            },

            // ========== Effect results ==========
            FeedAction::SearchSettled { query } => {
                if query != state.search_input {
                    tracing::trace!("Ignoring stale search text");
                    return SmallVec::new();
                }
                state.search_query = query;
                Self::recalculate(state, env);
                SmallVec::new()
            },

            FeedAction::RefreshCompleted { events } => {
                metrics::counter!("onepass_feed_refresh_total", "outcome" => "ok").increment(1);
                state.is_refreshing = false;
                state.error = None;
                state.last_refreshed_at = Some(env.clock.now_epoch_seconds());
                Self::apply_snapshot(state, events, env);
                SmallVec::new()
            },

            FeedAction::RefreshFailed { error } => {
                metrics::counter!("onepass_feed_refresh_total", "outcome" => error.outcome())
                    .increment(1);
                match &error {
                    FeedError::RefreshTimeout(after) => {
                        tracing::warn!(?after, "Refresh timed out");
                    },
                    FeedError::Source(source) => {
                        tracing::warn!(error = %source, "Refresh failed");
                    },
                }
                state.is_refreshing = false;
                state.error = Some(error);
                SmallVec::new()
            },
        }
    }
}
