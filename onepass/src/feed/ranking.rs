//! Content-based ranking of events.
//!
//! ```text
//! score(e) = tagScore(e) + recencyScore(e) + urgencyScore(e) - expirationPenalty(e)
//! ```
//!
//! - `tagScore`: Σ over the event's normalised tags of `profile[tag] * TAG_MATCH_WEIGHT`
//! - `recencyScore`: `RECENCY_BOOST` if created within the last 7 days
//! - `urgencyScore`: `URGENCY_BOOST` if starting within the next 24 hours
//! - `expirationPenalty`: `EXPIRATION_PENALTY` if ending within the next 2 hours
//!
//! Every function here is pure: identical inputs give identical output.

use super::types::{Event, EventFilters, FeedMode};
use std::collections::{HashMap, HashSet};

/// Weight of one like on a matching tag
pub const TAG_MATCH_WEIGHT: f64 = 2.0;
/// Boost for recently created events
pub const RECENCY_BOOST: f64 = 5.0;
/// Boost for events starting soon
pub const URGENCY_BOOST: f64 = 8.0;
/// Penalty for events about to close
pub const EXPIRATION_PENALTY: f64 = 50.0;
/// Default size limit of the main feed
pub const MAX_FEED_RESULTS: usize = 20;

const HOUR: i64 = 60 * 60;
/// How far back `created_at` earns the recency boost
pub const RECENCY_WINDOW_SECS: i64 = 7 * 24 * HOUR;
/// How far ahead `start_time` earns the urgency boost
pub const URGENCY_WINDOW_SECS: i64 = 24 * HOUR;
/// How far ahead `end_time` triggers the expiration penalty
pub const EXPIRATION_WINDOW_SECS: i64 = 2 * HOUR;

/// Lowercase and trim a tag
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// An event is active if it has not ended and is not sold out
#[must_use]
pub fn is_active(event: &Event, now: i64) -> bool {
    event.end_time.is_none_or(|end| end > now) && !event.is_sold_out
}

/// Active subset of a raw event snapshot, order preserved
#[must_use]
pub fn active_events(events: &[Event], now: i64) -> Vec<Event> {
    events
        .iter()
        .filter(|event| is_active(event, now))
        .cloned()
        .collect()
}

/// Tag frequencies across the events a user liked
///
/// Rebuilt from scratch for every ranking pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterestProfile {
    counts: HashMap<String, u32>,
}

impl InterestProfile {
    /// Count normalised tags of every liked event present in `all_events`
    ///
    /// Ended and sold-out events still count; a past like is still a signal.
    #[must_use]
    pub fn from_liked(all_events: &[Event], liked: &HashSet<String>) -> Self {
        let mut counts = HashMap::new();
        for event in all_events.iter().filter(|e| liked.contains(&e.event_id)) {
            for tag in &event.tags {
                *counts.entry(normalize_tag(tag)).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    /// How often a (normalised) tag appears among liked events
    #[must_use]
    pub fn weight(&self, normalized_tag: &str) -> u32 {
        self.counts.get(normalized_tag).copied().unwrap_or(0)
    }

    /// Number of distinct tags
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the user has no liked tags at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// The parts of a score, kept apart for debugging and tests
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Tag affinity
    pub tag: f64,
    /// Created recently
    pub recency: f64,
    /// Starting soon
    pub urgency: f64,
    /// Closing soon (subtracted)
    pub expiration_penalty: f64,
}

impl ScoreBreakdown {
    /// Final score
    #[must_use]
    pub fn total(&self) -> f64 {
        self.tag + self.recency + self.urgency - self.expiration_penalty
    }
}

/// Score one candidate event; missing timestamps simply earn nothing
#[must_use]
pub fn score_event(event: &Event, profile: &InterestProfile, now: i64) -> ScoreBreakdown {
    let tag = event
        .tags
        .iter()
        .map(|tag| f64::from(profile.weight(&normalize_tag(tag))) * TAG_MATCH_WEIGHT)
        .sum();

    let recency = match event.created_at {
        Some(created) if created > now - RECENCY_WINDOW_SECS => RECENCY_BOOST,
        _ => 0.0,
    };

    let urgency = match event.start_time {
        Some(start) if start > now && start < now + URGENCY_WINDOW_SECS => URGENCY_BOOST,
        _ => 0.0,
    };

    let expiration_penalty = match event.end_time {
        Some(end) if end > now && end < now + EXPIRATION_WINDOW_SECS => EXPIRATION_PENALTY,
        _ => 0.0,
    };

    ScoreBreakdown {
        tag,
        recency,
        urgency,
        expiration_penalty,
    }
}

/// Whether an event passes the user's filters
#[must_use]
pub fn matches_filters(event: &Event, filters: &EventFilters) -> bool {
    if filters.hide_sold_out && event.is_sold_out {
        return false;
    }

    let region = filters.region.as_deref().map(str::trim).unwrap_or_default();
    if !region.is_empty() && !event.location.to_lowercase().contains(&region.to_lowercase()) {
        return false;
    }

    match filters.date_range {
        Some(range) => event.start_time.is_some_and(|start| range.contains(start)),
        None => true,
    }
}

/// Whether an event matches a free-text query (title, description or tag)
#[must_use]
pub fn matches_search(event: &Event, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    event.title.to_lowercase().contains(&query)
        || event.description.to_lowercase().contains(&query)
        || event.tags.iter().any(|tag| normalize_tag(tag).contains(&query))
}

fn is_visible(event: &Event, filters: &EventFilters, search_query: &str) -> bool {
    matches_filters(event, filters) && matches_search(event, search_query)
}

/// Everything one ranking pass depends on
#[derive(Clone, Copy, Debug)]
pub struct FeedInputs<'a> {
    /// Latest raw snapshot, including ended and sold-out events
    pub all_events: &'a [Event],
    /// Active subset of `all_events`
    pub active_events: &'a [Event],
    /// Liked event ids
    pub liked: &'a HashSet<String>,
    /// Which feed to build
    pub mode: FeedMode,
    /// Filters applied after ranking
    pub filters: &'a EventFilters,
    /// Settled search text
    pub search_query: &'a str,
    /// Current time, epoch seconds
    pub now: i64,
    /// Main feed size limit
    pub max_results: usize,
}

/// Ranked discovery feed: unliked active events, best score first, filtered, truncated
#[must_use]
pub fn rank_main_feed(inputs: &FeedInputs<'_>) -> Vec<Event> {
    let profile = InterestProfile::from_liked(inputs.all_events, inputs.liked);

    let mut scored: Vec<(f64, &Event)> = inputs
        .active_events
        .iter()
        .filter(|event| !inputs.liked.contains(&event.event_id))
        .map(|event| (score_event(event, &profile, inputs.now).total(), event))
        .collect();

    // Stable: equal scores keep snapshot order.
    scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));

    tracing::trace!(
        candidates = scored.len(),
        profile_tags = profile.len(),
        "Scored main feed candidates"
    );

    scored
        .into_iter()
        .map(|(_, event)| event)
        .filter(|event| is_visible(event, inputs.filters, inputs.search_query))
        .take(inputs.max_results)
        .cloned()
        .collect()
}

/// Favorites feed: liked active events, filtered, earliest start first
///
/// Events without a start time go last.
#[must_use]
pub fn favorites_feed(inputs: &FeedInputs<'_>) -> Vec<Event> {
    let mut favorites: Vec<Event> = inputs
        .active_events
        .iter()
        .filter(|event| inputs.liked.contains(&event.event_id))
        .filter(|event| is_visible(event, inputs.filters, inputs.search_query))
        .cloned()
        .collect();

    favorites.sort_by_key(|event| event.start_time.unwrap_or(i64::MAX));
    favorites
}

/// Build the feed for the current mode
#[must_use]
pub fn recalculate(inputs: &FeedInputs<'_>) -> Vec<Event> {
    let events = match inputs.mode {
        FeedMode::MainFeed => rank_main_feed(inputs),
        FeedMode::Favorites => favorites_feed(inputs),
    };

    metrics::counter!("onepass_feed_recalculations_total", "mode" => inputs.mode.as_str())
        .increment(1);
    #[allow(clippy::cast_precision_loss)] // feed sizes are tiny
    let shown = events.len() as f64;
    metrics::gauge!("onepass_feed_results").set(shown);
    tracing::debug!(
        mode = inputs.mode.as_str(),
        active = inputs.active_events.len(),
        liked = inputs.liked.len(),
        shown = events.len(),
        "Recalculated feed"
    );

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::DateRange;

    const NOW: i64 = 1_735_689_600;

    fn liked(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    fn inputs<'a>(
        all: &'a [Event],
        active: &'a [Event],
        liked: &'a HashSet<String>,
        filters: &'a EventFilters,
        mode: FeedMode,
    ) -> FeedInputs<'a> {
        FeedInputs {
            all_events: all,
            active_events: active,
            liked,
            mode,
            filters,
            search_query: "",
            now: NOW,
            max_results: MAX_FEED_RESULTS,
        }
    }

    #[test]
    fn active_requires_future_end_and_availability() {
        let open = Event::new("a", "Open");
        let ended = Event::new("b", "Ended").with_schedule(None, Some(NOW));
        let later = Event::new("c", "Later").with_schedule(None, Some(NOW + 1));
        let gone = Event::new("d", "Gone").sold_out();

        assert!(is_active(&open, NOW));
        assert!(!is_active(&ended, NOW));
        assert!(is_active(&later, NOW));
        assert!(!is_active(&gone, NOW));
    }

    #[test]
    fn profile_normalises_and_counts_historical_likes() {
        let events = vec![
            Event::new("1", "One").with_tags([" Jazz", "Live"]),
            Event::new("2", "Two")
                .with_tags(["jazz "])
                .with_schedule(None, Some(NOW - 10)),
            Event::new("3", "Three").with_tags(["jazz"]),
        ];
        let profile = InterestProfile::from_liked(&events, &liked(&["1", "2", "missing"]));

        assert_eq!(profile.weight("jazz"), 2);
        assert_eq!(profile.weight("live"), 1);
        assert_eq!(profile.weight("rock"), 0);
        assert_eq!(profile.len(), 2);
    }

    #[test]
    fn urgency_alone_scores_eight() {
        let event = Event::new("e", "Soon").with_schedule(Some(NOW + 12 * HOUR), None);
        let score = score_event(&event, &InterestProfile::default(), NOW);
        assert!((score.total() - URGENCY_BOOST).abs() < f64::EPSILON);
    }

    #[test]
    fn two_tags_liked_three_times_score_twelve() {
        let liked_events: Vec<Event> = (0..3)
            .map(|i| Event::new(format!("l{i}"), "Liked").with_tags(["music", "outdoor"]))
            .collect();
        let profile = InterestProfile::from_liked(&liked_events, &liked(&["l0", "l1", "l2"]));
        let candidate = Event::new("c", "Candidate").with_tags(["Music", "outdoor", "food"]);

        let score = score_event(&candidate, &profile, NOW);
        assert!((score.tag - 12.0).abs() < f64::EPSILON);
        assert!((score.total() - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn window_boundaries_are_strict() {
        let profile = InterestProfile::default();

        let starts_now = Event::new("a", "a").with_schedule(Some(NOW), None);
        let starts_at_day = Event::new("b", "b").with_schedule(Some(NOW + URGENCY_WINDOW_SECS), None);
        assert!(score_event(&starts_now, &profile, NOW).urgency.abs() < f64::EPSILON);
        assert!(score_event(&starts_at_day, &profile, NOW).urgency.abs() < f64::EPSILON);

        let closing = Event::new("c", "c").with_schedule(None, Some(NOW + HOUR));
        let closing_edge = Event::new("d", "d").with_schedule(None, Some(NOW + EXPIRATION_WINDOW_SECS));
        assert!(
            (score_event(&closing, &profile, NOW).total() + EXPIRATION_PENALTY).abs() < f64::EPSILON
        );
        assert!(score_event(&closing_edge, &profile, NOW).total().abs() < f64::EPSILON);

        let fresh = Event::new("e", "e").created_at(NOW - RECENCY_WINDOW_SECS + 1);
        let stale = Event::new("f", "f").created_at(NOW - RECENCY_WINDOW_SECS);
        assert!((score_event(&fresh, &profile, NOW).recency - RECENCY_BOOST).abs() < f64::EPSILON);
        assert!(score_event(&stale, &profile, NOW).recency.abs() < f64::EPSILON);
    }

    #[test]
    fn main_feed_excludes_liked_and_orders_by_score() {
        let all = vec![
            Event::new("plain", "Plain"),
            Event::new("soon", "Soon").with_schedule(Some(NOW + HOUR), None),
            Event::new("liked", "Liked").with_tags(["art"]),
            Event::new("art", "Art").with_tags(["art"]),
        ];
        let active = active_events(&all, NOW);
        let likes = liked(&["liked"]);
        let filters = EventFilters::default();

        let feed = rank_main_feed(&inputs(&all, &active, &likes, &filters, FeedMode::MainFeed));
        let ids: Vec<&str> = feed.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["soon", "art", "plain"]);
    }

    #[test]
    fn main_feed_is_truncated_after_filtering() {
        let all: Vec<Event> = (0..30)
            .map(|i| {
                let event = Event::new(format!("e{i}"), "Event");
                if i % 2 == 0 { event.at("Oslo") } else { event.at("Bergen") }
            })
            .collect();
        let active = active_events(&all, NOW);
        let likes = HashSet::new();
        let filters = EventFilters {
            region: Some("oslo".to_string()),
            ..EventFilters::default()
        };

        let feed = rank_main_feed(&inputs(&all, &active, &likes, &filters, FeedMode::MainFeed));
        assert_eq!(feed.len(), 15);
        assert!(feed.iter().all(|e| e.location == "Oslo"));

        let unfiltered = EventFilters::default();
        let feed = rank_main_feed(&inputs(&all, &active, &likes, &unfiltered, FeedMode::MainFeed));
        assert_eq!(feed.len(), MAX_FEED_RESULTS);
    }

    #[test]
    fn favorites_sorted_by_start_with_unscheduled_last() {
        let all = vec![
            Event::new("tbd", "TBD"),
            Event::new("late", "Late").with_schedule(Some(NOW + 5 * HOUR), None),
            Event::new("early", "Early").with_schedule(Some(NOW + HOUR), None),
            Event::new("other", "Other").with_schedule(Some(NOW + 2 * HOUR), None),
        ];
        let active = active_events(&all, NOW);
        let likes = liked(&["tbd", "late", "early"]);
        let filters = EventFilters::default();

        let feed = favorites_feed(&inputs(&all, &active, &likes, &filters, FeedMode::Favorites));
        let ids: Vec<&str> = feed.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late", "tbd"]);
    }

    #[test]
    fn date_range_drops_unscheduled_events() {
        let filters = EventFilters {
            date_range: Some(DateRange::new(NOW + 10 * HOUR, NOW)),
            ..EventFilters::default()
        };
        let inside = Event::new("in", "In").with_schedule(Some(NOW + 10 * HOUR), None);
        let outside = Event::new("out", "Out").with_schedule(Some(NOW + 11 * HOUR), None);
        let unscheduled = Event::new("none", "None");

        assert!(matches_filters(&inside, &filters));
        assert!(!matches_filters(&outside, &filters));
        assert!(!matches_filters(&unscheduled, &filters));
    }

    #[test]
    fn search_matches_title_description_and_tags() {
        let mut event = Event::new("e", "Harbour Jazz Night").with_tags(["Blues"]);
        event.description = "Open air stage".to_string();

        assert!(matches_search(&event, "  jazz "));
        assert!(matches_search(&event, "open AIR"));
        assert!(matches_search(&event, "blu"));
        assert!(matches_search(&event, ""));
        assert!(!matches_search(&event, "techno"));
    }

    #[test]
    fn recalculation_is_idempotent() {
        let all: Vec<Event> = (0..10)
            .map(|i| Event::new(format!("e{i}"), "Event").with_tags(["x"]))
            .collect();
        let active = active_events(&all, NOW);
        let likes = liked(&["e0"]);
        let filters = EventFilters::default();
        let inputs = inputs(&all, &active, &likes, &filters, FeedMode::MainFeed);

        assert_eq!(recalculate(&inputs), recalculate(&inputs));
    }
}
