//! Integration tests for the pure ranking functions
//!
//! Checks the properties that hold for any snapshot: the main and
//! favorites feeds partition active events by like status, and ranking is
//! a deterministic function of its inputs.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use onepass::feed::{
    active_events, favorites_feed, rank_main_feed, recalculate, score_event, Event,
    EventFilters, FeedInputs, FeedMode, InterestProfile, MAX_FEED_RESULTS,
};
use proptest::prelude::*;
use std::collections::HashSet;

const NOW: i64 = 1_735_689_600;
const HOUR: i64 = 3600;
const TAGS: [&str; 5] = ["music", "Jazz", " food ", "tech", "art"];

/// (tag mask, start offset, end offset, sold out, liked)
type EventSeed = (u8, Option<i64>, Option<i64>, bool, bool);

fn seed() -> impl Strategy<Value = EventSeed> {
    (
        0_u8..32,
        proptest::option::of(-48 * HOUR..96 * HOUR),
        proptest::option::of(-4 * HOUR..96 * HOUR),
        proptest::bool::weighted(0.1),
        proptest::bool::weighted(0.3),
    )
}

fn build(seeds: &[EventSeed]) -> (Vec<Event>, HashSet<String>) {
    let mut liked = HashSet::new();
    let events = seeds
        .iter()
        .enumerate()
        .map(|(i, (mask, start, end, sold_out, is_liked))| {
            let id = format!("e{i}");
            if *is_liked {
                liked.insert(id.clone());
            }
            let tags = TAGS
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1_u8 << bit) != 0)
                .map(|(_, tag)| *tag);
            let mut event = Event::new(id, format!("Event {i}"))
                .with_tags(tags)
                .with_schedule(start.map(|s| NOW + s), end.map(|e| NOW + e))
                .created_at(NOW - i64::try_from(i).unwrap() * 12 * HOUR);
            event.is_sold_out = *sold_out;
            event
        })
        .collect();
    (events, liked)
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

fn ids(events: &[Event]) -> HashSet<&str> {
    events.iter().map(|e| e.event_id.as_str()).collect()
}

proptest! {
    #[test]
    fn main_and_favorites_partition_by_likes(seeds in proptest::collection::vec(seed(), 0..40)) {
        let (all, liked) = build(&seeds);
        let active = active_events(&all, NOW);
        let filters = EventFilters::default();

        let main = rank_main_feed(&inputs(&all, &active, &liked, &filters, FeedMode::MainFeed));
        let favorites = favorites_feed(&inputs(&all, &active, &liked, &filters, FeedMode::Favorites));

        let main_ids = ids(&main);
        let favorite_ids = ids(&favorites);
        prop_assert!(main_ids.is_disjoint(&favorite_ids));
        prop_assert!(main_ids.iter().all(|id| !liked.contains(*id)));
        prop_assert!(favorite_ids.iter().all(|id| liked.contains(*id)));

        // Without filters every active liked event is a favorite.
        let active_liked = active.iter().filter(|e| liked.contains(&e.event_id)).count();
        prop_assert_eq!(favorites.len(), active_liked);
        prop_assert!(main.len() <= MAX_FEED_RESULTS);
    }

    #[test]
    fn main_feed_is_sorted_by_score(seeds in proptest::collection::vec(seed(), 0..40)) {
        let (all, liked) = build(&seeds);
        let active = active_events(&all, NOW);
        let filters = EventFilters::default();
        let profile = InterestProfile::from_liked(&all, &liked);

        let main = rank_main_feed(&inputs(&all, &active, &liked, &filters, FeedMode::MainFeed));
        let scores: Vec<f64> = main
            .iter()
            .map(|e| score_event(e, &profile, NOW).total())
            .collect();
        prop_assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn recalculation_is_idempotent(
        seeds in proptest::collection::vec(seed(), 0..40),
        favorites in any::<bool>(),
    ) {
        let (all, liked) = build(&seeds);
        let active = active_events(&all, NOW);
        let filters = EventFilters { hide_sold_out: true, ..EventFilters::default() };
        let mode = if favorites { FeedMode::Favorites } else { FeedMode::MainFeed };
        let inputs = inputs(&all, &active, &liked, &filters, mode);

        prop_assert_eq!(recalculate(&inputs), recalculate(&inputs));
    }

    #[test]
    fn active_events_never_ended_or_sold_out(seeds in proptest::collection::vec(seed(), 0..40)) {
        let (all, _) = build(&seeds);
        for event in active_events(&all, NOW) {
            prop_assert!(!event.is_sold_out);
            prop_assert!(event.end_time.is_none_or(|end| end > NOW));
        }
    }
}

#[test]
fn closing_soon_is_demoted_below_everything_else() {
    let all = vec![
        Event::new("closing", "Closing")
            .with_tags(["music"])
            .with_schedule(Some(NOW + HOUR), Some(NOW + HOUR + 30 * 60))
            .created_at(NOW - HOUR),
        Event::new("plain", "Plain"),
        Event::new("liked", "Liked").with_tags(["music"]),
    ];
    let liked: HashSet<String> = ["liked".to_string()].into();
    let active = active_events(&all, NOW);
    let filters = EventFilters::default();

    let main = rank_main_feed(&inputs(&all, &active, &liked, &filters, FeedMode::MainFeed));
    let order: Vec<&str> = main.iter().map(|e| e.event_id.as_str()).collect();

    // closing: 2 + 5 + 8 - 50 = -35
    assert_eq!(order, vec!["plain", "closing"]);
}

#[test]
fn filters_are_applied_after_ranking() {
    let all: Vec<Event> = (0..25)
        .map(|i| {
            let event = Event::new(format!("e{i}"), "Event");
            if i < 5 {
                event.at("Trondheim").sold_out()
            } else {
                event.at("Trondheim")
            }
        })
        .collect();
    let liked = HashSet::new();
    let active = active_events(&all, NOW);
    let filters = EventFilters {
        region: Some("TRONDHEIM".to_string()),
        hide_sold_out: true,
        ..EventFilters::default()
    };

    let main = rank_main_feed(&inputs(&all, &active, &liked, &filters, FeedMode::MainFeed));
    assert_eq!(main.len(), MAX_FEED_RESULTS);
    assert_eq!(main[0].event_id, "e5");
}
