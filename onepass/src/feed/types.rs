//! Value types consumed and produced by the feed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Publication status of an event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Being edited by its organization
    #[default]
    Draft,
    /// Visible to users
    Published,
    /// Called off
    Cancelled,
}

/// An event as delivered by the event source
///
/// The ranking treats events as opaque scoring inputs; only the id, tags,
/// timestamps and sold-out flag influence scores.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier
    pub event_id: String,
    /// Display title
    pub title: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Publishing organization
    #[serde(default)]
    pub organization_id: String,
    /// Venue or city, matched by the region filter
    #[serde(default)]
    pub location: String,
    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Start time, epoch seconds
    pub start_time: Option<i64>,
    /// End time, epoch seconds
    pub end_time: Option<i64>,
    /// Creation time, epoch seconds
    pub created_at: Option<i64>,
    /// Whether every ticket is gone
    #[serde(default)]
    pub is_sold_out: bool,
    /// Publication status
    #[serde(default)]
    pub status: EventStatus,
}

impl Event {
    /// Create a published event with only an id and title set
    #[must_use]
    pub fn new(event_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            title: title.into(),
            status: EventStatus::Published,
            ..Self::default()
        }
    }

    /// Builder: add tags
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Builder: set start and end times
    #[must_use]
    pub const fn with_schedule(mut self, start_time: Option<i64>, end_time: Option<i64>) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    /// Builder: set the creation time
    #[must_use]
    pub const fn created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builder: set the location
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder: set the organization
    #[must_use]
    pub fn by(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = organization_id.into();
        self
    }

    /// Builder: mark sold out
    #[must_use]
    pub const fn sold_out(mut self) -> Self {
        self.is_sold_out = true;
        self
    }
}

/// Inclusive range of epoch seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First second included
    pub start: i64,
    /// Last second included
    pub end: i64,
}

impl DateRange {
    /// Create a range; bounds given in reverse order are swapped
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Whether `time` lies inside the range
    #[must_use]
    pub const fn contains(&self, time: i64) -> bool {
        self.start <= time && time <= self.end
    }
}

/// User-chosen narrowing of a feed; never affects scores
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilters {
    /// Case-insensitive substring of the event location
    pub region: Option<String>,
    /// Window the event start must fall in
    pub date_range: Option<DateRange>,
    /// Drop sold-out events
    pub hide_sold_out: bool,
}

impl EventFilters {
    /// Whether no filter is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.region.as_deref().is_none_or(|r| r.trim().is_empty())
            && self.date_range.is_none()
            && !self.hide_sold_out
    }
}

/// Which feed the user is looking at
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedMode {
    /// Ranked discovery feed without liked events
    #[default]
    MainFeed,
    /// Chronological list of liked events
    Favorites,
}

impl FeedMode {
    /// Metric/log label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MainFeed => "main",
            Self::Favorites => "favorites",
        }
    }
}

/// Which events a feed follows
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedScope {
    /// Every published event (user discovery feed)
    #[default]
    Published,
    /// Every event of one organization (organizer dashboard)
    Organization(String),
}
