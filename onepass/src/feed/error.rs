//! Errors surfaced by the feed to its UI.

use super::sources::SourceError;
use std::time::Duration;
use thiserror::Error;

/// A user-visible feed failure
///
/// Never clears the displayed feed; the last successful result stays in place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// A manual refresh did not finish before its deadline
    #[error("Refresh timed out after {0:?}, showing previous results")]
    RefreshTimeout(Duration),

    /// The event source failed while loading or refreshing
    #[error("Failed to load events: {0}")]
    Source(#[from] SourceError),
}

impl FeedError {
    /// Metric label for this failure
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::RefreshTimeout(_) => "timeout",
            Self::Source(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_distinct() {
        let timeout = FeedError::RefreshTimeout(Duration::from_secs(10));
        let source = FeedError::from(SourceError::Unavailable("offline".to_string()));

        assert_eq!(
            timeout.to_string(),
            "Refresh timed out after 10s, showing previous results"
        );
        assert_eq!(
            source.to_string(),
            "Failed to load events: Source unavailable: offline"
        );
        assert_eq!(timeout.outcome(), "timeout");
        assert_eq!(source.outcome(), "error");
    }
}
