//! Configuration management for OnePass.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::feed::FeedSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Feed tunables
    pub feed: FeedConfig,
    /// Logging
    pub log: LogConfig,
}

/// Feed configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Main feed size limit (default: 20)
    pub max_results: usize,
    /// Shortest manual refresh in milliseconds (default: 1000)
    pub refresh_min_ms: u64,
    /// Manual refresh deadline in milliseconds (default: 10000)
    pub refresh_timeout_ms: u64,
    /// Search debounce in milliseconds (default: 300)
    pub search_debounce_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives
    pub filter: String,
}

/// Invalid configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The main feed would always be empty
    #[error("ONEPASS_FEED_MAX_RESULTS must be at least 1")]
    ZeroMaxResults,

    /// Every refresh would time out before its floor elapsed
    #[error("ONEPASS_REFRESH_MIN_MS ({min_ms}) must be below ONEPASS_REFRESH_TIMEOUT_MS ({timeout_ms})")]
    RefreshFloorNotBelowTimeout {
        /// Configured floor
        min_ms: u64,
        /// Configured deadline
        timeout_ms: u64,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to their defaults. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            feed: FeedConfig {
                max_results: lookup("ONEPASS_FEED_MAX_RESULTS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
                refresh_min_ms: lookup("ONEPASS_REFRESH_MIN_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
                refresh_timeout_ms: lookup("ONEPASS_REFRESH_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
                search_debounce_ms: lookup("ONEPASS_SEARCH_DEBOUNCE_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            },
            log: LogConfig {
                filter: lookup("RUST_LOG").unwrap_or_else(|| "onepass=info".to_string()),
            },
        }
    }

    /// Check values that would make the feed unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero result limit or a refresh floor at
    /// or above the refresh deadline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.max_results == 0 {
            return Err(ConfigError::ZeroMaxResults);
        }
        if self.feed.refresh_min_ms >= self.feed.refresh_timeout_ms {
            return Err(ConfigError::RefreshFloorNotBelowTimeout {
                min_ms: self.feed.refresh_min_ms,
                timeout_ms: self.feed.refresh_timeout_ms,
            });
        }
        Ok(())
    }
}

impl FeedConfig {
    /// Reducer settings for these values
    #[must_use]
    pub const fn settings(&self) -> FeedSettings {
        FeedSettings {
            max_results: self.max_results,
            refresh_min_duration: Duration::from_millis(self.refresh_min_ms),
            refresh_timeout: Duration::from_millis(self.refresh_timeout_ms),
            search_debounce: Duration::from_millis(self.search_debounce_ms),
        }
    }
}
