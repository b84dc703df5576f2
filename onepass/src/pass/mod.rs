//! Signed digital passes and their QR token format.
//!
//! A [`Pass`] carries four identity fields that travel inside the QR payload
//! (`uid`, `kid`, `issued_at`, `version`), an externally computed signature,
//! and presentation-only fields that never leave the device (`active`,
//! `revoked_at`, `last_scanned_at`).
//!
//! Validation happens in two stages:
//! 1. [`parse_from_qr`] rejects unreadable tokens with a [`PassError`].
//! 2. [`Pass::is_incomplete`] flags readable tokens whose values make no
//!    sense (a zero version, a padded signature), which usually means tampering.

pub mod codec;
pub mod error;
pub mod signature;

pub use codec::{encode_payload, issue, parse_from_qr, payload_segment, QR_PREFIX};
pub use error::PassError;
pub use signature::is_valid_signature;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display format for pass timestamps
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// A ticket credential
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    /// Ticket holder identifier
    pub uid: String,
    /// Signing key identifier
    pub kid: String,
    /// Issue time, epoch seconds
    pub issued_at: i64,
    /// Payload protocol version
    pub version: i64,
    /// Base64url (no padding) signature over the payload
    pub signature: String,
    /// Whether the pass may currently be used
    #[serde(default = "default_active")]
    pub active: bool,
    /// Revocation time; any value, even zero, marks the pass revoked
    #[serde(default)]
    pub revoked_at: Option<i64>,
    /// Last successful scan, epoch seconds
    #[serde(default)]
    pub last_scanned_at: Option<i64>,
}

const fn default_active() -> bool {
    true
}

/// Lifecycle status shown next to a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassStatus {
    /// Usable
    Active,
    /// Switched off but not revoked
    Inactive,
    /// Permanently revoked
    Revoked,
}

impl PassStatus {
    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Revoked => "Revoked",
        }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Pass {
    /// Build a freshly issued pass, rejecting anything incomplete
    ///
    /// # Errors
    ///
    /// - [`PassError::EmptyField`] if `uid` or `kid` is empty
    /// - [`PassError::NonPositive`] if `issued_at` or `version` is not positive
    /// - [`PassError::MalformedSignature`] if the signature fails [`is_valid_signature`]
    pub fn new(
        uid: impl Into<String>,
        kid: impl Into<String>,
        issued_at: i64,
        version: i64,
        signature: impl Into<String>,
    ) -> Result<Self, PassError> {
        let pass = Self::from_wire(uid.into(), kid.into(), issued_at, version, signature.into());

        if pass.uid.is_empty() {
            return Err(PassError::EmptyField("uid"));
        }
        if pass.kid.is_empty() {
            return Err(PassError::EmptyField("kid"));
        }
        if pass.issued_at <= 0 {
            return Err(PassError::NonPositive("issuedAt"));
        }
        if pass.version <= 0 {
            return Err(PassError::NonPositive("version"));
        }
        if !is_valid_signature(&pass.signature) {
            return Err(PassError::MalformedSignature);
        }

        Ok(pass)
    }

    /// Build a pass from decoded wire fields without domain checks
    pub(crate) const fn from_wire(
        uid: String,
        kid: String,
        issued_at: i64,
        version: i64,
        signature: String,
    ) -> Self {
        Self {
            uid,
            kid,
            issued_at,
            version,
            signature,
            active: true,
            revoked_at: None,
            last_scanned_at: None,
        }
    }

    /// Whether any identity field or the signature shape is invalid
    ///
    /// Recomputed on every call; nothing is cached.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.uid.is_empty()
            || self.kid.is_empty()
            || self.issued_at <= 0
            || self.version <= 0
            || !is_valid_signature(&self.signature)
    }

    /// Inverse of [`Pass::is_incomplete`]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.is_incomplete()
    }

    /// Whether the pass carries a revocation time
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Current lifecycle status; revocation wins over the active flag
    #[must_use]
    pub const fn status(&self) -> PassStatus {
        if self.is_revoked() {
            PassStatus::Revoked
        } else if self.active {
            PassStatus::Active
        } else {
            PassStatus::Inactive
        }
    }

    /// Mark the pass revoked at `at` (epoch seconds)
    pub const fn revoke(&mut self, at: i64) {
        self.revoked_at = Some(at);
        self.active = false;
    }

    /// Switch the pass off without revoking it
    pub const fn deactivate(&mut self) {
        self.active = false;
    }

    /// Record a successful scan at `at` (epoch seconds)
    pub const fn record_scan(&mut self, at: i64) {
        self.last_scanned_at = Some(at);
    }

    /// QR token for this pass
    ///
    /// # Errors
    ///
    /// Returns [`PassError::PayloadEncoding`] if the payload JSON cannot be built.
    pub fn to_qr_string(&self) -> Result<String, PassError> {
        issue(self)
    }

    /// Issue time for display, or `"Not issued"`
    #[must_use]
    pub fn issued_at_display(&self) -> String {
        format_epoch_seconds(Some(self.issued_at)).unwrap_or_else(|| "Not issued".to_string())
    }

    /// Last scan time for display, or `"Never scanned"`
    #[must_use]
    pub fn last_scanned_display(&self) -> String {
        format_epoch_seconds(self.last_scanned_at).unwrap_or_else(|| "Never scanned".to_string())
    }
}

/// Format a positive epoch-second timestamp; `None` for absent, zero or out-of-range values
fn format_epoch_seconds(seconds: Option<i64>) -> Option<String> {
    seconds
        .filter(|s| *s > 0)
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|time| time.format(TIMESTAMP_FORMAT).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pass() -> Pass {
        Pass::new("uid-1", "kid-1", 1_735_689_600, 1, "A_-0").unwrap()
    }

    #[test]
    fn new_rejects_incomplete_values() {
        assert!(matches!(
            Pass::new("", "k", 1, 1, "abcd"),
            Err(PassError::EmptyField("uid"))
        ));
        assert!(matches!(
            Pass::new("u", "", 1, 1, "abcd"),
            Err(PassError::EmptyField("kid"))
        ));
        assert!(matches!(
            Pass::new("u", "k", 0, 1, "abcd"),
            Err(PassError::NonPositive("issuedAt"))
        ));
        assert!(matches!(
            Pass::new("u", "k", 1, -3, "abcd"),
            Err(PassError::NonPositive("version"))
        ));
        assert!(matches!(
            Pass::new("u", "k", 1, 1, "abc+def/ghi=="),
            Err(PassError::MalformedSignature)
        ));
    }

    #[test]
    fn completeness_follows_field_edits() {
        let mut pass = pass();
        assert!(pass.is_complete());

        pass.signature = "abc+def/ghi==".to_string();
        assert!(pass.is_incomplete());

        pass.signature = "A_-0".to_string();
        pass.version = 0;
        assert!(pass.is_incomplete());
    }

    #[test]
    fn status_labels() {
        let mut pass = pass();
        assert_eq!(pass.status().to_string(), "Active");

        pass.deactivate();
        assert_eq!(pass.status().to_string(), "Inactive");

        pass.active = true;
        pass.revoked_at = Some(0);
        assert_eq!(pass.status(), PassStatus::Revoked);
    }

    #[test]
    fn revoke_sets_time_and_clears_active() {
        let mut pass = pass();
        pass.revoke(1_735_700_000);
        assert!(pass.is_revoked());
        assert!(!pass.active);
        assert_eq!(pass.status().label(), "Revoked");
    }

    #[test]
    fn display_sentinels() {
        let mut pass = pass();
        assert_eq!(pass.issued_at_display(), "2025-01-01 00:00 UTC");
        assert_eq!(pass.last_scanned_display(), "Never scanned");

        pass.record_scan(0);
        assert_eq!(pass.last_scanned_display(), "Never scanned");

        pass.record_scan(1_735_693_200);
        assert_eq!(pass.last_scanned_display(), "2025-01-01 01:00 UTC");

        pass.issued_at = 0;
        assert_eq!(pass.issued_at_display(), "Not issued");
    }

    #[test]
    fn serde_uses_camel_case_and_defaults() {
        let json = r#"{"uid":"u","kid":"k","issuedAt":5,"version":1,"signature":"abcd"}"#;
        let pass: Pass = serde_json::from_str(json).unwrap();
        assert!(pass.active);
        assert!(pass.revoked_at.is_none());

        let value = serde_json::to_value(&pass).unwrap();
        assert!(value.get("lastScannedAt").is_some());
        assert!(value.get("issuedAt").is_some());
    }
}
