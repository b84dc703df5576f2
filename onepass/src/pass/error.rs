//! Errors raised while reading or building a pass.

use thiserror::Error;

/// Why a QR token could not be read, or a pass could not be built
///
/// Decode variants describe an unreadable token. Domain problems in a
/// readable token (`ver` or `iat` not positive, a malformed signature) are
/// not errors here; they surface through [`super::Pass::is_incomplete`].
#[derive(Error, Debug)]
pub enum PassError {
    /// The token does not start with the OnePass prefix
    #[error("BadPrefix: token must start with `onepass:user:v1.`")]
    BadPrefix,

    /// The token is not `<payload>.<signature>` after the prefix
    #[error("BadTokenFormat: expected `<payload>.<signature>` after the prefix")]
    BadTokenFormat,

    /// The token has a payload but nothing after the separating dot
    #[error("EmptySignature: token carries no signature")]
    EmptySignature,

    /// The payload segment is not base64url without padding
    #[error("invalid payload encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// The decoded payload is not a UTF-8 JSON object
    #[error("invalid payload json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The identity fields could not be written as payload JSON
    #[error("could not encode payload: {0}")]
    PayloadEncoding(#[source] serde_json::Error),

    /// A required payload key is absent
    #[error("{0} missing")]
    MissingField(&'static str),

    /// A payload key is present with the wrong JSON type
    #[error("{0} has the wrong type")]
    InvalidField(&'static str),

    /// A required identity field is empty
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A numeric identity field is zero or negative
    #[error("{0} must be positive")]
    NonPositive(&'static str),

    /// The signature is not base64url without padding, or shorter than 4 characters
    #[error("signature is not base64url without padding")]
    MalformedSignature,
}

impl PassError {
    /// Whether this error means the scanned text is not a readable OnePass token
    #[must_use]
    pub const fn is_unreadable(&self) -> bool {
        !matches!(
            self,
            Self::EmptyField(_)
                | Self::NonPositive(_)
                | Self::MalformedSignature
                | Self::PayloadEncoding(_)
        )
    }
}
