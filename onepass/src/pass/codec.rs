//! QR token encoding and decoding.
//!
//! Wire format:
//!
//! ```text
//! onepass:user:v1.<payload-b64url-nopad>.<signature-b64url-nopad>
//! ```
//!
//! The payload decodes to exactly `{"uid":"…","kid":"…","iat":<int>,"ver":<int>}`,
//! keys in that order, no whitespace. The external signer signs those bytes,
//! so the encoding must be byte-for-byte reproducible.

use super::{Pass, PassError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

/// Literal prefix of every OnePass user token, including the version dot
pub const QR_PREFIX: &str = "onepass:user:v1.";

/// Canonical payload; field order here is the wire key order
#[derive(Serialize)]
struct WirePayload<'a> {
    uid: &'a str,
    kid: &'a str,
    iat: i64,
    ver: i64,
}

/// Canonical JSON bytes covered by the signature
///
/// # Errors
///
/// Returns [`PassError::PayloadEncoding`] if serialisation fails.
pub fn canonical_payload_json(
    uid: &str,
    kid: &str,
    issued_at: i64,
    version: i64,
) -> Result<String, PassError> {
    let payload = WirePayload {
        uid,
        kid,
        iat: issued_at,
        ver: version,
    };
    serde_json::to_string(&payload).map_err(PassError::PayloadEncoding)
}

/// Base64url (no padding) payload segment for the four identity fields
///
/// A pure function of its arguments: the signature never influences it.
///
/// # Errors
///
/// Returns [`PassError::PayloadEncoding`] if the payload JSON cannot be built.
pub fn encode_payload(
    uid: &str,
    kid: &str,
    issued_at: i64,
    version: i64,
) -> Result<String, PassError> {
    let json = canonical_payload_json(uid, kid, issued_at, version)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Render a pass as its QR token
///
/// # Errors
///
/// Returns [`PassError::PayloadEncoding`] if the payload JSON cannot be built.
pub fn issue(pass: &Pass) -> Result<String, PassError> {
    let payload = encode_payload(&pass.uid, &pass.kid, pass.issued_at, pass.version)?;
    Ok(format!("{QR_PREFIX}{payload}.{}", pass.signature))
}

/// The payload segment of a token, if it has the OnePass prefix and a separator
#[must_use]
pub fn payload_segment(token: &str) -> Option<&str> {
    token
        .strip_prefix(QR_PREFIX)
        .and_then(|rest| rest.split_once('.'))
        .map(|(payload, _)| payload)
}

/// Decode a scanned QR token into a pass
///
/// The resulting pass is active, unrevoked and never scanned. Values that
/// are readable but semantically wrong (`ver <= 0`, `iat <= 0`, a signature
/// outside the base64url grammar) decode successfully; check
/// [`Pass::is_incomplete`] to catch them.
///
/// # Errors
///
/// - [`PassError::BadPrefix`] if the token does not start with [`QR_PREFIX`]
/// - [`PassError::BadTokenFormat`] if there is no `.` after the payload, or the payload is empty
/// - [`PassError::EmptySignature`] if nothing follows the separating `.`
/// - [`PassError::InvalidEncoding`] if the payload is not base64url without padding
/// - [`PassError::InvalidJson`] if the decoded payload is not a JSON object
/// - [`PassError::MissingField`] / [`PassError::InvalidField`] for `uid`, `kid`, `iat`, `ver`
pub fn parse_from_qr(token: &str) -> Result<Pass, PassError> {
    match decode(token) {
        Ok(pass) => {
            metrics::counter!("onepass_pass_decode_total", "outcome" => "ok").increment(1);
            if pass.is_incomplete() {
                tracing::debug!(uid = %pass.uid, kid = %pass.kid, "Decoded pass is incomplete");
            }
            Ok(pass)
        },
        Err(error) => {
            metrics::counter!("onepass_pass_decode_total", "outcome" => "rejected").increment(1);
            tracing::debug!(%error, "Rejected QR token");
            Err(error)
        },
    }
}

fn decode(token: &str) -> Result<Pass, PassError> {
    let rest = token.strip_prefix(QR_PREFIX).ok_or(PassError::BadPrefix)?;
    let (payload, signature) = rest.split_once('.').ok_or(PassError::BadTokenFormat)?;
    if payload.is_empty() {
        return Err(PassError::BadTokenFormat);
    }
    if signature.is_empty() {
        return Err(PassError::EmptySignature);
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    let json: Map<String, Value> = serde_json::from_slice(&bytes)?;

    let uid = string_field(&json, "uid")?;
    let kid = string_field(&json, "kid")?;
    let issued_at = integer_field(&json, "iat")?;
    let version = integer_field(&json, "ver")?;

    Ok(Pass::from_wire(uid, kid, issued_at, version, signature.to_owned()))
}

fn string_field(json: &Map<String, Value>, field: &'static str) -> Result<String, PassError> {
    match json.get(field) {
        None => Err(PassError::MissingField(field)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(PassError::InvalidField(field)),
    }
}

fn integer_field(json: &Map<String, Value>, field: &'static str) -> Result<i64, PassError> {
    let value = json.get(field).ok_or(PassError::MissingField(field))?;
    value.as_i64().ok_or(PassError::InvalidField(field))
}
