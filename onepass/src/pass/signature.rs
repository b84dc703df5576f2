//! Shape check for pass signatures.
//!
//! Signatures are produced and verified by an external key service. This
//! module only decides whether a string *looks like* a base64url-no-padding
//! signature.

/// Shortest accepted signature, in characters
pub const MIN_SIGNATURE_LEN: usize = 4;

/// Whether `signature` is acceptable base64url without padding
///
/// Requires at least [`MIN_SIGNATURE_LEN`] characters drawn from
/// `[A-Za-z0-9_-]`. The standard alphabet (`+`, `/`), `=` padding and
/// whitespace are all rejected.
#[must_use]
pub fn is_valid_signature(signature: &str) -> bool {
    signature.len() >= MIN_SIGNATURE_LEN
        && signature
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
