//! Integration tests for the QR token codec
//!
//! Exercises the public `pass` API the way a scanner and an issuer use it.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use onepass::pass::{self, issue, parse_from_qr, payload_segment, Pass, PassError, QR_PREFIX};
use proptest::prelude::*;

fn valid_pass(signature: &str) -> Pass {
    Pass::new("holder-7", "kid-2025", 1_735_689_600, 3, signature).unwrap()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn issue_then_parse_recovers_every_identity_field(
        uid in "\\PC{1,24}",
        kid in "[a-zA-Z0-9:_-]{1,24}",
        issued_at in 1_i64..=4_102_444_800,
        version in 1_i64..=1_000,
        signature in "[A-Za-z0-9_-]{4,86}",
    ) {
        let original = Pass::new(uid, kid, issued_at, version, signature).unwrap();
        let parsed = parse_from_qr(&issue(&original).unwrap()).unwrap();

        prop_assert_eq!(&parsed.uid, &original.uid);
        prop_assert_eq!(&parsed.kid, &original.kid);
        prop_assert_eq!(parsed.issued_at, original.issued_at);
        prop_assert_eq!(parsed.version, original.version);
        prop_assert_eq!(&parsed.signature, &original.signature);
        prop_assert!(!parsed.is_incomplete());
    }

    #[test]
    fn payload_ignores_signature(
        first in "[A-Za-z0-9_-]{4,40}",
        second in "[A-Za-z0-9_-]{4,40}",
    ) {
        let a = issue(&valid_pass(&first)).unwrap();
        let b = issue(&valid_pass(&second)).unwrap();
        prop_assert_eq!(payload_segment(&a), payload_segment(&b));
    }

    #[test]
    fn signatures_outside_the_grammar_are_incomplete(
        head in "[A-Za-z0-9_-]{0,8}",
        bad in "[+/= \t]",
        tail in "[A-Za-z0-9_-]{0,8}",
    ) {
        let token = format!(
            "{QR_PREFIX}{}.{head}{bad}{tail}",
            pass::encode_payload("u", "k", 1, 1).unwrap()
        );
        let parsed = parse_from_qr(&token).unwrap();
        prop_assert!(parsed.is_incomplete());
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[test]
fn payload_is_canonical_json() {
    let token = issue(&valid_pass("A_-0")).unwrap();
    let payload = payload_segment(&token).unwrap();
    let json = URL_SAFE_NO_PAD.decode(payload).unwrap();

    assert_eq!(
        String::from_utf8(json).unwrap(),
        r#"{"uid":"holder-7","kid":"kid-2025","iat":1735689600,"ver":3}"#
    );
    assert_eq!(token, format!("{QR_PREFIX}{payload}.A_-0"));
}

#[test]
fn signature_grammar_examples() {
    assert!(parse_from_qr(&issue(&valid_pass("A_-0")).unwrap()).unwrap().is_complete());

    let mut tampered = valid_pass("A_-0");
    tampered.signature = "abc+def/ghi==".to_string();
    assert!(parse_from_qr(&issue(&tampered).unwrap()).unwrap().is_incomplete());

    tampered.signature = "abc".to_string();
    assert!(parse_from_qr(&issue(&tampered).unwrap()).unwrap().is_incomplete());
}

// ============================================================================
// Rejection boundaries
// ============================================================================

#[test]
fn prefix_and_format_boundaries() {
    let token = issue(&valid_pass("A_-0")).unwrap();

    let error = parse_from_qr(&token.replace(QR_PREFIX, "badprefix:")).unwrap_err();
    assert!(matches!(error, PassError::BadPrefix));
    assert!(error.to_string().contains("BadPrefix"));

    let payload = payload_segment(&token).unwrap();
    let error = parse_from_qr(&format!("{QR_PREFIX}{payload}")).unwrap_err();
    assert!(matches!(error, PassError::BadTokenFormat));
    assert!(error.to_string().contains("BadTokenFormat"));

    let error = parse_from_qr(&format!("{QR_PREFIX}{payload}.")).unwrap_err();
    assert!(matches!(error, PassError::EmptySignature));
}

#[test]
fn unreadable_tokens_are_flagged_for_the_scanner() {
    let unreadable = [
        "".to_string(),
        "https://example.com/ticket".to_string(),
        format!("{QR_PREFIX}%%%.abcd"),
        format!("{QR_PREFIX}{}.abcd", URL_SAFE_NO_PAD.encode("[1,2,3]")),
        format!("{QR_PREFIX}{}.abcd", URL_SAFE_NO_PAD.encode("null")),
    ];

    for token in unreadable {
        let error = parse_from_qr(&token).unwrap_err();
        assert!(error.is_unreadable(), "{token:?} gave {error}");
    }
}

#[test]
fn domain_values_are_deferred_to_completeness() {
    for json in [
        r#"{"uid":"u","kid":"k","iat":1700000000,"ver":0}"#,
        r#"{"uid":"u","kid":"k","iat":0,"ver":1}"#,
        r#"{"uid":"","kid":"k","iat":1700000000,"ver":1}"#,
    ] {
        let token = format!("{QR_PREFIX}{}.abcd", URL_SAFE_NO_PAD.encode(json));
        let pass = parse_from_qr(&token).expect("readable token");
        assert!(pass.is_incomplete(), "{json} should be incomplete");
    }
}

#[test]
fn lifecycle_never_changes_the_token() {
    let mut ticket = valid_pass("c2lnbmF0dXJl");
    let before = ticket.to_qr_string().unwrap();

    ticket.record_scan(1_735_700_000);
    ticket.revoke(1_735_800_000);

    assert_eq!(ticket.to_qr_string().unwrap(), before);
    assert_eq!(ticket.status().to_string(), "Revoked");
    assert_eq!(ticket.last_scanned_display(), "2025-01-01 02:53 UTC");
}
