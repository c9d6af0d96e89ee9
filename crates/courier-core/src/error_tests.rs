//! Tests for error classification and codes.

use super::*;

#[test]
fn test_auth_errors_share_a_single_code() {
    assert_eq!(AuthError::InvalidSignature.code(), AuthError::StaleTimestamp.code());
    assert_eq!(
        ReceiveError::from(AuthError::StaleTimestamp).code(),
        "invalid_request_signature"
    );
}

#[test]
fn test_receive_error_codes() {
    let cases: Vec<(ReceiveError, &str)> = vec![
        (
            ReceiveError::MalformedBody {
                message: "bad json".to_string(),
            },
            "unrecognized_payload",
        ),
        (
            NormalizationError::UnrecognizedPayloadShape.into(),
            "unrecognized_payload",
        ),
        (
            ContextError::UnknownTenant {
                tenant_id: "T1".to_string(),
            }
            .into(),
            "unknown_tenant",
        ),
        (
            DispatchError::MultipleResponders {
                first: "a".to_string(),
                second: "b".to_string(),
            }
            .into(),
            "multiple_responders",
        ),
        (
            DispatchError::NoHandlerResponded { handlers: 2 }.into(),
            "no_handler_responded",
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(error.code(), expected, "wrong code for {:?}", error);
    }
}

#[test]
fn test_only_store_outages_are_transient() {
    let outage = ReceiveError::from(ContextError::CredentialStore(
        CredentialError::Unavailable {
            message: "connection refused".to_string(),
        },
    ));
    assert!(outage.is_transient());
    assert_eq!(outage.code(), "credential_store_unavailable");

    let unknown = ReceiveError::from(ContextError::UnknownTenant {
        tenant_id: "T1".to_string(),
    });
    assert!(!unknown.is_transient());
    assert!(!ReceiveError::from(AuthError::InvalidSignature).is_transient());
}

#[test]
fn test_describe_panic_payloads() {
    let static_payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
    let owned_payload = std::panic::catch_unwind(|| panic!("{} {}", "owned", 1)).unwrap_err();
    let other_payload = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();

    assert_eq!(describe_panic(static_payload.as_ref()), "boom");
    assert_eq!(describe_panic(owned_payload.as_ref()), "owned 1");
    assert_eq!(describe_panic(other_payload.as_ref()), "non-string panic payload");
}
