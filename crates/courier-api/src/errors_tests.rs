//! Tests for HTTP error mapping.

use super::*;
use axum::body::to_bytes;
use courier_core::{AuthError, CredentialError, DispatchError, NormalizationError};

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Status mapping
// ============================================================================

/// Verify that every receive failure maps to its documented status.
#[test]
fn test_status_per_receive_error() {
    let cases = [
        (
            ReceiveError::Auth(AuthError::StaleTimestamp),
            StatusCode::UNAUTHORIZED,
        ),
        (
            ReceiveError::MalformedBody {
                message: "x".to_string(),
            },
            StatusCode::BAD_REQUEST,
        ),
        (
            ReceiveError::Normalization(NormalizationError::UnrecognizedPayloadShape),
            StatusCode::BAD_REQUEST,
        ),
        (
            ReceiveError::Context(ContextError::UnknownTenant {
                tenant_id: "T9".to_string(),
            }),
            StatusCode::FORBIDDEN,
        ),
        (
            ReceiveError::Context(ContextError::CredentialStore(
                CredentialError::Unavailable {
                    message: "down".to_string(),
                },
            )),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            ReceiveError::Dispatch(DispatchError::NoHandlerResponded { handlers: 2 }),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (error, expected) in cases {
        let code = error.code();
        assert_eq!(
            WebhookHandlerError::from(error).status(),
            expected,
            "wrong status for {}",
            code
        );
    }
}

// ============================================================================
// Response bodies
// ============================================================================

/// Verify that stale and forged requests get the same body.
#[tokio::test]
async fn test_auth_failures_share_one_body() {
    let stale = WebhookHandlerError::from(ReceiveError::Auth(AuthError::StaleTimestamp))
        .into_response();
    let forged = WebhookHandlerError::from(ReceiveError::Auth(AuthError::InvalidSignature))
        .into_response();

    let stale = body_json(stale).await;
    let forged = body_json(forged).await;

    assert_eq!(stale, serde_json::json!({"error": "invalid_request_signature"}));
    assert_eq!(stale, forged);
}

#[tokio::test]
async fn test_handler_failure_returns_reason() {
    let response = WebhookHandlerError::HandlerFailed {
        reason: "deploy_locked".to_string(),
    }
    .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "deploy_locked"})
    );
}

/// Verify that only transient failures carry a Retry-After header.
#[tokio::test]
async fn test_retry_after_only_for_transient_errors() {
    let unavailable = WebhookHandlerError::from(ReceiveError::Context(
        ContextError::CredentialStore(CredentialError::Unavailable {
            message: "down".to_string(),
        }),
    ))
    .into_response();
    let unknown = WebhookHandlerError::from(ReceiveError::Context(ContextError::UnknownTenant {
        tenant_id: "T9".to_string(),
    }))
    .into_response();

    assert!(unavailable.headers().contains_key("Retry-After"));
    assert!(!unknown.headers().contains_key("Retry-After"));
    assert_eq!(
        body_json(unavailable).await,
        serde_json::json!({"error": "credential_store_unavailable"})
    );
}

#[test]
fn test_service_error_exit_codes() {
    let bind = ServiceError::BindFailed {
        address: "0.0.0.0:1".to_string(),
        message: "in use".to_string(),
    };
    let server = ServiceError::ServerFailed {
        message: "boom".to_string(),
    };
    let config = ServiceError::from(ConfigError::Missing {
        key: "webhooks.signing_secret".to_string(),
    });

    assert_eq!(bind.exit_code(), 1);
    assert_eq!(server.exit_code(), 2);
    assert_eq!(config.exit_code(), 3);
}
