//! Integration tests for the dispatch contracts
//!
//! These tests call the webhook handler directly (no HTTP layer) with a
//! registry of scripted middleware and handlers, and check the response the
//! platform would see.

mod common;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use common::{
    create_test_app_state, form_body, signed_headers, AsyncBehaviour, ScriptedHandler,
    SyncBehaviour, FORM, JSON, TENANT,
};
use courier_api::handle_webhook;
use courier_core::{
    middleware::from_fn, DeferredExecutor, MiddlewareError, MiddlewareOutcome, StaticRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn command_body() -> String {
    form_body(&[("command", "/x"), ("team_id", TENANT), ("user_id", "U1")])
}

async fn send(registry: StaticRegistry, body: String, content_type: &str) -> (StatusCode, Value) {
    let state = create_test_app_state(registry, Arc::new(DeferredExecutor::new()));
    let headers = signed_headers(&body, content_type);

    let response = handle_webhook(State(state), headers, Bytes::from(body))
        .await
        .into_response();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// ============================================================================
// Single responder
// ============================================================================

/// Verify that the first responder wins when earlier handlers ignore
#[tokio::test]
async fn test_ignore_then_respond() {
    let ignoring = ScriptedHandler::sync_only("ignoring", SyncBehaviour::Ignore);
    let responding = ScriptedHandler::sync_only("responding", SyncBehaviour::Respond(json!("A")));
    let registry = StaticRegistry::new()
        .with_shared_handler(ignoring.clone())
        .with_shared_handler(responding.clone());

    let (status, body) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("A"));
    assert_eq!(ignoring.sync_calls(), 1);
    assert_eq!(responding.sync_calls(), 1);
}

/// Verify that two responders are reported as a server error
#[tokio::test]
async fn test_two_responders_is_an_error() {
    let registry = StaticRegistry::new()
        .with_shared_handler(ScriptedHandler::sync_only("a", SyncBehaviour::Respond(json!("A"))))
        .with_shared_handler(ScriptedHandler::sync_only("b", SyncBehaviour::Respond(json!("B"))));

    let (status, body) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "multiple_responders"}));
}

/// Verify that a failure claim counts toward the single-responder rule
#[tokio::test]
async fn test_fail_and_respond_is_an_error() {
    let registry = StaticRegistry::new()
        .with_shared_handler(ScriptedHandler::sync_only(
            "failing",
            SyncBehaviour::Fail("nope".to_string()),
        ))
        .with_shared_handler(ScriptedHandler::sync_only("ok", SyncBehaviour::Respond(json!({}))));

    let (status, body) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "multiple_responders"}));
}

#[tokio::test]
async fn test_only_ignoring_handlers_is_an_error() {
    let registry = StaticRegistry::new()
        .with_shared_handler(ScriptedHandler::sync_only("ignoring", SyncBehaviour::Ignore));

    let (status, body) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "no_handler_responded"}));
}

/// Verify that erroring and panicking handlers do not stop a later responder
#[tokio::test]
async fn test_failing_handlers_are_isolated() {
    let erroring = ScriptedHandler::sync_only("erroring", SyncBehaviour::Error);
    let panicking = ScriptedHandler::sync_only("panicking", SyncBehaviour::Panic);
    let responding = ScriptedHandler::sync_only("responding", SyncBehaviour::Respond(json!("C")));
    let registry = StaticRegistry::new()
        .with_shared_handler(erroring)
        .with_shared_handler(panicking)
        .with_shared_handler(responding.clone());

    let (status, body) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("C"));
    assert_eq!(responding.sync_calls(), 1);
}

/// Verify that a handler without a sync capability is skipped
#[tokio::test]
async fn test_async_only_handler_is_skipped_for_interactions() {
    let background = ScriptedHandler::async_only("background", AsyncBehaviour::Done);
    let responding = ScriptedHandler::sync_only("responding", SyncBehaviour::Respond(json!("D")));
    let registry = StaticRegistry::new()
        .with_shared_handler(background.clone())
        .with_shared_handler(responding);

    let (status, body) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("D"));
    assert!(background.seen().is_empty());
}

// ============================================================================
// Middleware
// ============================================================================

/// Verify that a halting middleware acknowledges without running handlers
#[tokio::test]
async fn test_halting_middleware_skips_handlers() {
    let handler = ScriptedHandler::sync_only("h", SyncBehaviour::Respond(json!("never")));
    let registry = StaticRegistry::new()
        .with_middleware(from_fn("block", |_, _| {
            Ok(MiddlewareOutcome::Halt {
                reason: "blocked user".to_string(),
            })
        }))
        .with_shared_handler(handler.clone());

    let (status, body) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
    assert_eq!(handler.sync_calls(), 0);
}

/// Verify that assigns made by middleware reach the handler
#[tokio::test]
async fn test_middleware_assigns_reach_handler() {
    let handler = ScriptedHandler::sync_only("h", SyncBehaviour::Respond(json!({})));
    let registry = StaticRegistry::new()
        .with_middleware(from_fn("locale", |context, _| {
            Ok(MiddlewareOutcome::Continue(context.with_assign("locale", "en-GB")))
        }))
        .with_middleware(from_fn("broken", |_, _| {
            Err(MiddlewareError::failed("lookup failed"))
        }))
        .with_middleware(from_fn("plan", |context, _| {
            Ok(MiddlewareOutcome::Continue(context.with_assign("plan", "pro")))
        }))
        .with_shared_handler(handler.clone());

    let (status, _) = send(registry, command_body(), FORM).await;

    assert_eq!(status, StatusCode::OK);
    let seen = handler.seen();
    let context = &seen[0].1;
    assert_eq!(context.assign("locale"), Some(&json!("en-GB")));
    assert_eq!(context.assign("plan"), Some(&json!("pro")));
    assert!(!context.is_halted());
}

// ============================================================================
// Background events
// ============================================================================

#[tokio::test]
async fn test_background_event_never_reports_handler_failure() {
    let registry = StaticRegistry::new()
        .with_shared_handler(ScriptedHandler::async_only("panicking", AsyncBehaviour::Panic));
    let body = json!({
        "type": "event_callback",
        "team_id": TENANT,
        "event": {"type": "app_home_opened", "user": "U1", "tab": "home", "event_ts": "2.2"}
    })
    .to_string();

    let (status, body) = send(registry, body, JSON).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}
