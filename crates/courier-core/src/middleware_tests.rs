//! Tests for the middleware pipeline.

use super::*;
use crate::{
    context::{ApiClient, DEFAULT_API_BASE_URL},
    credentials::CredentialToken,
    events::normalize,
    TenantId,
};
use serde_json::json;
use std::sync::Mutex;

fn context_for(tenant: &str) -> ExecutionContext {
    let client = ApiClient::new(
        reqwest::Client::new(),
        url::Url::parse(DEFAULT_API_BASE_URL).unwrap(),
        CredentialToken::from("xoxb-test"),
    );
    ExecutionContext::new(TenantId::new(tenant).unwrap(), Some("U1".into()), None, client)
}

fn command_event() -> Event {
    normalize(&json!({"command": "/deploy", "team_id": "T1"})).unwrap()
}

fn shared<F>(name: &str, f: F) -> Arc<dyn Middleware>
where
    F: Fn(&ExecutionContext, &Event) -> Result<MiddlewareOutcome, MiddlewareError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(from_fn(name, f))
}

/// Middleware that records its label and continues unchanged.
fn recording(label: &'static str, calls: Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Middleware> {
    shared(label, move |context, _event| {
        calls.lock().unwrap().push(label);
        Ok(MiddlewareOutcome::Continue(context.clone()))
    })
}

#[test]
fn test_runs_in_registration_order() {
    // Arrange
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MiddlewarePipeline::new(vec![
        recording("first", calls.clone()),
        recording("second", calls.clone()),
        recording("third", calls.clone()),
    ]);

    // Act
    let context = pipeline.run(context_for("T1"), &command_event());

    // Assert
    assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    assert!(!context.is_halted());
}

#[test]
fn test_continue_replaces_context() {
    let pipeline = MiddlewarePipeline::new(vec![
        shared("assign_a", |context, _| {
            Ok(MiddlewareOutcome::Continue(context.with_assign("a", 1)))
        }),
        shared("assign_b", |context, _| {
            let a = context.assign("a").cloned().unwrap_or_default();
            Ok(MiddlewareOutcome::Continue(context.with_assign("b", a)))
        }),
    ]);

    let context = pipeline.run(context_for("T1"), &command_event());

    assert_eq!(context.assign("a"), Some(&json!(1)));
    assert_eq!(context.assign("b"), Some(&json!(1)));
}

/// Verify that middleware after a halt are skipped, not invoked.
#[test]
fn test_halt_stops_traversal() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MiddlewarePipeline::new(vec![
        recording("before", calls.clone()),
        shared("gate", |_, _| {
            Ok(MiddlewareOutcome::Halt {
                reason: "user not allowed".to_string(),
            })
        }),
        recording("after", calls.clone()),
    ]);

    let context = pipeline.run(context_for("T1"), &command_event());

    assert!(context.is_halted());
    assert_eq!(context.halt_reason(), Some("user not allowed"));
    assert_eq!(*calls.lock().unwrap(), vec!["before"]);
}

#[test]
fn test_continue_with_halted_context_counts_as_halt() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MiddlewarePipeline::new(vec![
        shared("soft_gate", |context, _| {
            Ok(MiddlewareOutcome::Continue(context.halted_with("quiet hours")))
        }),
        recording("after", calls.clone()),
    ]);

    let context = pipeline.run(context_for("T1"), &command_event());

    assert!(context.is_halted());
    assert_eq!(context.halt_reason(), Some("quiet hours"));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_already_halted_context_runs_nothing() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MiddlewarePipeline::new(vec![recording("only", calls.clone())]);

    let context = pipeline.run(context_for("T1").halted_with("earlier"), &command_event());

    assert!(context.is_halted());
    assert!(calls.lock().unwrap().is_empty());
}

// ============================================================================
// Contract violations
// ============================================================================

#[test]
fn test_error_keeps_prior_context_and_continues() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MiddlewarePipeline::new(vec![
        shared("assign", |context, _| {
            Ok(MiddlewareOutcome::Continue(context.with_assign("kept", true)))
        }),
        shared("broken", |_, _| Err(MiddlewareError::failed("lookup failed"))),
        recording("after", calls.clone()),
    ]);

    let context = pipeline.run(context_for("T1"), &command_event());

    assert_eq!(context.assign("kept"), Some(&json!(true)));
    assert!(!context.is_halted());
    assert_eq!(*calls.lock().unwrap(), vec!["after"]);
}

#[test]
fn test_panic_keeps_prior_context_and_continues() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pipeline = MiddlewarePipeline::new(vec![
        shared("explodes", |_, _| -> Result<MiddlewareOutcome, MiddlewareError> {
            panic!("middleware bug")
        }),
        recording("after", calls.clone()),
    ]);

    let context = pipeline.run(context_for("T1"), &command_event());

    assert!(!context.is_halted());
    assert_eq!(*calls.lock().unwrap(), vec!["after"]);
}

#[test]
fn test_rehoming_context_is_ignored() {
    let pipeline = MiddlewarePipeline::new(vec![shared("rehome", |_, _| {
        Ok(MiddlewareOutcome::Continue(context_for("T_OTHER")))
    })]);

    let context = pipeline.run(context_for("T1"), &command_event());

    assert_eq!(context.tenant_id().as_str(), "T1");
}

// ============================================================================
// Trait implementations
// ============================================================================

struct RequireUser;

impl Middleware for RequireUser {
    fn name(&self) -> &str {
        "require_user"
    }

    fn call(
        &self,
        context: &ExecutionContext,
        event: &Event,
    ) -> Result<MiddlewareOutcome, MiddlewareError> {
        match event.user_id() {
            Some(_) => Ok(MiddlewareOutcome::Continue(context.clone())),
            None => Ok(MiddlewareOutcome::Halt {
                reason: "anonymous event".to_string(),
            }),
        }
    }
}

#[test]
fn test_struct_middleware() {
    let require_user: Arc<dyn Middleware> = Arc::new(RequireUser);
    let pipeline = MiddlewarePipeline::new(vec![require_user]);

    let context = pipeline.run(context_for("T1"), &command_event());

    assert!(context.is_halted());
    assert_eq!(context.halt_reason(), Some("anonymous event"));
    assert_eq!(format!("{:?}", pipeline), "[\"require_user\"]");
}

#[test]
fn test_empty_pipeline_is_identity() {
    let pipeline = MiddlewarePipeline::default();

    let context = pipeline.run(context_for("T1").with_assign("x", 1), &command_event());

    assert!(pipeline.is_empty());
    assert_eq!(context.assign("x"), Some(&json!(1)));
}
