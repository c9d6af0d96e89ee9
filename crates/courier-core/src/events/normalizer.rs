//! Shape-sniffing normalizer for raw platform payloads.

use super::{
    flatten_form_values, Action, ActionElement, BackgroundEvent, ButtonAction, Command, Event,
    ResponseCallback, ViewSubmission,
};
use crate::error::NormalizationError;
use serde_json::Value;
use tracing::warn;

const BLOCK_ACTIONS: &str = "block_actions";
const VIEW_SUBMISSION: &str = "view_submission";

/// Convert a raw payload into a typed [`Event`].
///
/// Rules are tried in order and the first match wins:
///
/// 1. an `event` field → [`Event::Background`]
/// 2. a `command` field → [`Event::Command`]
/// 3. `type == "block_actions"` → [`Event::Action`]
/// 4. `type == "view_submission"` → [`Event::ViewSubmission`]
///
/// # Errors
///
/// Returns `NormalizationError::UnrecognizedPayloadShape` when no rule
/// matches. Missing fields inside a recognised shape never fail.
pub fn normalize(raw: &Value) -> Result<Event, NormalizationError> {
    if let Some(inner) = raw.get("event") {
        return Ok(Event::Background(background_event(inner)));
    }

    if raw.get("command").is_some() {
        return Ok(Event::Command(command(raw)));
    }

    match raw.get("type").and_then(Value::as_str) {
        Some(BLOCK_ACTIONS) => Ok(Event::Action(action(raw))),
        Some(VIEW_SUBMISSION) => Ok(Event::ViewSubmission(view_submission(raw))),
        _ => Err(NormalizationError::UnrecognizedPayloadShape),
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn str_or_empty(value: &Value, key: &str) -> String {
    opt_str(value, key).unwrap_or_default()
}

/// Read an id that may be sent either as a bare string or as `{"id": ...}`.
fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(id) => Some(id.clone()),
        Value::Object(object) => object.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn raw_or_null(value: &Value, key: &str) -> Value {
    value.get(key).cloned().unwrap_or(Value::Null)
}

// ============================================================================
// Variant parsers
// ============================================================================

fn background_event(inner: &Value) -> BackgroundEvent {
    BackgroundEvent {
        kind: str_or_empty(inner, "type"),
        user_id: id_field(inner, "user"),
        channel_id: id_field(inner, "channel"),
        timestamp: opt_str(inner, "ts").or_else(|| opt_str(inner, "event_ts")),
        surface_tab: opt_str(inner, "tab"),
        view_snapshot: inner.get("view").cloned(),
        text: opt_str(inner, "text"),
        raw: inner.clone(),
    }
}

fn command(raw: &Value) -> Command {
    Command {
        command: str_or_empty(raw, "command"),
        text: str_or_empty(raw, "text"),
        user_id: str_or_empty(raw, "user_id"),
        user_display_name: str_or_empty(raw, "user_name"),
        channel_id: str_or_empty(raw, "channel_id"),
        channel_name: str_or_empty(raw, "channel_name"),
        tenant_id: str_or_empty(raw, "team_id"),
        tenant_domain: str_or_empty(raw, "team_domain"),
        response_callback_url: str_or_empty(raw, "response_url"),
        interaction_trigger_id: str_or_empty(raw, "trigger_id"),
    }
}

fn action(raw: &Value) -> Action {
    let element = raw
        .get("actions")
        .and_then(Value::as_array)
        .and_then(|actions| actions.first())
        .and_then(action_element);

    Action {
        kind: str_or_empty(raw, "type"),
        user_id: id_field(raw, "user").unwrap_or_default(),
        channel_id: id_field(raw, "channel"),
        element,
        interaction_trigger_id: str_or_empty(raw, "trigger_id"),
        container: raw_or_null(raw, "container"),
        view_snapshot: raw.get("view").cloned(),
    }
}

fn action_element(element: &Value) -> Option<ActionElement> {
    let element_type = element.get("type").and_then(Value::as_str).unwrap_or_default();

    match element_type {
        "button" => Some(ActionElement::Button(ButtonAction {
            kind: element_type.to_string(),
            action_id: str_or_empty(element, "action_id"),
            container_block_id: str_or_empty(element, "block_id"),
            fired_at: str_or_empty(element, "action_ts"),
            value: opt_str(element, "value"),
            display_text: element
                .get("text")
                .map(|text| match text {
                    Value::String(s) => s.clone(),
                    other => str_or_empty(other, "text"),
                })
                .unwrap_or_default(),
            url: opt_str(element, "url"),
        })),
        other => {
            warn!(
                element_type = %other,
                action_id = ?element.get("action_id").and_then(|id| id.as_str()),
                "Action element type is not supported, carrying no element"
            );
            None
        }
    }
}

fn view_submission(raw: &Value) -> ViewSubmission {
    let view = raw_or_null(raw, "view");
    let form_values = view
        .get("state")
        .and_then(|state| state.get("values"))
        .map(flatten_form_values)
        .unwrap_or_default();

    let tenant_id = id_field(raw, "team")
        .or_else(|| raw.get("user").and_then(|user| opt_str(user, "team_id")))
        .unwrap_or_default();

    let response_callbacks = raw
        .get("response_urls")
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(|url| serde_json::from_value::<ResponseCallback>(url.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    ViewSubmission {
        kind: str_or_empty(raw, "type"),
        user_id: id_field(raw, "user").unwrap_or_default(),
        tenant_id,
        form_callback_id: str_or_empty(&view, "callback_id"),
        form_values,
        view_snapshot: view,
        interaction_trigger_id: str_or_empty(raw, "trigger_id"),
        response_callbacks,
    }
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
