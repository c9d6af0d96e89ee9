//! Typed event model for inbound platform payloads.
//!
//! The platform sends four structurally different payload shapes. The
//! [`normalize`] function sniffs the shape of a raw JSON object and produces
//! exactly one [`Event`] variant for it:
//!
//! | Shape | Variant |
//! |-------|---------|
//! | has an `event` field | [`Event::Background`] |
//! | has a `command` field | [`Event::Command`] |
//! | `type == "block_actions"` | [`Event::Action`] |
//! | `type == "view_submission"` | [`Event::ViewSubmission`] |
//!
//! Anything else is rejected with
//! [`NormalizationError::UnrecognizedPayloadShape`](crate::error::NormalizationError).
//!
//! # Examples
//!
//! ```rust
//! use courier_core::events::{normalize, Event, EventCategory};
//! use serde_json::json;
//!
//! let event = normalize(&json!({
//!     "event": {"type": "app_home_opened", "user": "U1", "event_ts": "2.2"}
//! })).unwrap();
//!
//! assert_eq!(event.category(), EventCategory::Background);
//! assert_eq!(event.kind(), "app_home_opened");
//! if let Event::Background(background) = event {
//!     assert_eq!(background.timestamp.as_deref(), Some("2.2"));
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub mod form_values;
pub mod normalizer;

pub use form_values::{flatten_form_values, FormValue};
pub use normalizer::normalize;

// ============================================================================
// Event
// ============================================================================

/// A normalized inbound event.
///
/// The union is closed: every raw payload maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Event {
    Background(BackgroundEvent),
    Command(Command),
    Action(Action),
    ViewSubmission(ViewSubmission),
}

impl Event {
    /// Get the event's category, which selects the dispatch mode.
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Background(_) => EventCategory::Background,
            Self::Command(_) => EventCategory::Command,
            Self::Action(_) => EventCategory::Action,
            Self::ViewSubmission(_) => EventCategory::ViewSubmission,
        }
    }

    /// Get the platform-level kind of the event.
    ///
    /// For background events this is the notification type (e.g. `message`);
    /// for commands it is the command itself (e.g. `/deploy`).
    pub fn kind(&self) -> &str {
        match self {
            Self::Background(e) => &e.kind,
            Self::Command(c) => &c.command,
            Self::Action(a) => &a.kind,
            Self::ViewSubmission(v) => &v.kind,
        }
    }

    /// Get the id of the user that triggered the event, if known.
    pub fn user_id(&self) -> Option<&str> {
        let id = match self {
            Self::Background(e) => e.user_id.as_deref(),
            Self::Command(c) => Some(c.user_id.as_str()),
            Self::Action(a) => Some(a.user_id.as_str()),
            Self::ViewSubmission(v) => Some(v.user_id.as_str()),
        };
        id.filter(|s| !s.is_empty())
    }

    /// Get the id of the channel the event happened in, if known.
    pub fn channel_id(&self) -> Option<&str> {
        let id = match self {
            Self::Background(e) => e.channel_id.as_deref(),
            Self::Command(c) => Some(c.channel_id.as_str()),
            Self::Action(a) => a.channel_id.as_deref(),
            Self::ViewSubmission(_) => None,
        };
        id.filter(|s| !s.is_empty())
    }
}

/// Coarse classification of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Background,
    Command,
    Action,
    ViewSubmission,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Background => "background",
            Self::Command => "command",
            Self::Action => "action",
            Self::ViewSubmission => "view_submission",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Variants
// ============================================================================

/// Asynchronous platform notification (messages, app home opened, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundEvent {
    /// Notification type, from the inner event's `type`
    pub kind: String,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    /// The event's `ts`, or its `event_ts` when `ts` is absent
    pub timestamp: Option<String>,
    /// Tab of the app surface, for app home notifications
    pub surface_tab: Option<String>,
    pub view_snapshot: Option<Value>,
    pub text: Option<String>,
    /// The complete inner event object
    pub raw: Value,
}

/// Slash-command invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub command: String,
    /// Arguments after the command; empty when none were given
    pub text: String,
    pub user_id: String,
    pub user_display_name: String,
    pub channel_id: String,
    pub channel_name: String,
    pub tenant_id: String,
    pub tenant_domain: String,
    pub response_callback_url: String,
    pub interaction_trigger_id: String,
}

/// Interaction with a structured UI element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub kind: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    /// The element that fired; `None` for element types not modelled yet
    pub element: Option<ActionElement>,
    pub interaction_trigger_id: String,
    /// Raw descriptor of the surface containing the element
    pub container: Value,
    pub view_snapshot: Option<Value>,
}

/// The UI element an [`Action`] was fired from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonAction),
}

/// A button press.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonAction {
    pub kind: String,
    pub action_id: String,
    pub container_block_id: String,
    /// Platform timestamp of the press (`action_ts`)
    pub fired_at: String,
    pub value: Option<String>,
    pub display_text: String,
    pub url: Option<String>,
}

/// Modal form submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSubmission {
    pub kind: String,
    pub user_id: String,
    pub tenant_id: String,
    pub form_callback_id: String,
    pub view_snapshot: Value,
    /// Field identifier to submitted value, flattened from the view state
    pub form_values: BTreeMap<String, FormValue>,
    pub interaction_trigger_id: String,
    pub response_callbacks: Vec<ResponseCallback>,
}

/// Where a response to a view submission may be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCallback {
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    pub response_url: String,
}
