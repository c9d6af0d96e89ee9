//! Flattening of submitted modal state into a field → value map.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Value submitted for a single form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Scalar(String),
    List(Vec<String>),
}

impl FormValue {
    /// Get the scalar value, if this is a single value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    /// Get the selected values, if this is a multi-value field.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Scalar(_) => None,
            Self::List(items) => Some(items),
        }
    }
}

/// How the value of a field-state descriptor is read.
enum Extraction {
    /// Raw string under the given key.
    Raw(&'static str),
    /// `selected_option.value`.
    SelectedOption,
    /// `selected_options[*].value`.
    SelectedOptions,
    /// Array of raw ids under the given key.
    IdList(&'static str),
}

fn extraction_for(descriptor_type: &str) -> Option<Extraction> {
    let extraction = match descriptor_type {
        "plain_text_input" | "email_text_input" | "url_text_input" | "number_input" => {
            Extraction::Raw("value")
        }
        "datepicker" => Extraction::Raw("selected_date"),
        "timepicker" => Extraction::Raw("selected_time"),
        "static_select" | "external_select" | "radio_buttons" => Extraction::SelectedOption,
        "multi_static_select" | "multi_external_select" | "checkboxes" => {
            Extraction::SelectedOptions
        }
        "users_select" => Extraction::Raw("selected_user"),
        "conversations_select" => Extraction::Raw("selected_conversation"),
        "channels_select" => Extraction::Raw("selected_channel"),
        "multi_users_select" => Extraction::IdList("selected_users"),
        "multi_conversations_select" => Extraction::IdList("selected_conversations"),
        "multi_channels_select" => Extraction::IdList("selected_channels"),
        _ => return None,
    };
    Some(extraction)
}

/// Flatten a view's `state.values` tree into a single map.
///
/// The input is nested two levels deep (block id → field id → descriptor).
/// Block ids are discarded. Fields whose descriptor type is not recognised,
/// and single-value fields with nothing selected, are left out of the map.
/// When two blocks use the same field id the later block (in key order) wins.
pub fn flatten_form_values(state_values: &Value) -> BTreeMap<String, FormValue> {
    let mut values = BTreeMap::new();

    let Some(blocks) = state_values.as_object() else {
        return values;
    };

    for fields in blocks.values() {
        let Some(fields) = fields.as_object() else {
            continue;
        };

        for (field_id, descriptor) in fields {
            let descriptor_type = descriptor
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let Some(extraction) = extraction_for(descriptor_type) else {
                debug!(
                    field_id = %field_id,
                    descriptor_type = %descriptor_type,
                    "Dropping form field with unrecognised descriptor type"
                );
                continue;
            };

            if let Some(value) = extract(descriptor, &extraction) {
                values.insert(field_id.clone(), value);
            }
        }
    }

    values
}

fn extract(descriptor: &Value, extraction: &Extraction) -> Option<FormValue> {
    match extraction {
        Extraction::Raw(key) => descriptor
            .get(*key)
            .and_then(Value::as_str)
            .map(|s| FormValue::Scalar(s.to_string())),
        Extraction::SelectedOption => descriptor
            .get("selected_option")
            .and_then(|option| option.get("value"))
            .and_then(Value::as_str)
            .map(|s| FormValue::Scalar(s.to_string())),
        Extraction::SelectedOptions => {
            let selected = descriptor
                .get("selected_options")
                .and_then(Value::as_array)
                .map(|options| {
                    options
                        .iter()
                        .filter_map(|o| o.get("value").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(FormValue::List(selected))
        }
        Extraction::IdList(key) => {
            let selected = descriptor
                .get(*key)
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(FormValue::List(selected))
        }
    }
}

#[cfg(test)]
#[path = "form_values_tests.rs"]
mod tests;
