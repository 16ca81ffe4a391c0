// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoder for message-history replies.
//!
//! The server is not consistent about how it wraps history, so each known
//! shape has a matcher and the first match wins.

use chatwatch_core::ChatwatchError;
use serde_json::Value;

use crate::buffer::RawMessage;

/// A recognized history reply, holding the entries in server order.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryShape {
    /// `{"messages": [...]}`, alone or as the first array element.
    Wrapped(Vec<Value>),
    /// `[[...], ...]`
    Nested(Vec<Value>),
    /// `[{"message": ...}, ...]`
    Bare(Vec<Value>),
}

type Matcher = fn(&Value) -> Option<HistoryShape>;

const MATCHERS: &[Matcher] = &[match_wrapped, match_nested, match_bare];

fn messages_field(value: &Value) -> Option<&Vec<Value>> {
    value.get("messages")?.as_array()
}

fn match_wrapped(payload: &Value) -> Option<HistoryShape> {
    let list = match payload {
        Value::Object(_) => messages_field(payload),
        Value::Array(items) => items.first().and_then(messages_field),
        _ => None,
    }?;
    Some(HistoryShape::Wrapped(list.clone()))
}

fn match_nested(payload: &Value) -> Option<HistoryShape> {
    match payload.as_array()?.first()? {
        Value::Array(inner) => Some(HistoryShape::Nested(inner.clone())),
        _ => None,
    }
}

fn match_bare(payload: &Value) -> Option<HistoryShape> {
    let items = payload.as_array()?;
    match items.first() {
        None => Some(HistoryShape::Bare(Vec::new())),
        Some(first) if looks_like_message(first) => Some(HistoryShape::Bare(items.clone())),
        Some(_) => None,
    }
}

/// Status acks like `{"ok":true}` are objects too, so require a `message` field.
fn looks_like_message(value: &Value) -> bool {
    value.as_object().is_some_and(|object| object.contains_key("message"))
}

impl HistoryShape {
    /// Run the matchers in order against an ack payload.
    pub fn decode(payload: &Value) -> Result<HistoryShape, ChatwatchError> {
        MATCHERS
            .iter()
            .find_map(|matcher| matcher(payload))
            .ok_or_else(|| {
                ChatwatchError::protocol(format!(
                    "unrecognized history payload: {}",
                    shape_hint(payload)
                ))
            })
    }

    /// Normalize into buffer entries, skipping anything that is not an object.
    pub fn into_messages(self) -> Vec<RawMessage> {
        let (HistoryShape::Wrapped(items)
        | HistoryShape::Nested(items)
        | HistoryShape::Bare(items)) = self;
        items.iter().filter_map(RawMessage::from_value).collect()
    }
}

fn shape_hint(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
