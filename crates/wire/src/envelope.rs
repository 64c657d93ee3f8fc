//! Application message envelope.
//!
//! Messages travel as a JSON array of two or three elements:
//! `["target", "action"]` or `["target", "action", {params}]`. Target and
//! action route the message to a registered action; the optional third
//! element carries named parameters.

use serde_json::{Map, Value};

/// A decoded `[target, action, params?]` message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: String,
    pub action: String,
    pub params: Map<String, Value>,
}

impl Envelope {
    /// Creates an envelope without parameters.
    pub fn new(target: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            action: action.into(),
            params: Map::new(),
        }
    }

    /// Creates an envelope from a `json!` object literal.
    ///
    /// Any value other than an object counts as "no parameters".
    pub fn from_parts(
        target: impl Into<String>,
        action: impl Into<String>,
        params: Value,
    ) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            target: target.into(),
            action: action.into(),
            params,
        }
    }

    /// Serializes to the wire form: two elements when there are no
    /// parameters, three otherwise.
    pub fn encode(&self) -> String {
        let mut items = vec![
            Value::String(self.target.clone()),
            Value::String(self.action.clone()),
        ];
        if !self.params.is_empty() {
            items.push(Value::Object(self.params.clone()));
        }
        Value::Array(items).to_string()
    }

    /// Parses a wire message.
    ///
    /// Returns `None` for anything that is not a well-formed envelope:
    /// unparseable text, a non-array, a missing or empty target or
    /// action, or a third element that is not an object. Elements past
    /// the third are ignored. Malformed messages are dropped, never
    /// surfaced to the peer.
    pub fn decode(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let items = value.as_array()?;

        let target = items.first()?.as_str()?;
        let action = items.get(1)?.as_str()?;
        if target.is_empty() || action.is_empty() {
            return None;
        }

        let params = match items.get(2) {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return None,
        };

        Some(Self {
            target: target.to_string(),
            action: action.to_string(),
            params,
        })
    }
}
