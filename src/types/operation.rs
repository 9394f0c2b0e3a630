// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Operation payloads.
//!
//! The coordinator treats an [`Operation`] as an opaque JSON object and
//! forwards it untouched. Participants interpret it as a [`Command`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque operation object as carried on the wire and in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(Map<String, Value>);

/// Interpreted operation. Only `SET` is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
}

impl Operation {
    /// Builds a `SET key value` operation.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String("SET".to_string()));
        map.insert("key".to_string(), Value::String(key.into()));
        map.insert("value".to_string(), Value::String(value.into()));
        Operation(map)
    }

    /// Accepts any JSON object; anything else is not an operation.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Operation(map)),
            _ => None,
        }
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Compact single-line JSON, safe to use as the last log field.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Interprets the payload. `None` means the participant must vote NO.
    pub fn command(&self) -> Option<Command> {
        let kind = self.0.get("type").map(scalar_text).unwrap_or_default();
        if !kind.eq_ignore_ascii_case("SET") {
            return None;
        }
        let key = self.0.get("key").map(scalar_text).unwrap_or_default();
        if key.trim().is_empty() {
            return None;
        }
        let value = self.0.get("value").map(scalar_text).unwrap_or_default();
        Some(Command::Set { key, value })
    }
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. } => key,
        }
    }
}

// Strings are taken verbatim, other scalars in their JSON spelling.
// Null reads as absent.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
