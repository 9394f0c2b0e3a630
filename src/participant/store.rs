// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Participant-local key-value store.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::Command;

/// Mutated only by a successful commit (live or replayed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KvStore(BTreeMap<String, String>);

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a command. SET is idempotent, so re-applying during
    /// replay leaves the same state.
    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::Set { key, value } => {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
