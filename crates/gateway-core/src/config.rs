//! Adapter configuration.
//!
//! An [`AdapterConfig`] is a flat map of string keys to JSON scalars. Each
//! adapter reads the keys it understands and ignores the rest.

use crate::error::{GatewayError, GatewayResult};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Keys whose values are never printed
const REDACTED_KEYS: [&str; 3] = ["api_key", "hf_token", "token"];

/// Settings handed to an adapter's `initialize`
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterConfig {
    values: Map<String, Value>,
}

impl AdapterConfig {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key (builder style)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a key, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Whether the key is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Raw value for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Non-empty string value for a key
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// First non-empty string among several alias keys
    #[must_use]
    pub fn get_str_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get_str(key))
    }

    /// Required non-empty string value
    pub fn require_str(&self, key: &str) -> GatewayResult<&str> {
        self.get_str(key)
            .ok_or_else(|| GatewayError::missing_config(key))
    }

    /// Unsigned integer value; numeric strings are accepted
    pub fn get_u64(&self, key: &str) -> GatewayResult<Option<u64>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number.as_u64().map(Some).ok_or_else(|| {
                GatewayError::configuration(key, format!("`{key}` must be a non-negative integer"))
            }),
            Some(Value::String(text)) => text.trim().parse().map(Some).map_err(|_| {
                GatewayError::configuration(key, format!("`{key}` must be a non-negative integer"))
            }),
            Some(_) => Err(GatewayError::configuration(
                key,
                format!("`{key}` must be a non-negative integer"),
            )),
        }
    }

    /// Signed integer value; numeric strings are accepted
    pub fn get_i64(&self, key: &str) -> GatewayResult<Option<i64>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(|| {
                GatewayError::configuration(key, format!("`{key}` must be an integer"))
            }),
            Some(Value::String(text)) => text.trim().parse().map(Some).map_err(|_| {
                GatewayError::configuration(key, format!("`{key}` must be an integer"))
            }),
            Some(_) => Err(GatewayError::configuration(
                key,
                format!("`{key}` must be an integer"),
            )),
        }
    }

    /// Boolean value; "true"/"false"/"1"/"0" strings are accepted
    pub fn get_bool(&self, key: &str) -> GatewayResult<Option<bool>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(GatewayError::configuration(
                    key,
                    format!("`{key}` must be a boolean"),
                )),
            },
            Some(_) => Err(GatewayError::configuration(
                key,
                format!("`{key}` must be a boolean"),
            )),
        }
    }

    /// Required secret value, e.g. an API key
    pub fn require_secret(&self, key: &str) -> GatewayResult<SecretString> {
        self.require_str(key)
            .map(|value| SecretString::new(value.to_string()))
    }

    /// Optional secret value
    #[must_use]
    pub fn secret(&self, key: &str) -> Option<SecretString> {
        self.get_str(key)
            .map(|value| SecretString::new(value.to_string()))
    }

    /// Copy every key from `other` that is not already set here
    pub fn merge_missing(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Configured keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no key is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if REDACTED_KEYS.contains(&key.as_str()) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl From<Map<String, Value>> for AdapterConfig {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AdapterConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
