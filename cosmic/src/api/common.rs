//! Common types and utilities for the Cosmic API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::error::ApiError;

/// Command parameters, kept sorted for signing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiParams {
    params: BTreeMap<String, String>,
}

impl ApiParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.insert(key.into(), v.to_string());
        }
        self
    }

    /// Adds the value unless it is empty
    pub fn add_non_empty<K: Into<String>>(self, key: K, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.add(key, value)
        }
    }

    /// `tags[i].key` / `tags[i].value` pairs, ordered by key
    pub fn add_tags(mut self, tags: &HashMap<String, String>) -> Self {
        let mut keys: Vec<&String> = tags.keys().collect();
        keys.sort();

        for (i, key) in keys.into_iter().enumerate() {
            self.params.insert(format!("tags[{}].key", i), key.clone());
            self.params.insert(format!("tags[{}].value", i), tags[key].clone());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.params
    }

    /// Flattens a request struct into command parameters.
    /// Nulls are skipped and arrays become comma-separated lists.
    pub fn from_request<T: Serialize>(request: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(request)
            .map_err(|e| ApiError::ParseError(format!("Failed to encode request: {}", e)))?;

        let Value::Object(fields) = value else {
            return Err(ApiError::ParseError(
                "request must serialize to an object".to_string(),
            ));
        };

        let mut params = Self::new();
        for (key, field) in fields {
            if let Some(rendered) = render_param(&field) {
                params.params.insert(key, rendered);
            }
        }
        Ok(params)
    }

    /// Merges `other` into these parameters
    pub fn extend(mut self, other: ApiParams) -> Self {
        self.params.extend(other.params);
        self
    }
}

fn render_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_param)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => None,
    }
}

/// Key/value resource tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Collects tags into a map
pub fn tags_to_map(tags: &[Tag]) -> HashMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Error fields carried by a failed command envelope or job result
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorEnvelope {
    pub errorcode: i64,
    pub cserrorcode: i64,
    pub errortext: String,
}

/// queryAsyncJobResult response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AsyncJobStatus {
    pub jobid: String,
    pub jobstatus: i64,
    pub jobresultcode: i64,
    pub jobresult: serde_json::Value,
}

/// Job status values
pub const JOB_PENDING: i64 = 0;
pub const JOB_SUCCEEDED: i64 = 1;
pub const JOB_FAILED: i64 = 2;

/// Commonly returned `{ "success": true }` payload
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuccessResponse {
    #[serde(deserialize_with = "bool_or_string::deserialize")]
    pub success: bool,
    pub displaytext: String,
}

/// Minimal named entity used by name-or-ID lookups
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedEntity {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Numbers that older API versions return as strings
pub mod string_or_i64 {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrI64 {
            String(String),
            I64(i64),
            F64(f64),
        }

        match Option::<StringOrI64>::deserialize(deserializer)? {
            Some(StringOrI64::String(s)) if s.is_empty() => Ok(None),
            Some(StringOrI64::String(s)) => {
                s.parse::<i64>().map(Some).map_err(serde::de::Error::custom)
            }
            Some(StringOrI64::I64(i)) => Ok(Some(i)),
            Some(StringOrI64::F64(f)) => Ok(Some(f as i64)),
            None => Ok(None),
        }
    }
}

/// Booleans that some commands return as `"true"`/`"false"`
pub mod bool_or_string {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum BoolOrString {
            Bool(bool),
            String(String),
        }

        match Option::<BoolOrString>::deserialize(deserializer)? {
            Some(BoolOrString::Bool(b)) => Ok(b),
            Some(BoolOrString::String(s)) => Ok(s.eq_ignore_ascii_case("true")),
            None => Ok(false),
        }
    }
}
