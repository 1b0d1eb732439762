//! Query string parameters for FHIR requests

use serde_json::{Map, Value};

/// Ordered list of query parameters.
///
/// Keys may repeat; each pair is serialized as its own `key=value` so FHIR
/// search semantics for repeated parameters (AND) are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Append a parameter only when a value is present.
    pub fn push_opt<V: Into<String>>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    /// Append a positive count; zero leaves the parameter off.
    pub fn push_count(&mut self, key: &str, count: Option<u32>) -> &mut Self {
        if let Some(count) = count.filter(|c| *c > 0) {
            self.push(key, count.to_string());
        }
        self
    }

    /// Build parameters from a JSON object.
    ///
    /// Nulls are dropped, arrays become repeated parameters and scalars use
    /// their plain text form.
    pub fn from_json_map(map: &Map<String, Value>) -> Self {
        let mut params = Self::new();
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar_text(item) {
                            params.push(key.clone(), text);
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        params.push(key.clone(), text);
                    }
                }
            }
        }
        params
    }

    /// Drop every pair named `key`.
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.pairs.retain(|(k, _)| k != key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// First value recorded for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}
