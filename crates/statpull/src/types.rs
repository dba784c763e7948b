//! Request types and the error type shared by every connector.

use serde::{Deserialize, Serialize};

/// A single query parameter value.
///
/// `Many` is sent as repeated `key=value` pairs, one per element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::One(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::One(v)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        ParamValue::Many(v.into_iter().map(str::to_string).collect())
    }
}

/// Ordered query parameters passed through verbatim as the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. A repeated key replaces the earlier value.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Append a value to `key`, promoting an existing single value to a list.
    pub fn push(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => {
                let values = match std::mem::replace(slot, ParamValue::Many(Vec::new())) {
                    ParamValue::One(first) => vec![first, value.to_string()],
                    ParamValue::Many(mut values) => {
                        values.push(value.to_string());
                        values
                    }
                };
                *slot = ParamValue::Many(values);
            }
            None => self
                .entries
                .push((key.to_string(), ParamValue::One(value.to_string()))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into `(key, value)` pairs in insertion order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            match value {
                ParamValue::One(v) => pairs.push((key.clone(), v.clone())),
                ParamValue::Many(vs) => {
                    pairs.extend(vs.iter().map(|v| (key.clone(), v.clone())));
                }
            }
        }
        pairs
    }
}

/// One dataset pull: which dataset, with which query, and whether to persist it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRequest {
    pub dataset: String,
    pub params: QueryParams,
    pub write: bool,
}

impl DatasetRequest {
    pub fn new(dataset: &str, params: QueryParams) -> Self {
        Self {
            dataset: dataset.to_string(),
            params,
            write: true,
        }
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }
}

/// Errors that can occur while pulling or reshaping a dataset.
#[derive(thiserror::Error, Debug)]
pub enum StatError {
    #[error("HTML error: {status} ({url})")]
    Lookup { status: u16, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StatError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        StatError::Shape(msg.into())
    }
}

/// Convenience result type.
pub type StatResult<T> = Result<T, StatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_promotes_to_list() {
        let mut params = QueryParams::new();
        params.push("geo", "DE");
        params.push("geo", "FR");
        params.push("geo", "IT");
        assert_eq!(
            params.get("geo"),
            Some(&ParamValue::Many(vec![
                "DE".to_string(),
                "FR".to_string(),
                "IT".to_string()
            ]))
        );
    }

    #[test]
    fn test_pairs_repeat_list_keys() {
        let params = QueryParams::new()
            .with("format", "JSON")
            .with("time", vec!["2018", "2019"]);
        assert_eq!(
            params.to_pairs(),
            vec![
                ("format".to_string(), "JSON".to_string()),
                ("time".to_string(), "2018".to_string()),
                ("time".to_string(), "2019".to_string()),
            ]
        );
    }

    #[test]
    fn test_insert_replaces() {
        let params = QueryParams::new().with("freq", "A").with("freq", "Q");
        assert_eq!(params.to_pairs().len(), 1);
        assert_eq!(params.get("freq"), Some(&ParamValue::One("Q".to_string())));
    }

    #[test]
    fn test_lookup_error_message() {
        let err = StatError::Lookup {
            status: 404,
            url: "https://example.com/x".to_string(),
        };
        assert_eq!(err.to_string(), "HTML error: 404 (https://example.com/x)");
    }
}
