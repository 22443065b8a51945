//! Named parameter bags consulted during evaluation.
//!
//! A [`Parameters`] implementation maps unique keys to [`serde_json::Value`]s.
//! [`MapParameters`] is the default backing store and keeps keys in insertion
//! order.
//!
//! # Example
//!
//! ```ignore
//! use dynsql::{params, Parameters};
//!
//! let p = params! { "table" => "gc_image", "id" => 1 };
//! assert!(p.exist("table"));
//! assert_eq!(p.keys(), vec!["table", "id"]);
//! ```

use crate::error::{DynSqlError, DynSqlResult};
use serde::Serialize;
use serde_json::{Map, Value};

/// A named value bag.
pub trait Parameters: Send + Sync {
    /// Look up a value by key.
    fn get(&self, key: &str) -> Option<&Value>;

    /// Whether the key is present (a `null` value still counts as present).
    fn exist(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All keys, in insertion order.
    fn keys(&self) -> Vec<&str>;
}

/// Map-backed [`Parameters`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapParameters(Map<String, Value>);

impl MapParameters {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Chainable insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Build a bag from any serializable record.
    ///
    /// The record must serialize to a JSON object; its fields become keys.
    pub fn from_serialize<T: Serialize + ?Sized>(record: &T) -> DynSqlResult<Self> {
        let value =
            serde_json::to_value(record).map_err(|e| DynSqlError::Serialization(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DynSqlError::Serialization(format!(
                "expected a record, got {}",
                kind_name(&other)
            ))),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl Parameters for MapParameters {
    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn exist(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

impl From<Map<String, Value>> for MapParameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for MapParameters
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Merge two bags into a new one; keys of `overrides` win.
///
/// Neither input is modified.
pub fn merge_parameters(base: &dyn Parameters, overrides: &dyn Parameters) -> MapParameters {
    let mut merged = MapParameters::new();
    for bag in [base, overrides] {
        for key in bag.keys() {
            if let Some(value) = bag.get(key) {
                merged.insert(key, value.clone());
            }
        }
    }
    merged
}

/// Render a value for verbatim `${}` substitution.
///
/// Strings are used as-is, `null` becomes `NULL`, arrays are joined with
/// `", "` and objects are written as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build a [`MapParameters`] from `key => value` pairs.
///
/// ```ignore
/// let p = dynsql::params! { "state" => 1, "title" => "'%x%'" };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::MapParameters::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut p = $crate::MapParameters::new();
        $(p.insert($key, $crate::__private::serde_json::json!($value));)+
        p
    }};
}
