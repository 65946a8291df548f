//! Query objects and their normalized identity.
//!
//! A [`Query`] is an order-insensitive bag of filter fields. Everything
//! downstream (storage keys, callback tables, request paths) is partitioned by
//! its normalized serialization, never by structural comparison.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Path of the remote collection endpoint, relative to an endpoint base URL.
pub const REQUEST_PATH: &str = "/request";

/// Field that carries the request intent (`collectionset`, a count marker, `ping`, ...).
pub const INTENT_FIELD: &str = "query";

/// A set of filter fields sent to the remote collection.
///
/// # Example
///
/// ```
/// use pagelist_lib::Query;
///
/// let a = Query::new().with("searchstring", "rust").with("startdate", 1990);
/// let b = Query::new().with("startdate", 1990).with("searchstring", "rust");
/// assert_eq!(a.normalized(), b.normalized());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    fields: BTreeMap<String, Value>,
}

impl Query {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this query with `field` set to `value`.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Sets `field` to `value`, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns the value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns `true` if the query has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Key-sorted JSON serialization; the identity of this query.
    pub fn normalized(&self) -> String {
        // BTreeMap keys serialize in order, and serde_json's own object map is
        // ordered too, so nested objects are normalized as well.
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    /// Returns `true` if both queries normalize to the same string.
    pub fn same_as(&self, other: &Query) -> bool {
        self.normalized() == other.normalized()
    }

    /// Flattens the query into `key=value` pairs for a query string.
    ///
    /// Strings are sent verbatim, arrays are comma-joined, nested objects are
    /// sent as JSON and `null` as the literal `null`.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), flatten_value(v)))
            .collect()
    }

    /// Builds the request path (`/request?...`) for this query.
    pub fn request_path(&self) -> String {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_pairs())
            .finish();
        format!("{}?{}", REQUEST_PATH, encoded)
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Query {}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
