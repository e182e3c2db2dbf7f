//! The ordered parameter map handed to handlers.

use serde_json::Value;
use std::iter::FromIterator;

/// Request parameters gathered from the path, query string and body.
///
/// Entries keep their insertion order. Path parameters are inserted as strings;
/// validation replaces them with values of the declared type.
///
/// ```rust
/// use httpdispatch::Params;
///
/// let mut params = Params::new();
/// params.insert("user", "alice");
/// assert_eq!(params.get_str("user"), Some("alice"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The value for `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether `key` is missing, null or an empty string.
    pub fn is_blank(&self, key: &str) -> bool {
        is_blank(self.get(key))
    }

    /// Inserts a value, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Inserts a value only if the key is not present yet.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.entries.push((key, value.into()));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts the parameters into a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.iter().cloned().collect())
    }
}

pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl IntoIterator for Params {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_replaces_in_place() {
        let mut params = Params::new();
        params.insert("a", 1);
        params.insert("b", 2);
        assert_eq!(params.insert("a", 3), Some(json!(1)));

        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(params.get("a"), Some(&json!(3)));
    }

    #[test]
    fn insert_if_absent_keeps_existing() {
        let mut params = Params::new();
        params.insert("name", "path");
        params.insert_if_absent("name", "query");
        params.insert_if_absent("page", "2");
        assert_eq!(params.get_str("name"), Some("path"));
        assert_eq!(params.get_str("page"), Some("2"));
    }

    #[test]
    fn blank_values() {
        let params: Params = vec![("empty", json!("")), ("null", Value::Null), ("zero", json!(0))]
            .into_iter()
            .collect();
        assert!(params.is_blank("empty"));
        assert!(params.is_blank("null"));
        assert!(params.is_blank("missing"));
        assert!(!params.is_blank("zero"));
    }

    #[test]
    fn converts_to_json() {
        let mut params = Params::new();
        params.insert("name", "alice");
        assert_eq!(params.to_json(), json!({"name": "alice"}));
    }
}
