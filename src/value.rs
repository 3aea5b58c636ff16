//! In-memory model of a PHP array configuration.
//!
//! [`ConfigMap`] keeps keys in the order they were read; inserting an existing
//! key replaces its value in place, inserting a new key appends it. Nested
//! arrays are either a [`ConfigValue::Sequence`] (keys exactly `0..n`) or a
//! [`ConfigValue::Map`].

use indexmap::IndexMap;
use serde::Serialize;

/// A number literal. Integers and floats stay distinct so that `1` and `1.0`
/// survive a round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// One configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Bool(bool),
    Null,
    Number(Number),
    Sequence(Vec<ConfigValue>),
    Map(ConfigMap),
}

impl ConfigValue {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Null => "null",
            ConfigValue::Number(Number::Int(_)) => "int",
            ConfigValue::Number(Number::Float(_)) => "float",
            ConfigValue::Sequence(_) | ConfigValue::Map(_) => "array",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Number(Number::Int(i))
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Number(Number::Float(f))
    }
}

impl<V: Into<ConfigValue>> From<Option<V>> for ConfigValue {
    fn from(v: Option<V>) -> Self {
        v.map_or(ConfigValue::Null, Into::into)
    }
}

/// Ordered string-keyed mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigMap {
    entries: IndexMap<String, ConfigValue>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Set `key` to `value`, returning the previous value.
    ///
    /// An existing key keeps its position; a new key is appended.
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) -> Option<ConfigValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, ConfigValue)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, ConfigValue)>>(iter: I) -> Self {
        let mut map = ConfigMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for ConfigMap {
    type Item = (String, ConfigValue);
    type IntoIter = indexmap::map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_existing_key_keeps_position() {
        let mut map: ConfigMap = [
            ("a", ConfigValue::from(1i64)),
            ("b", ConfigValue::from(2i64)),
            ("c", ConfigValue::from(3i64)),
        ]
        .into_iter()
        .collect();
        let old = map.insert("b", "two".into());
        assert_eq!(old, Some(ConfigValue::from(2i64)));
        assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(map.get("b"), Some(&ConfigValue::from("two")));
    }

    #[test]
    fn insert_new_key_appends() {
        let mut map: ConfigMap = [("a", ConfigValue::Bool(true))].into_iter().collect();
        map.insert("z", ConfigValue::Null);
        assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "z"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(ConfigValue::from(None::<&str>), ConfigValue::Null);
        assert_eq!(ConfigValue::from(Some("x")), ConfigValue::from("x"));
    }

    #[test]
    fn serializes_in_insertion_order() {
        let nested: ConfigMap = [("host", ConfigValue::from("db"))].into_iter().collect();
        let map: ConfigMap = [
            ("zeta", ConfigValue::Null),
            ("alpha", ConfigValue::from(1.5f64)),
            (
                "list",
                ConfigValue::Sequence(vec![ConfigValue::from(1i64), ConfigValue::Bool(false)]),
            ),
            ("db", ConfigValue::Map(nested)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"zeta":null,"alpha":1.5,"list":[1,false],"db":{"host":"db"}}"#
        );
    }

    #[test]
    fn type_names() {
        assert_eq!(ConfigValue::from(1i64).type_name(), "int");
        assert_eq!(ConfigValue::from(1.0f64).type_name(), "float");
        assert_eq!(ConfigValue::Sequence(vec![]).type_name(), "array");
    }
}
