//! Documents exchanged with the locator's RPC interface
//!
//! [`Document`] is the loosely typed body of one RPC query or response.
//! [`ConfigDocument`] is the locator's flat configuration store: dotted keys
//! mapped to typed [`ConfigValue`]s.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Query or response body of one RPC call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Builder form of [`Document::set`]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Wrap a JSON object; any other JSON value is rejected
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::Config(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

/// One typed config value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl ConfigValue {
    /// Convert a JSON value received from the locator
    ///
    /// Arrays take their element type from the first element; an empty array
    /// becomes an empty string array.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(ConfigValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(ConfigValue::Int(i)),
                None => n.as_f64().map(ConfigValue::Double),
            },
            Value::String(s) => Some(ConfigValue::String(s.clone())),
            Value::Array(items) => Self::array_from_json(items),
            Value::Null | Value::Object(_) => None,
        }
    }

    fn array_from_json(items: &[Value]) -> Option<Self> {
        match items.first() {
            None => Some(ConfigValue::StringArray(Vec::new())),
            Some(Value::Bool(_)) => items
                .iter()
                .map(Value::as_bool)
                .collect::<Option<Vec<_>>>()
                .map(ConfigValue::BoolArray),
            Some(Value::Number(n)) if n.is_i64() => items
                .iter()
                .map(Value::as_i64)
                .collect::<Option<Vec<_>>>()
                .map(ConfigValue::IntArray),
            Some(Value::Number(_)) => items
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<_>>>()
                .map(ConfigValue::DoubleArray),
            Some(Value::String(_)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(ConfigValue::StringArray),
            Some(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Bool(b) => Value::from(*b),
            ConfigValue::Int(i) => Value::from(*i),
            ConfigValue::Double(d) => Value::from(*d),
            ConfigValue::String(s) => Value::from(s.as_str()),
            ConfigValue::BoolArray(v) => Value::from(v.clone()),
            ConfigValue::IntArray(v) => Value::from(v.clone()),
            ConfigValue::DoubleArray(v) => Value::from(v.clone()),
            ConfigValue::StringArray(v) => Value::from(v.clone()),
        }
    }

    /// Convert a value from the bridge's TOML configuration
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::Boolean(b) => Some(ConfigValue::Bool(*b)),
            toml::Value::Integer(i) => Some(ConfigValue::Int(*i)),
            toml::Value::Float(f) => Some(ConfigValue::Double(*f)),
            toml::Value::String(s) => Some(ConfigValue::String(s.clone())),
            toml::Value::Array(items) => match items.first() {
                None => Some(ConfigValue::StringArray(Vec::new())),
                Some(toml::Value::Boolean(_)) => items
                    .iter()
                    .map(toml::Value::as_bool)
                    .collect::<Option<Vec<_>>>()
                    .map(ConfigValue::BoolArray),
                Some(toml::Value::Integer(_)) => items
                    .iter()
                    .map(toml::Value::as_integer)
                    .collect::<Option<Vec<_>>>()
                    .map(ConfigValue::IntArray),
                Some(toml::Value::Float(_)) => items
                    .iter()
                    .map(toml::Value::as_float)
                    .collect::<Option<Vec<_>>>()
                    .map(ConfigValue::DoubleArray),
                Some(toml::Value::String(_)) => items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .map(ConfigValue::StringArray),
                Some(_) => None,
            },
            toml::Value::Datetime(_) | toml::Value::Table(_) => None,
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Double(d) => write!(f, "{}", d),
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::BoolArray(v) => write_list(f, v),
            ConfigValue::IntArray(v) => write_list(f, v),
            ConfigValue::DoubleArray(v) => write_list(f, v),
            ConfigValue::StringArray(v) => write_list(f, v),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

impl From<f64> for ConfigValue {
    fn from(d: f64) -> Self {
        ConfigValue::Double(d)
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

/// Locator configuration keyed by dotted entry name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) -> &mut Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Display string of an entry, empty if the key is absent
    pub fn display(&self, key: &str) -> String {
        self.get(key).map(ToString::to_string).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.entries.iter()
    }

    /// Overwrite entries with those of `overrides`
    pub fn merge(&mut self, overrides: &ConfigDocument) {
        for (key, value) in overrides.iter() {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Parse the `[{key, value}]` list used by `configList`
    ///
    /// Entries whose value has no config representation are skipped with a
    /// warning.
    pub fn from_entries(entries: &[Value]) -> Result<Self> {
        let mut doc = Self::new();
        for entry in entries {
            let key = entry
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Config(format!("config entry without key: {}", entry)))?;
            match entry.get("value").and_then(ConfigValue::from_json) {
                Some(value) => {
                    doc.entries.insert(key.to_string(), value);
                }
                None => log::warn!("Skipping config entry '{}' with unsupported value", key),
            }
        }
        Ok(doc)
    }

    /// Build the `[{key, value}]` list used by `configSet`
    pub fn to_entries(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|(key, value)| serde_json::json!({ "key": key, "value": value.to_json() }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_fields() {
        let doc = Document::new()
            .with("sessionId", "abc")
            .with("responseCode", 0);
        assert!(doc.has("sessionId"));
        assert_eq!(doc.get_str("sessionId"), Some("abc"));
        assert_eq!(doc.get_i64("responseCode"), Some(0));
        assert!(!doc.has("clientMapNames"));
    }

    #[test]
    fn test_document_rejects_non_object() {
        assert!(Document::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(ConfigValue::from_json(&json!(true)), Some(ConfigValue::Bool(true)));
        assert_eq!(ConfigValue::from_json(&json!(3)), Some(ConfigValue::Int(3)));
        assert_eq!(ConfigValue::from_json(&json!(0.5)), Some(ConfigValue::Double(0.5)));
        assert_eq!(
            ConfigValue::from_json(&json!([1.5, 2])),
            Some(ConfigValue::DoubleArray(vec![1.5, 2.0]))
        );
        assert_eq!(
            ConfigValue::from_json(&json!(["a", "b"])),
            Some(ConfigValue::StringArray(vec!["a".into(), "b".into()]))
        );
        // Mixed arrays are not representable
        assert_eq!(ConfigValue::from_json(&json!([true, "x"])), None);
        assert_eq!(ConfigValue::from_json(&Value::Null), None);
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(ConfigValue::Bool(true).to_string(), "true");
        assert_eq!(ConfigValue::Int(-4).to_string(), "-4");
        assert_eq!(ConfigValue::from("simple").to_string(), "simple");
        assert_eq!(ConfigValue::IntArray(vec![1, 2, 3]).to_string(), "[1, 2, 3]");
    }

    #[test]
    fn test_entries_roundtrip() {
        let entries = vec![
            json!({"key": "ClientSensor.laser.type", "value": "simple"}),
            json!({"key": "ClientSensor.enableOdometry", "value": true}),
            json!({"key": "ClientSensor.laser.angleMin", "value": -2.0}),
        ];
        let doc = ConfigDocument::from_entries(&entries).unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.display("ClientSensor.enableOdometry"), "true");
        assert_eq!(doc.display("missing.key"), "");

        let back = ConfigDocument::from_entries(&doc.to_entries()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_entry_without_key_is_error() {
        assert!(ConfigDocument::from_entries(&[json!({"value": 1})]).is_err());
    }

    #[test]
    fn test_merge_overrides() {
        let mut doc = ConfigDocument::new();
        doc.set("a", 1i64).set("b", "x");
        let mut overrides = ConfigDocument::new();
        overrides.set("b", "y").set("c", true);
        doc.merge(&overrides);
        assert_eq!(doc.get("a"), Some(&ConfigValue::Int(1)));
        assert_eq!(doc.display("b"), "y");
        assert_eq!(doc.get("c"), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn test_value_from_toml() {
        let table: toml::Table = toml::from_str(
            r#"
            flag = true
            count = 3
            ratio = 0.25
            name = "simple"
            list = ["a", "b"]
            "#,
        )
        .unwrap();
        assert_eq!(ConfigValue::from_toml(&table["flag"]), Some(ConfigValue::Bool(true)));
        assert_eq!(ConfigValue::from_toml(&table["count"]), Some(ConfigValue::Int(3)));
        assert_eq!(ConfigValue::from_toml(&table["ratio"]), Some(ConfigValue::Double(0.25)));
        assert_eq!(ConfigValue::from_toml(&table["name"]), Some(ConfigValue::from("simple")));
        assert_eq!(
            ConfigValue::from_toml(&table["list"]),
            Some(ConfigValue::StringArray(vec!["a".into(), "b".into()]))
        );
    }
}
