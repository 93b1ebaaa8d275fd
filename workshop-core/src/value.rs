//! Loosely-typed configuration values read from recipe documents.
//!
//! Recipes declare keys whose shape depends on the output format, so values
//! are kept as a tagged union. Accessors never panic: they return `None` for
//! absence and a [`ConfigError`] for a wrong shape, leaving the call site to
//! choose between skipping and propagating.

use std::fmt;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// ConfigValue
// ---------------------------------------------------------------------------

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigValue>),
    Mapping(ConfigMap),
}

impl ConfigValue {
    /// Human-readable name of the variant, used in violation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "a boolean",
            ConfigValue::Integer(_) | ConfigValue::Float(_) => "a number",
            ConfigValue::String(_) => "a string",
            ConfigValue::Sequence(_) => "a sequence",
            ConfigValue::Mapping(_) => "a mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar rendered as text (`name: 42` still names a recipe).
    /// Null, sequences and mappings yield `None`.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Integer(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }

    /// Truthiness in the loose sense recipe authors expect: `false`, null,
    /// zero and empty containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            ConfigValue::Null => false,
            ConfigValue::Bool(b) => *b,
            ConfigValue::Integer(i) => *i != 0,
            ConfigValue::Float(f) => *f != 0.0,
            ConfigValue::String(s) => !s.is_empty(),
            ConfigValue::Sequence(s) => !s.is_empty(),
            ConfigValue::Mapping(m) => !m.is_empty(),
        }
    }

    /// Convert to a JSON value, preserving mapping key order.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::Integer(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::String(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Mapping(map) => serde_json::Value::Object(map.to_json_object()),
        }
    }

    /// Convert to a YAML value, preserving mapping key order.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            ConfigValue::Null => serde_yaml::Value::Null,
            ConfigValue::Bool(b) => serde_yaml::Value::Bool(*b),
            ConfigValue::Integer(i) => serde_yaml::Value::Number((*i).into()),
            ConfigValue::Float(f) => serde_yaml::Value::Number((*f).into()),
            ConfigValue::String(s) => serde_yaml::Value::String(s.clone()),
            ConfigValue::Sequence(items) => {
                serde_yaml::Value::Sequence(items.iter().map(ConfigValue::to_yaml).collect())
            }
            ConfigValue::Mapping(map) => serde_yaml::Value::Mapping(map.to_yaml_mapping()),
        }
    }
}

impl From<serde_yaml::Value> for ConfigValue {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_yaml::Value::String(s) => ConfigValue::String(s),
            serde_yaml::Value::Sequence(items) => {
                ConfigValue::Sequence(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_yaml::Value::Mapping(map) => ConfigValue::Mapping(ConfigMap::from(map)),
            serde_yaml::Value::Tagged(tagged) => ConfigValue::from(tagged.value),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_owned())
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
        ConfigValue::Integer(i)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(m: ConfigMap) -> Self {
        ConfigValue::Mapping(m)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_scalar_string() {
            Some(s) => f.write_str(&s),
            None => f.write_str(self.kind()),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigMap
// ---------------------------------------------------------------------------

/// An insertion-ordered string-keyed mapping.
///
/// Keys are unique; [`ConfigMap::insert`] replaces in place so declaration
/// order survives overlays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigValue)>,
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
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Insert or replace, keeping the original position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`ConfigMap::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert only when `key` is absent.
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.entries.push((key, value.into()));
        }
    }

    /// A new map holding `self` with every key of `other` laid on top.
    pub fn overlay(&self, other: &ConfigMap) -> ConfigMap {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged.insert(k, v.clone());
        }
        merged
    }

    /// A new map holding only the listed keys that are present, in `keys` order.
    pub fn extract(&self, keys: &[&str]) -> ConfigMap {
        let mut out = ConfigMap::new();
        for key in keys {
            if let Some(v) = self.get(key) {
                out.insert(*key, v.clone());
            }
        }
        out
    }

    /// String value for `key`; a non-string value is treated as absent.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    /// Non-empty scalar rendered as text.
    pub fn get_scalar(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(ConfigValue::to_scalar_string)
            .filter(|s| !s.is_empty())
    }

    /// Loose boolean flag; absent means `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map(ConfigValue::is_truthy).unwrap_or(false)
    }

    /// Required string value.
    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        match self.get(key) {
            None | Some(ConfigValue::Null) => Err(ConfigError::Missing { key: key.to_owned() }),
            Some(ConfigValue::String(s)) => Ok(s),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    /// Optional mapping value; a present non-mapping is a violation.
    pub fn mapping(&self, key: &str) -> Result<Option<&ConfigMap>, ConfigError> {
        match self.get(key) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(ConfigValue::Mapping(m)) => Ok(Some(m)),
            Some(other) => Err(wrong_type(key, "a mapping", other)),
        }
    }

    /// Optional sequence value; a present non-sequence is a violation.
    pub fn sequence(&self, key: &str) -> Result<Option<&[ConfigValue]>, ConfigError> {
        match self.get(key) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(ConfigValue::Sequence(s)) => Ok(Some(s)),
            Some(other) => Err(wrong_type(key, "a sequence", other)),
        }
    }

    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    pub fn to_yaml_mapping(&self) -> serde_yaml::Mapping {
        self.entries
            .iter()
            .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.to_yaml()))
            .collect()
    }
}

impl From<serde_yaml::Mapping> for ConfigMap {
    fn from(map: serde_yaml::Mapping) -> Self {
        let mut out = ConfigMap::new();
        for (k, v) in map {
            let key = match k {
                serde_yaml::Value::String(s) => s,
                other => match ConfigValue::from(other).to_scalar_string() {
                    Some(s) => s,
                    // Non-scalar keys cannot be addressed by name.
                    None => continue,
                },
            };
            out.insert(key, ConfigValue::from(v));
        }
        out
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = ConfigMap::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &ConfigValue) -> ConfigError {
    ConfigError::WrongType {
        key: key.to_owned(),
        expected,
        found: found.kind(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml_map(src: &str) -> ConfigMap {
        let v: serde_yaml::Value = serde_yaml::from_str(src).expect("yaml");
        match ConfigValue::from(v) {
            ConfigValue::Mapping(m) => m,
            other => panic!("expected mapping, got {}", other.kind()),
        }
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut m = ConfigMap::new().with("a", "1").with("b", "2");
        m.insert("a", "3");
        let keys: Vec<_> = m.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(m.get_str("a"), Some("3"));
    }

    #[test]
    fn overlay_prefers_right_hand_keys() {
        let base = ConfigMap::new().with("name", "base").with("output_format", "skill");
        let raw = ConfigMap::new().with("name", "own").with("extra", true);
        let merged = base.overlay(&raw);
        assert_eq!(merged.get_str("name"), Some("own"));
        assert_eq!(merged.get_str("output_format"), Some("skill"));
        assert!(merged.flag("extra"));
        assert_eq!(base.get_str("name"), Some("base"), "overlay must not mutate");
    }

    #[test]
    fn accessors_report_wrong_shapes() {
        let m = yaml_map("sources: hello\nname: [a]\n");
        assert!(matches!(
            m.sequence("sources"),
            Err(ConfigError::WrongType { expected: "a sequence", .. })
        ));
        assert!(matches!(m.require_str("name"), Err(ConfigError::WrongType { .. })));
        assert!(matches!(m.require_str("nope"), Err(ConfigError::Missing { .. })));
        assert_eq!(m.mapping("nope").expect("absent is fine"), None);
    }

    #[test]
    fn scalar_names_are_rendered_as_text() {
        let m = yaml_map("name: 42\nflag: yes_please\n");
        assert_eq!(m.get_scalar("name").as_deref(), Some("42"));
        assert_eq!(m.get_str("name"), None);
    }

    #[test]
    fn json_conversion_keeps_key_order() {
        let m = yaml_map("zeta: 1\nalpha: {nested: true}\nmid: [x, 2]\n");
        let json = serde_json::to_string(&ConfigValue::Mapping(m).to_json()).expect("json");
        assert_eq!(json, r#"{"zeta":1,"alpha":{"nested":true},"mid":["x",2]}"#);
    }

    #[test]
    fn truthiness_follows_loose_rules() {
        assert!(!ConfigValue::Null.is_truthy());
        assert!(!ConfigValue::from("").is_truthy());
        assert!(ConfigValue::from("x").is_truthy());
        assert!(!ConfigValue::Integer(0).is_truthy());
        assert!(ConfigValue::Bool(true).is_truthy());
    }
}
