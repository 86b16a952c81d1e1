//! Property storage.
//!
//! A property is a named [`PropertyValue`]: a string, a boolean or an array
//! of values.  Keys written as `name[]` append to the array stored under
//! `name`, keys written as `name[idx]` set the associative entry `idx`.
//!
//! [`PropertySet`] is the abstraction shared by the plain store
//! ([`PropertySetImpl`]) and the expanding decorator
//! ([`PropertyExpansionWrapper`](crate::expansion::PropertyExpansionWrapper)).

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{BuildError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
//  PropertyValue
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Str(String),
    /// Kept as a native boolean until rendered (`"true"` / `"false"`).
    Bool(bool),
    /// Ordered associative array; `name[]` appends under integer keys.
    Array(IndexMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&IndexMap<String, PropertyValue>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Build an array value from a list, indexed `0..n`.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropertyValue>,
    {
        Self::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Array(items) => {
                for (i, v) in items.values().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  PropertySet
// ═══════════════════════════════════════════════════════════════════════════════

/// A key → value store understanding the `name[]` / `name[idx]` key forms.
pub trait PropertySet {
    /// Look up a value.  `name[idx]` returns a single array element.
    fn get(&self, key: &str) -> Result<Option<PropertyValue>>;

    /// Store a value.  Fails on an empty key.
    fn set(&mut self, key: &str, value: PropertyValue) -> Result<()>;

    fn contains(&self, key: &str) -> bool;

    fn remove(&mut self, key: &str) -> Option<PropertyValue>;

    /// Keys in insertion order.
    fn keys(&self) -> Vec<String>;

    /// Entries whose key starts with `prefix.`, re-keyed without the prefix.
    fn prefix(&self, prefix: &str) -> Result<PropertySetImpl>;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `name[idx]` → (`name`, `idx`); `name[]` → (`name`, ``).
static ARRAY_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\[([^\[\]]*)\]$").expect("static regex"));

fn split_array_key(key: &str) -> Option<(&str, &str)> {
    let caps = ARRAY_KEY.captures(key)?;
    let name = caps.get(1)?.as_str();
    let index = caps.get(2).map_or("", |m| m.as_str());
    Some((name, index))
}

fn require_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(BuildError::new("Property key must not be empty"));
    }
    Ok(())
}

// ─── PropertySetImpl ─────────────────────────────────────────────────────────

/// The concrete, insertion-ordered property store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySetImpl {
    properties: IndexMap<String, PropertyValue>,
}

impl PropertySetImpl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a stored value without the array-key lookup.
    pub fn raw(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.properties.iter()
    }

    /// Copy every entry of `other` into this set, overwriting existing keys.
    pub fn extend_from(&mut self, other: &PropertySetImpl) {
        for (k, v) in other.iter() {
            self.properties.insert(k.clone(), v.clone());
        }
    }
}

/// Plain `key → value` entries; keys are stored as given.
impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for PropertySetImpl {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { properties: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Next integer index for an append: one past the largest integer key.
fn next_index(items: &IndexMap<String, PropertyValue>) -> String {
    items
        .keys()
        .filter_map(|k| k.parse::<i64>().ok())
        .max()
        .map_or(0, |max| max + 1)
        .to_string()
}

impl PropertySet for PropertySetImpl {
    fn get(&self, key: &str) -> Result<Option<PropertyValue>> {
        require_key(key)?;
        if let Some(v) = self.properties.get(key) {
            return Ok(Some(v.clone()));
        }
        let Some((name, index)) = split_array_key(key) else {
            return Ok(None);
        };
        match self.properties.get(name) {
            Some(PropertyValue::Array(items)) if !index.is_empty() => Ok(items.get(index).cloned()),
            Some(array @ PropertyValue::Array(_)) => Ok(Some(array.clone())),
            _ => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: PropertyValue) -> Result<()> {
        require_key(key)?;
        let Some((name, index)) = split_array_key(key) else {
            self.properties.insert(key.to_string(), value);
            return Ok(());
        };

        let slot = self
            .properties
            .entry(name.to_string())
            .or_insert_with(|| PropertyValue::Array(IndexMap::new()));
        if !matches!(slot, PropertyValue::Array(_)) {
            *slot = PropertyValue::Array(IndexMap::new());
        }
        if let PropertyValue::Array(items) = slot {
            let index = if index.is_empty() { next_index(items) } else { index.to_string() };
            items.insert(index, value);
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }

    fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        if let Some(v) = self.properties.shift_remove(key) {
            return Some(v);
        }
        let (name, index) = split_array_key(key)?;
        match self.properties.get_mut(name) {
            Some(PropertyValue::Array(items)) => items.shift_remove(index),
            _ => None,
        }
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn prefix(&self, prefix: &str) -> Result<PropertySetImpl> {
        let prefix = if prefix.ends_with('.') { prefix.to_string() } else { format!("{prefix}.") };
        let mut scoped = PropertySetImpl::new();
        for (key, value) in &self.properties {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if !rest.is_empty() {
                    scoped.properties.insert(rest.to_string(), value.clone());
                }
            }
        }
        Ok(scoped)
    }

    fn len(&self) -> usize {
        self.properties.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> PropertyValue {
        PropertyValue::from(v)
    }

    #[test]
    fn plain_keys_round_trip() {
        let mut props = PropertySetImpl::new();
        props.set("a", s("1")).unwrap();
        props.set("b", true.into()).unwrap();
        assert_eq!(props.get("a").unwrap(), Some(s("1")));
        assert_eq!(props.get("b").unwrap(), Some(PropertyValue::Bool(true)));
        assert_eq!(props.get("missing").unwrap(), None);
        assert_eq!(props.keys(), vec!["a", "b"]);
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut props = PropertySetImpl::new();
        assert!(props.set("", s("x")).is_err());
        assert!(props.get("").is_err());
    }

    #[test]
    fn append_keys_accumulate_in_order() {
        let mut props = PropertySetImpl::new();
        props.set("list[]", s("x")).unwrap();
        props.set("list[]", s("y")).unwrap();
        props.set("list[]", s("z")).unwrap();

        let list = props.get("list").unwrap().unwrap();
        assert_eq!(list, PropertyValue::list(["x", "y", "z"]));
        assert_eq!(list.to_string(), "x,y,z");
        assert_eq!(props.get("list[1]").unwrap(), Some(s("y")));
    }

    #[test]
    fn indexed_keys_are_associative() {
        let mut props = PropertySetImpl::new();
        props.set("map[one]", s("1")).unwrap();
        props.set("map[two]", s("2")).unwrap();
        props.set("map[one]", s("uno")).unwrap();
        props.set("map[]", s("appended")).unwrap();

        let map = props.get("map").unwrap().unwrap();
        let items = map.as_array().unwrap();
        assert_eq!(items.keys().collect::<Vec<_>>(), vec!["one", "two", "0"]);
        assert_eq!(props.get("map[one]").unwrap(), Some(s("uno")));
    }

    #[test]
    fn append_follows_the_largest_integer_index() {
        let mut props = PropertySetImpl::new();
        props.set("a[5]", s("five")).unwrap();
        props.set("a[]", s("six")).unwrap();
        assert_eq!(props.get("a[6]").unwrap(), Some(s("six")));
    }

    #[test]
    fn bracket_write_replaces_a_scalar() {
        let mut props = PropertySetImpl::new();
        props.set("a", s("scalar")).unwrap();
        props.set("a[]", s("item")).unwrap();
        assert_eq!(props.get("a").unwrap(), Some(PropertyValue::list(["item"])));
    }

    #[test]
    fn remove_handles_plain_and_indexed_keys() {
        let mut props = PropertySetImpl::new();
        props.set("a", s("1")).unwrap();
        props.set("b[x]", s("2")).unwrap();
        props.set("b[y]", s("3")).unwrap();

        assert_eq!(props.remove("a"), Some(s("1")));
        assert_eq!(props.remove("b[x]"), Some(s("2")));
        assert!(!props.contains("a"));
        assert!(props.contains("b[y]"));
        assert!(!props.contains("b[x]"));
    }

    #[test]
    fn prefix_scopes_dotted_namespace() {
        let mut props = PropertySetImpl::new();
        props.set("db.host", s("localhost")).unwrap();
        props.set("db.port", s("5432")).unwrap();
        props.set("dbx.other", s("no")).unwrap();
        props.set("app.name", s("demo")).unwrap();

        let db = props.prefix("db").unwrap();
        assert_eq!(db.keys(), vec!["host", "port"]);
        assert_eq!(db.get("host").unwrap(), Some(s("localhost")));

        // A trailing dot is accepted as well.
        assert_eq!(props.prefix("db.").unwrap(), db);
    }

    #[test]
    fn display_renders_booleans_and_arrays() {
        assert_eq!(PropertyValue::Bool(false).to_string(), "false");
        let nested = PropertyValue::list([PropertyValue::from("a"), PropertyValue::Bool(true)]);
        assert_eq!(nested.to_string(), "a,true");
    }
}
