//! `${name}` placeholder expansion.
//!
//! [`PropertyExpansion`] substitutes every `${name}` reference in a string
//! with the (recursively expanded) value of the property `name`, repeating
//! until the string stops changing.  Unknown references stay in the text
//! verbatim; a reference chain that leads back to a property already being
//! expanded is reported as [`BuildError::CircularProperty`].
//!
//! [`PropertyExpansionWrapper`] decorates a [`PropertySet`] so that reads go
//! through the expansion while writes and key enumeration do not.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BuildError, Result};
use crate::properties::{PropertySet, PropertySetImpl, PropertyValue};

static PROPERTY_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^\$}]+)\}").expect("static regex"));

// ═══════════════════════════════════════════════════════════════════════════════
//  PropertyExpansion
// ═══════════════════════════════════════════════════════════════════════════════

pub struct PropertyExpansion<'a, S: PropertySet + ?Sized> {
    properties: &'a S,
}

impl<'a, S: PropertySet + ?Sized> PropertyExpansion<'a, S> {
    pub fn new(properties: &'a S) -> Self {
        Self { properties }
    }

    /// Expand an optional value.  `None` stays `None`; arrays are expanded
    /// element by element, keeping their keys.
    pub fn expand(&self, value: Option<&PropertyValue>) -> Result<Option<PropertyValue>> {
        value.map(|v| self.expand_value(v)).transpose()
    }

    pub fn expand_value(&self, value: &PropertyValue) -> Result<PropertyValue> {
        let mut stack = Vec::new();
        self.expand_value_with(value, &mut stack)
    }

    /// Expand all `${…}` references in `value`.
    pub fn expand_str(&self, value: &str) -> Result<String> {
        let mut stack = Vec::new();
        self.expand_str_with(value, &mut stack)
    }

    fn expand_value_with(&self, value: &PropertyValue, stack: &mut Vec<String>) -> Result<PropertyValue> {
        match value {
            PropertyValue::Str(s) => Ok(PropertyValue::Str(self.expand_str_with(s, stack)?)),
            PropertyValue::Bool(b) => Ok(PropertyValue::Bool(*b)),
            PropertyValue::Array(items) => {
                let mut expanded = items.clone();
                for v in expanded.values_mut() {
                    *v = self.expand_value_with(v, stack)?;
                }
                Ok(PropertyValue::Array(expanded))
            }
        }
    }

    /// Fixed-point loop: one substitution pass per iteration until the text
    /// no longer changes.
    fn expand_str_with(&self, value: &str, stack: &mut Vec<String>) -> Result<String> {
        let mut current = value.to_string();
        loop {
            let next = self.substitute(&current, stack)?;
            if next == current {
                return Ok(next);
            }
            current = next;
        }
    }

    fn substitute(&self, text: &str, stack: &mut Vec<String>) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in PROPERTY_REF.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            out.push_str(&self.replacement(name.as_str(), whole.as_str(), stack)?);
            last = whole.end();
        }

        out.push_str(&text[last..]);
        Ok(out)
    }

    fn replacement(&self, name: &str, placeholder: &str, stack: &mut Vec<String>) -> Result<String> {
        let Some(value) = self.properties.get(name)? else {
            return Ok(placeholder.to_string());
        };

        match value {
            PropertyValue::Bool(b) => Ok(b.to_string()),
            array @ PropertyValue::Array(_) => Ok(array.to_string()),
            PropertyValue::Str(s) => {
                if stack.iter().any(|n| n == name) {
                    return Err(BuildError::CircularProperty {
                        name: name.to_string(),
                        chain: stack.clone(),
                    });
                }
                stack.push(name.to_string());
                let expanded = self.expand_str_with(&s, stack);
                stack.pop();
                expanded
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  PropertyExpansionWrapper
// ═══════════════════════════════════════════════════════════════════════════════

/// A [`PropertySet`] whose reads return expanded values.
#[derive(Debug, Clone, Default)]
pub struct PropertyExpansionWrapper<S: PropertySet> {
    inner: S,
}

impl<S: PropertySet> PropertyExpansionWrapper<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: PropertySet> PropertySet for PropertyExpansionWrapper<S> {
    fn get(&self, key: &str) -> Result<Option<PropertyValue>> {
        let raw = self.inner.get(key)?;
        PropertyExpansion::new(&self.inner).expand(raw.as_ref())
    }

    fn set(&mut self, key: &str, value: PropertyValue) -> Result<()> {
        self.inner.set(key, value)
    }

    fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    /// Scoped entries, expanded against the whole (unscoped) set.
    fn prefix(&self, prefix: &str) -> Result<PropertySetImpl> {
        let scoped = self.inner.prefix(prefix)?;
        let expansion = PropertyExpansion::new(&self.inner);
        let mut expanded = PropertySetImpl::new();
        for key in scoped.keys() {
            if let Some(value) = scoped.raw(&key) {
                expanded.set(&key, expansion.expand_value(value)?)?;
            }
        }
        Ok(expanded)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, PropertyValue)]) -> PropertySetImpl {
        let mut set = PropertySetImpl::new();
        for (k, v) in pairs {
            set.set(k, v.clone()).unwrap();
        }
        set
    }

    fn s(v: &str) -> PropertyValue {
        PropertyValue::from(v)
    }

    #[test]
    fn text_without_references_is_unchanged() {
        let set = props(&[("a", s("1"))]);
        let exp = PropertyExpansion::new(&set);
        for text in ["", "plain", "$ {a}", "${", "}", "$a", "first,second"] {
            assert_eq!(exp.expand_str(text).unwrap(), text);
        }
    }

    #[test]
    fn unknown_references_are_preserved() {
        let set = PropertySetImpl::new();
        let exp = PropertyExpansion::new(&set);
        assert_eq!(exp.expand_str("${n}").unwrap(), "${n}");
        assert_eq!(exp.expand_str("x${unknown}ref").unwrap(), "x${unknown}ref");
    }

    #[test]
    fn nested_references_resolve() {
        let set = props(&[("foo", s("foo")), ("test", s("${foo}bar"))]);
        let exp = PropertyExpansion::new(&set);
        assert_eq!(exp.expand_str("${test}").unwrap(), "foobar");
    }

    #[test]
    fn forward_references_resolve_transitively() {
        let set = props(&[("a", s("${b}-${c}")), ("b", s("${c}")), ("c", s("end"))]);
        let exp = PropertyExpansion::new(&set);
        assert_eq!(exp.expand_str("[${a}]").unwrap(), "[end-end]");
    }

    #[test]
    fn booleans_render_as_words() {
        let set = props(&[("t", true.into()), ("f", false.into())]);
        let exp = PropertyExpansion::new(&set);
        assert_eq!(exp.expand_str("${t}").unwrap(), "true");
        assert_eq!(exp.expand_str("${f}").unwrap(), "false");
    }

    #[test]
    fn arrays_render_comma_joined() {
        let set = props(&[("x", PropertyValue::list(["a", "b"]))]);
        let exp = PropertyExpansion::new(&set);
        assert_eq!(exp.expand_str("${x}").unwrap(), "a,b");
    }

    #[test]
    fn circular_definition_is_reported() {
        let set = props(&[("a", s("${b}")), ("b", s("${a}"))]);
        let exp = PropertyExpansion::new(&set);
        let err = exp.expand_str("${a}").unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, BuildError::CircularProperty { .. }));
        assert!(message.contains("circularly defined"), "{message}");
        assert!(message.contains('a') && message.contains('b'), "{message}");
    }

    #[test]
    fn self_reference_is_circular() {
        let set = props(&[("x", s("pre${x}"))]);
        let exp = PropertyExpansion::new(&set);
        assert!(exp.expand_str("${x}").is_err());
    }

    #[test]
    fn same_name_in_sibling_branches_is_fine() {
        let set = props(&[("a", s("${c}${c}")), ("c", s("z"))]);
        let exp = PropertyExpansion::new(&set);
        assert_eq!(exp.expand_str("${a}${c}").unwrap(), "zzz");
    }

    #[test]
    fn expand_maps_over_arrays_and_passes_none() {
        let set = props(&[("who", s("world"))]);
        let exp = PropertyExpansion::new(&set);
        assert_eq!(exp.expand(None).unwrap(), None);

        let list = PropertyValue::list(["hello ${who}", "${missing}"]);
        let expanded = exp.expand(Some(&list)).unwrap().unwrap();
        assert_eq!(expanded, PropertyValue::list(["hello world", "${missing}"]));
    }

    // ── Wrapper ──────────────────────────────────────────────────────────

    #[test]
    fn wrapper_expands_reads_only() {
        let mut wrapped = PropertyExpansionWrapper::new(props(&[("foo", s("foo"))]));
        wrapped.set("test", s("${foo}bar")).unwrap();

        assert_eq!(wrapped.get("test").unwrap(), Some(s("foobar")));
        assert_eq!(wrapped.inner().raw("test"), Some(&s("${foo}bar")));
        assert_eq!(wrapped.keys(), vec!["foo", "test"]);
        assert!(wrapped.contains("test"));
        assert_eq!(wrapped.get("nope").unwrap(), None);
    }

    #[test]
    fn wrapper_prefix_expands_against_the_full_set() {
        let wrapped = PropertyExpansionWrapper::new(props(&[
            ("root", s("/srv")),
            ("app.dir", s("${root}/app")),
        ]));
        let app = wrapped.prefix("app").unwrap();
        assert_eq!(app.get("dir").unwrap(), Some(s("/srv/app")));
    }

    #[test]
    fn wrapper_surfaces_cycles() {
        let wrapped = PropertyExpansionWrapper::new(props(&[("a", s("${b}")), ("b", s("${a}"))]));
        assert!(wrapped.get("a").is_err());
    }
}
