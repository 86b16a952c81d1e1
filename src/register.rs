//! Named value slots shared between tasks of one build.
//!
//! A build file can hand a *slot* to a task attribute by writing `%{key}`
//! as the whole attribute value.  The task keeps the [`SlotRef`] and reads
//! it when it runs, so whatever another task stored there in the meantime is
//! what it sees.  Slots are created on first lookup and live as long as the
//! owning [`Project`](crate::project::Project).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A value held in a slot: text or an arbitrarily nested list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue {
    Text(String),
    List(Vec<SlotValue>),
}

impl From<&str> for SlotValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SlotValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<SlotValue>> From<Vec<T>> for SlotValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Lists render brace-delimited: `{a,b,{c,d}}`.
impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSlot {
    key: String,
    value: Option<SlotValue>,
}

impl RegisterSlot {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), value: None }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&SlotValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: impl Into<SlotValue>) {
        self.value = Some(value.into());
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}

/// An empty slot renders as the empty string.
impl fmt::Display for RegisterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{v}"),
            None => Ok(()),
        }
    }
}

pub type SlotRef = Rc<RefCell<RegisterSlot>>;

#[derive(Debug, Default)]
pub struct Register {
    slots: HashMap<String, SlotRef>,
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `key`, created on first use.  Every call with the same
    /// key returns a handle to the same cell.
    pub fn slot(&mut self, key: &str) -> SlotRef {
        Rc::clone(
            self.slots
                .entry(key.to_string())
                .or_insert_with(|| Rc::new(RefCell::new(RegisterSlot::new(key)))),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

/// `%{key}` → `key`.
pub fn slot_var(value: &str) -> Option<&str> {
    value
        .strip_prefix("%{")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|key| !key.is_empty())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
