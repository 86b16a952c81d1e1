//! The capability interface between build-file elements and Rust objects.
//!
//! Every task and data type implements [`Configurable`]: the configurator
//! hands it each XML attribute through
//! [`set_attribute`](Configurable::set_attribute), its character data through
//! [`add_text`](Configurable::add_text) and each nested element through
//! [`create_child`](Configurable::create_child) /
//! [`store_child`](Configurable::store_child).  Unknown attributes and
//! elements are reported as errors by the default implementations and by
//! the `_ =>` arms of the concrete `match`es.
//!
//! The [`TypeRegistry`] maps element names to factories.  It is consulted
//! when an element is about to run, not when it is parsed, so a
//! `<taskdef>` that ran earlier makes its name available to later elements.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{BuildError, Location, Result};
use crate::project::Project;
use crate::register::SlotRef;

// ═══════════════════════════════════════════════════════════════════════════════
//  Attribute values
// ═══════════════════════════════════════════════════════════════════════════════

/// An attribute value after property expansion.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    Text(String),
    /// `%{key}`: a live handle on a register slot.
    Slot(SlotRef),
}

impl AttributeValue {
    /// The text of the value; attributes that cannot listen to a slot call
    /// this and report the slot case as an error.
    pub fn into_text(self, element: &str, attribute: &str) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Slot(_) => Err(BuildError::new(format!(
                "Cannot set listener for attribute '{attribute}' of <{element}>"
            ))),
        }
    }

    /// Interpret the value as a boolean (`true`, `yes`, `on`).
    pub fn into_bool(self, element: &str, attribute: &str) -> Result<bool> {
        Ok(to_boolean(&self.into_text(element, attribute)?))
    }

    /// Current text of the value, reading a slot if necessary.
    pub fn resolve(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Slot(slot) => slot.borrow().to_string(),
        }
    }
}

/// Phing's boolean reading of attribute text.
pub fn to_boolean(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "on" | "1")
}

pub fn unsupported_attribute(element: &str, attribute: &str) -> BuildError {
    BuildError::new(format!("<{element}> doesn't support the '{attribute}' attribute"))
}

pub fn unsupported_element(element: &str, child: &str) -> BuildError {
    BuildError::new(format!("<{element}> doesn't support the nested '{child}' element"))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Traits
// ═══════════════════════════════════════════════════════════════════════════════

pub trait Configurable {
    /// The element name used in messages.
    fn element_name(&self) -> &str;

    /// Apply one attribute.  `name` is lowercased.
    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()>;

    /// Apply non-blank, property-expanded character data.
    fn add_text(&mut self, text: &str) -> Result<()> {
        let _ = text;
        Err(BuildError::new(format!(
            "<{}> doesn't support nested text data",
            self.element_name()
        )))
    }

    /// Create the object for a nested element, before it is configured.
    fn create_child(&mut self, tag: &str) -> Result<Box<dyn DataType>> {
        Err(unsupported_element(self.element_name(), tag))
    }

    /// Take ownership of a nested element once it is configured.
    fn store_child(&mut self, tag: &str, child: Box<dyn DataType>) -> Result<()> {
        let _ = child;
        Err(unsupported_element(self.element_name(), tag))
    }
}

/// An executable build step.
pub trait Task: Configurable {
    /// Where the task was declared; called before configuration.
    fn set_location(&mut self, _location: Location) {}

    fn main(&mut self, project: &mut Project) -> Result<()>;
}

/// A configurable value object (path, file list, …) that can be registered
/// as a reference through its `id` attribute.
pub trait DataType: Configurable + fmt::Debug {
    /// String form used by `<property refid="…">`.
    fn render(&self) -> String;

    fn clone_box(&self) -> Box<dyn DataType>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

// ═══════════════════════════════════════════════════════════════════════════════
//  TypeRegistry
// ═══════════════════════════════════════════════════════════════════════════════

pub type TaskFactory = Rc<dyn Fn() -> Box<dyn Task>>;
pub type TypeFactory = Rc<dyn Fn() -> Box<dyn DataType>>;

#[derive(Clone)]
pub enum Definition {
    Task {
        factory: TaskFactory,
        /// Top-level occurrences run after the whole file is parsed instead
        /// of in document order.
        deferred: bool,
    },
    Type(TypeFactory),
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task { deferred, .. } => write!(f, "Task {{ deferred: {deferred} }}"),
            Self::Type(_) => f.write_str("Type"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    definitions: HashMap<String, Definition>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in tasks and types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::tasks::register_builtins(&mut registry);
        crate::types::register_builtins(&mut registry);
        registry
    }

    pub fn register_task<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Task> + 'static,
    {
        self.definitions
            .insert(name.to_string(), Definition::Task { factory: Rc::new(factory), deferred: false });
    }

    /// Register a task whose top-level occurrences run at parse end.
    pub fn register_deferred_task<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Task> + 'static,
    {
        self.definitions
            .insert(name.to_string(), Definition::Task { factory: Rc::new(factory), deferred: true });
    }

    pub fn register_type<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn DataType> + 'static,
    {
        self.definitions.insert(name.to_string(), Definition::Type(Rc::new(factory)));
    }

    /// Make `classname`'s definition available as `name` too.
    pub fn alias(&mut self, name: &str, classname: &str) -> Result<()> {
        let definition = self.definitions.get(classname).cloned().ok_or_else(|| {
            BuildError::new(format!("Could not find a definition for classname '{classname}'"))
        })?;
        log::debug!("Defining '{name}' as '{classname}'");
        self.definitions.insert(name.to_string(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn is_deferred(&self, name: &str) -> bool {
        matches!(self.definitions.get(name), Some(Definition::Task { deferred: true, .. }))
    }

    pub fn is_type(&self, name: &str) -> bool {
        matches!(self.definitions.get(name), Some(Definition::Type(_)))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register;

    #[test]
    fn booleans() {
        for yes in ["true", "TRUE", "yes", "On", "1"] {
            assert!(to_boolean(yes), "{yes}");
        }
        for no in ["false", "no", "off", "", "maybe"] {
            assert!(!to_boolean(no), "{no}");
        }
    }

    #[test]
    fn slot_values_refuse_plain_text_attributes() {
        let mut register = Register::new();
        let slot = register.slot("k");
        slot.borrow_mut().set_value("v");

        let value = AttributeValue::Slot(slot);
        assert_eq!(value.resolve(), "v");
        let err = value.into_text("echo", "level").unwrap_err();
        assert!(err.to_string().contains("Cannot set listener"), "{err}");
    }

    #[test]
    fn builtins_are_registered() {
        let registry = TypeRegistry::with_builtins();
        for name in ["property", "echo", "fail", "import", "taskdef", "typedef", "regex", "exportproperties"] {
            assert!(matches!(registry.get(name), Some(Definition::Task { .. })), "{name}");
        }
        assert!(registry.is_type("path"));
        assert!(!registry.is_deferred("echo"));
    }

    #[test]
    fn alias_copies_definitions() {
        let mut registry = TypeRegistry::with_builtins();
        registry.alias("say", "echo").unwrap();
        assert!(registry.get("say").is_some());
        assert!(registry.alias("x", "does-not-exist").is_err());
    }
}
