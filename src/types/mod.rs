//! Built-in data types.

pub mod path;

use crate::element::TypeRegistry;

pub use path::{Path, PathElement};

pub fn register_builtins(registry: &mut TypeRegistry) {
    registry.register_type("path", || Box::new(Path::default()));
    registry.register_type("pathelement", || Box::new(PathElement::default()));
}
