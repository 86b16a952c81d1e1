//! `<path>`: an ordered list of filesystem locations.

use std::any::Any;

use crate::element::{AttributeValue, Configurable, DataType, unsupported_attribute, unsupported_element};
use crate::error::{BuildError, Result};

/// Split a `path` attribute.  `;` always separates; `:` does too except on
/// Windows, where it belongs to drive letters.
fn split_path(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| c == ';' || (c == ':' && !cfg!(windows)))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

const SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

// ─── Path ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    entries: Vec<String>,
}

impl Path {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl Configurable for Path {
    fn element_name(&self) -> &str {
        "path"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        match name {
            "path" => self.entries.extend(split_path(&value.into_text("path", name)?)),
            _ => return Err(unsupported_attribute("path", name)),
        }
        Ok(())
    }

    fn create_child(&mut self, tag: &str) -> Result<Box<dyn DataType>> {
        match tag {
            "pathelement" => Ok(Box::new(PathElement::default())),
            "path" => Ok(Box::new(Path::default())),
            _ => Err(unsupported_element("path", tag)),
        }
    }

    fn store_child(&mut self, tag: &str, child: Box<dyn DataType>) -> Result<()> {
        let child = child.into_any();
        let entries = match child.downcast::<PathElement>() {
            Ok(element) => element.entries,
            Err(other) => match other.downcast::<Path>() {
                Ok(path) => path.entries,
                Err(_) => return Err(BuildError::new(format!("<path> cannot hold a <{tag}>"))),
            },
        };
        self.entries.extend(entries);
        Ok(())
    }
}

impl DataType for Path {
    fn render(&self) -> String {
        self.entries.join(SEPARATOR)
    }

    fn clone_box(&self) -> Box<dyn DataType> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// ─── PathElement ─────────────────────────────────────────────────────────────

/// `<pathelement location="…"/>` or `<pathelement path="a:b"/>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathElement {
    entries: Vec<String>,
}

impl Configurable for PathElement {
    fn element_name(&self) -> &str {
        "pathelement"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let text = value.into_text("pathelement", name)?;
        match name {
            "location" => self.entries.push(text),
            "path" => self.entries.extend(split_path(&text)),
            _ => return Err(unsupported_attribute("pathelement", name)),
        }
        Ok(())
    }
}

impl DataType for PathElement {
    fn render(&self) -> String {
        self.entries.join(SEPARATOR)
    }

    fn clone_box(&self) -> Box<dyn DataType> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
