//! `<exportproperties>`: save the project properties to a property file.

use crate::element::{AttributeValue, Configurable, Task, unsupported_attribute};
use crate::error::{BuildError, Result};
use crate::listener::LogLevel;
use crate::project::Project;
use crate::properties::{PropertySet, PropertySetImpl};
use crate::propfile::PropertyFileWriter;

const DEFAULT_DISALLOWED: &str = "host.,phing.,os.,php.,line.,env.,user.";

#[derive(Debug)]
pub struct ExportPropertiesTask {
    target_file: Option<String>,
    disallowed_prefixes: Vec<String>,
}

impl Default for ExportPropertiesTask {
    fn default() -> Self {
        Self { target_file: None, disallowed_prefixes: split_prefixes(DEFAULT_DISALLOWED) }
    }
}

fn split_prefixes(list: &str) -> Vec<String> {
    list.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

impl ExportPropertiesTask {
    fn is_allowed(&self, key: &str) -> bool {
        !self.disallowed_prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
    }
}

impl Configurable for ExportPropertiesTask {
    fn element_name(&self) -> &str {
        "exportproperties"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let text = value.into_text("exportproperties", name)?;
        match name {
            "targetfile" => self.target_file = Some(text),
            "disallowedpropertyprefixes" => self.disallowed_prefixes = split_prefixes(&text),
            _ => return Err(unsupported_attribute("exportproperties", name)),
        }
        Ok(())
    }
}

impl Task for ExportPropertiesTask {
    fn main(&mut self, project: &mut Project) -> Result<()> {
        let target = self
            .target_file
            .as_deref()
            .ok_or_else(|| BuildError::new("Missing attribute 'targetfile' for <exportproperties>"))?;

        let exported: PropertySetImpl = project
            .properties()
            .iter()
            .filter(|(key, _)| self.is_allowed(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let path = project.resolve_file(target);
        PropertyFileWriter::new().store(&exported, &path)?;
        project.log(&format!("Exported {} properties to {}", exported.len(), path.display()), LogLevel::Verbose);
        Ok(())
    }
}
