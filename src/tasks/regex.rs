//! `<regex>`: set a property from a regular-expression match or
//! replacement.

use crate::element::{AttributeValue, Configurable, Task, to_boolean, unsupported_attribute};
use crate::error::{BuildError, Result};
use crate::listener::LogLevel;
use crate::project::Project;
use crate::regexp::Regexp;

#[derive(Debug)]
pub struct RegexTask {
    property: Option<String>,
    subject: Option<String>,
    pattern: Option<String>,
    match_group: usize,
    replace: Option<String>,
    case_sensitive: bool,
    modifiers: Option<String>,
    limit: Option<i64>,
    default_value: Option<String>,
}

impl Default for RegexTask {
    fn default() -> Self {
        Self {
            property: None,
            subject: None,
            pattern: None,
            match_group: 1,
            replace: None,
            case_sensitive: true,
            modifiers: None,
            limit: None,
            default_value: None,
        }
    }
}

fn required<'a>(value: &'a Option<String>, attribute: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| BuildError::new(format!("Missing attribute '{attribute}' for <regex>")))
}

impl RegexTask {
    fn evaluate(&self, subject: &str, pattern: &str) -> Result<Option<String>> {
        let mut regexp = Regexp::new();
        regexp.set_pattern(pattern);
        regexp.set_ignore_case(!self.case_sensitive);
        if let Some(modifiers) = &self.modifiers {
            regexp.set_modifiers(modifiers)?;
        }
        if let Some(limit) = self.limit {
            regexp.set_limit(limit);
        }

        if let Some(replace) = &self.replace {
            regexp.set_replace(replace.as_str());
            return regexp.replace(subject).map(Some);
        }
        if !regexp.matches(subject)? {
            return Ok(None);
        }
        Ok(regexp.group(self.match_group).map(str::to_string))
    }
}

impl Configurable for RegexTask {
    fn element_name(&self) -> &str {
        "regex"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let text = value.into_text("regex", name)?;
        match name {
            "property" => self.property = Some(text),
            "subject" => self.subject = Some(text),
            "pattern" => self.pattern = Some(text),
            "match" => {
                self.match_group = text
                    .trim()
                    .trim_start_matches('$')
                    .parse()
                    .map_err(|_| BuildError::new(format!("Invalid match group '{text}' for <regex>")))?;
            }
            "replace" => self.replace = Some(text),
            "casesensitive" => self.case_sensitive = to_boolean(&text),
            "modifiers" => self.modifiers = Some(text),
            "limit" => {
                let limit = text
                    .trim()
                    .parse()
                    .map_err(|_| BuildError::new(format!("Invalid limit '{text}' for <regex>")))?;
                self.limit = Some(limit);
            }
            "defaultvalue" => self.default_value = Some(text),
            _ => return Err(unsupported_attribute("regex", name)),
        }
        Ok(())
    }
}

impl Task for RegexTask {
    fn main(&mut self, project: &mut Project) -> Result<()> {
        let property = required(&self.property, "property")?;
        let subject = required(&self.subject, "subject")?;
        let pattern = required(&self.pattern, "pattern")?;

        match self.evaluate(subject, pattern)?.or_else(|| self.default_value.clone()) {
            Some(value) => {
                project.log(&format!("Setting property '{property}' to '{value}'"), LogLevel::Verbose);
                project.set_property(property, value)
            }
            None => {
                project.log(&format!("No match for '{pattern}'; '{property}' not set"), LogLevel::Verbose);
                Ok(())
            }
        }
    }
}
