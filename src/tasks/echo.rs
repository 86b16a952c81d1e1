//! `<echo>`: log a message or write it to a file.

use std::fs::OpenOptions;
use std::io::Write;

use crate::element::{AttributeValue, Configurable, Task, unsupported_attribute};
use crate::error::{BuildError, Result};
use crate::listener::LogLevel;
use crate::project::Project;

#[derive(Debug, Default)]
pub struct EchoTask {
    /// May be a register slot, read when the task runs.
    message: Option<AttributeValue>,
    text: String,
    level: Option<LogLevel>,
    file: Option<String>,
    append: bool,
}

impl EchoTask {
    fn text(&self) -> String {
        match &self.message {
            Some(message) => message.resolve(),
            None => self.text.clone(),
        }
    }
}

impl Configurable for EchoTask {
    fn element_name(&self) -> &str {
        "echo"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        match name {
            "message" | "msg" => self.message = Some(value),
            "level" => self.level = Some(value.into_text("echo", name)?.parse()?),
            "file" => self.file = Some(value.into_text("echo", name)?),
            "append" => self.append = value.into_bool("echo", name)?,
            _ => return Err(unsupported_attribute("echo", name)),
        }
        Ok(())
    }

    fn add_text(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }
}

impl Task for EchoTask {
    fn main(&mut self, project: &mut Project) -> Result<()> {
        let message = self.text();

        let Some(file) = &self.file else {
            project.log(&message, self.level.unwrap_or(LogLevel::Info));
            return Ok(());
        };

        let path = project.resolve_file(file);
        let mut out = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&path)
            .map_err(|e| BuildError::io(&path, e))?;
        writeln!(out, "{message}").map_err(|e| BuildError::io(&path, e))?;
        Ok(())
    }
}
