//! `<taskdef>` and `<typedef>`: make an existing definition available under
//! another element name.
//!
//! `classname` names a definition that is already registered (a built-in or
//! one defined earlier).  Because elements are resolved when they run, the
//! new name is usable by every element that runs after the definition.

use crate::element::{AttributeValue, Configurable, Definition, Task, unsupported_attribute};
use crate::error::{BuildError, Result};
use crate::listener::LogLevel;
use crate::project::Project;
use crate::propfile::PropertyFileReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Task,
    Type,
}

#[derive(Debug)]
pub struct DefineTask {
    kind: Kind,
    name: Option<String>,
    classname: Option<String>,
    file: Option<String>,
}

impl DefineTask {
    pub fn taskdef() -> Self {
        Self { kind: Kind::Task, name: None, classname: None, file: None }
    }

    pub fn typedef() -> Self {
        Self { kind: Kind::Type, ..Self::taskdef() }
    }

    fn define(&self, project: &mut Project, name: &str, classname: &str) -> Result<()> {
        let matches_kind = match project.registry().get(classname) {
            None => {
                return Err(BuildError::new(format!("Could not find a definition for classname '{classname}'")));
            }
            Some(Definition::Task { .. }) => self.kind == Kind::Task,
            Some(Definition::Type(_)) => self.kind == Kind::Type,
        };
        if !matches_kind {
            let expected = if self.kind == Kind::Task { "task" } else { "data type" };
            return Err(BuildError::new(format!("'{classname}' is not a {expected}")));
        }

        project.registry_mut().alias(name, classname)?;
        project.log(&format!("Defined <{name}> as {classname}"), LogLevel::Debug);
        Ok(())
    }
}

impl Configurable for DefineTask {
    fn element_name(&self) -> &str {
        match self.kind {
            Kind::Task => "taskdef",
            Kind::Type => "typedef",
        }
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let text = value.into_text(self.element_name(), name)?;
        match name {
            "name" => self.name = Some(text),
            "classname" => self.classname = Some(text),
            "file" => self.file = Some(text),
            _ => return Err(unsupported_attribute(self.element_name(), name)),
        }
        Ok(())
    }
}

impl Task for DefineTask {
    fn main(&mut self, project: &mut Project) -> Result<()> {
        if let Some(file) = &self.file {
            let path = project.resolve_file(file);
            let definitions = PropertyFileReader::load(&path, None)?;
            for (name, classname) in definitions.iter() {
                self.define(project, name, &classname.to_string())?;
            }
            return Ok(());
        }

        match (&self.name, &self.classname) {
            (Some(name), Some(classname)) => self.define(project, name, classname),
            _ => Err(BuildError::new(format!(
                "You must specify name and classname (or file) for <{}>",
                self.element_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tasks::testing::Build;

    #[test]
    fn taskdef_makes_the_name_usable_by_later_elements() {
        let build = Build::new()
            .load(
                r#"<project>
                     <taskdef name="say" classname="echo"/>
                     <say message="hi"/>
                   </project>"#,
            )
            .unwrap();
        assert_eq!(build.messages(), vec!["hi"]);
    }

    #[test]
    fn names_used_before_their_definition_fail_at_run_time() {
        let err = Build::new()
            .load(
                r#"<project>
                     <say message="hi"/>
                     <taskdef name="say" classname="echo"/>
                   </project>"#,
            )
            .unwrap_err();
        assert!(err.to_string().contains("Could not create task or type of type: say"), "{err}");
    }

    #[test]
    fn definitions_from_a_file() {
        let build = Build::new()
            .file("defs.properties", "say = echo\nshout = echo\n")
            .load(
                r#"<project>
                     <taskdef file="defs.properties"/>
                     <say message="from file"/>
                   </project>"#,
            )
            .unwrap();
        assert_eq!(build.messages(), vec!["from file"]);
    }

    #[test]
    fn typedef_and_taskdef_check_the_kind() {
        let build = Build::new()
            .load(
                r#"<project>
                     <typedef name="classpath" classname="path"/>
                     <classpath id="cp" path="lib"/>
                   </project>"#,
            )
            .unwrap();
        assert!(build.project.has_reference("cp"));

        let err = Build::new()
            .load(r#"<project><taskdef name="cp" classname="path"/></project>"#)
            .unwrap_err();
        assert!(err.to_string().contains("'path' is not a task"), "{err}");

        let err = Build::new()
            .load(r#"<project><taskdef name="x" classname="Missing"/></project>"#)
            .unwrap_err();
        assert!(err.to_string().contains("Could not find a definition for classname 'Missing'"), "{err}");
    }
}
