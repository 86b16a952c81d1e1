//! `<import>`: parse another build file into the current project.

use std::path::PathBuf;

use crate::configurator::ProjectConfigurator;
use crate::element::{AttributeValue, Configurable, Task, unsupported_attribute};
use crate::error::{BuildError, Location, Result, add_location_to_build_error};
use crate::listener::LogLevel;
use crate::project::Project;

#[derive(Debug, Default)]
pub struct ImportTask {
    file: Option<String>,
    optional: bool,
    location: Option<Location>,
}

impl ImportTask {
    /// `file` relative to the build file that contains this element.
    fn resolve(&self, project: &Project, file: &str) -> PathBuf {
        let base = project
            .xml_context()
            .and_then(|ctx| ctx.current_file())
            .and_then(|f| f.parent())
            .map(|dir| dir.to_path_buf())
            .unwrap_or_else(|| project.basedir().to_path_buf());
        base.join(file)
    }
}

impl Configurable for ImportTask {
    fn element_name(&self) -> &str {
        "import"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        match name {
            "file" => self.file = Some(value.into_text("import", name)?),
            "optional" => self.optional = value.into_bool("import", name)?,
            _ => return Err(unsupported_attribute("import", name)),
        }
        Ok(())
    }
}

impl Task for ImportTask {
    fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }

    fn main(&mut self, project: &mut Project) -> Result<()> {
        let file = self
            .file
            .as_deref()
            .ok_or_else(|| BuildError::new("Missing attribute 'file' for <import>"))?;
        let path = self.resolve(project, file);

        let Ok(path) = std::fs::canonicalize(&path) else {
            if self.optional {
                project.log(&format!("Skipping optional import of {}", path.display()), LogLevel::Verbose);
                return Ok(());
            }
            return Err(BuildError::new(format!("Cannot find {file} to import")));
        };

        let already = project.xml_context().is_some_and(|ctx| ctx.is_imported(&path));
        if already {
            project.log(&format!("Skipping import of {}: already imported", path.display()), LogLevel::Verbose);
            return Ok(());
        }

        project.log(&format!("Importing {}", path.display()), LogLevel::Debug);
        ProjectConfigurator::configure_project(project, &path)
            .map_err(|e| add_location_to_build_error(e, self.location.clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::tasks::testing::Build;

    #[test]
    fn optional_missing_import_is_skipped() {
        let build = Build::new()
            .load(r#"<project><import file="nope.xml" optional="true"/><echo message="after"/></project>"#)
            .unwrap();
        assert_eq!(build.messages(), vec!["after"]);
    }

    #[test]
    fn missing_import_is_an_error_at_the_import() {
        let err = Build::new().load("<project>\n  <import file=\"nope.xml\"/>\n</project>").unwrap_err();
        assert!(err.to_string().contains("Cannot find nope.xml to import"), "{err}");
        assert_eq!(err.location().map(|l| l.line), Some(2));
    }

    #[test]
    fn import_inside_a_target_resolves_against_basedir() {
        let mut build = Build::new()
            .file("lib.xml", r#"<project name="lib"><target name="helper"><echo message="help"/></target></project>"#)
            .load(r#"<project name="main"><target name="load"><import file="lib.xml"/></target></project>"#)
            .unwrap();
        assert!(!build.project.has_target("helper"));
        build.run("load").unwrap();
        build.run("helper").unwrap();
        assert_eq!(build.messages(), vec!["help"]);
    }

    #[test]
    fn import_cycles_stop_at_the_first_revisit() {
        let build = Build::new()
            .file("a.xml", r#"<project name="a"><echo message="in a"/><import file="build.xml"/></project>"#)
            .load(r#"<project name="main"><import file="a.xml"/><echo message="in main"/></project>"#)
            .unwrap();
        assert_eq!(build.messages(), vec!["in a", "in main"]);
    }
}
