//! `<property>`: define properties from a value, a reference, a property
//! file or the environment.

use crate::element::{AttributeValue, Configurable, Task, unsupported_attribute};
use crate::error::{BuildError, Result};
use crate::expansion::{PropertyExpansion, PropertyExpansionWrapper};
use crate::listener::LogLevel;
use crate::project::Project;
use crate::properties::{PropertySet, PropertyValue};
use crate::propfile::PropertyFileReader;

#[derive(Debug, Default)]
pub struct PropertyTask {
    name: Option<String>,
    value: Option<String>,
    text: String,
    file: Option<String>,
    section: Option<String>,
    prefix: Option<String>,
    refid: Option<String>,
    environment: Option<String>,
    override_existing: bool,
}

impl PropertyTask {
    fn prefixed(&self, key: &str) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if prefix.ends_with('.') => format!("{prefix}{key}"),
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        }
    }

    fn add_property(&self, project: &mut Project, name: &str, value: PropertyValue) -> Result<()> {
        if project.is_user_property(name) {
            project.log(&format!("Override ignored for user property \"{name}\""), LogLevel::Verbose);
            return Ok(());
        }
        if self.override_existing {
            project.set_property(name, value)
        } else {
            project.set_new_property(name, value)
        }
    }

    fn load_file(&self, project: &mut Project, file: &str) -> Result<()> {
        let path = project.resolve_file(file);
        project.log(&format!("Loading {}", path.display()), LogLevel::Verbose);

        let loaded = PropertyFileReader::load(&path, self.section.as_deref())?;
        let loaded = PropertyExpansionWrapper::new(loaded);
        for key in loaded.keys() {
            let Some(value) = loaded.get(&key)? else {
                continue;
            };
            let value = PropertyExpansion::new(project.properties()).expand_value(&value)?;
            self.add_property(project, &self.prefixed(&key), value)?;
        }
        Ok(())
    }

    fn load_environment(&self, project: &mut Project, prefix: &str) -> Result<()> {
        let prefix = prefix.trim_end_matches('.');
        for (key, value) in std::env::vars_os() {
            let (Ok(key), Ok(value)) = (key.into_string(), value.into_string()) else {
                continue;
            };
            self.add_property(project, &format!("{prefix}.{key}"), PropertyValue::from(value))?;
        }
        Ok(())
    }
}

impl Configurable for PropertyTask {
    fn element_name(&self) -> &str {
        "property"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let text = value.into_text("property", name)?;
        match name {
            "name" => self.name = Some(text),
            "value" => self.value = Some(text),
            "file" => self.file = Some(text),
            "section" => self.section = Some(text),
            "prefix" => self.prefix = Some(text),
            "refid" => self.refid = Some(text),
            "environment" => self.environment = Some(text),
            "override" => self.override_existing = crate::element::to_boolean(&text),
            _ => return Err(unsupported_attribute("property", name)),
        }
        Ok(())
    }

    fn add_text(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }
}

impl Task for PropertyTask {
    fn main(&mut self, project: &mut Project) -> Result<()> {
        if let Some(name) = self.name.clone() {
            let value = if let Some(refid) = &self.refid {
                let reference = project
                    .reference(refid)
                    .ok_or_else(|| BuildError::new(format!("Reference '{refid}' not found.")))?;
                reference.render()
            } else if let Some(value) = &self.value {
                value.clone()
            } else if !self.text.is_empty() {
                self.text.clone()
            } else {
                return Err(BuildError::new("You must specify value or refid with the name attribute"));
            };
            let name = self.prefixed(&name);
            project.log(&format!("Setting property {name} to {value}"), LogLevel::Debug);
            return self.add_property(project, &name, PropertyValue::from(value));
        }

        if let Some(file) = self.file.clone() {
            return self.load_file(project, &file);
        }
        if let Some(prefix) = self.environment.clone() {
            return self.load_environment(project, &prefix);
        }
        Err(BuildError::new("You must specify file, environment or name"))
    }
}

#[cfg(test)]
mod tests {
    use crate::tasks::testing::Build;

    #[test]
    fn value_text_and_prefix() {
        let build = Build::new()
            .load(
                r#"<project>
                     <property name="a" value="1"/>
                     <property name="b">two ${a}</property>
                     <property name="c" value="3" prefix="cfg"/>
                   </project>"#,
            )
            .unwrap();
        assert_eq!(build.property("a").as_deref(), Some("1"));
        assert_eq!(build.property("b").as_deref(), Some("two 1"));
        assert_eq!(build.property("cfg.c").as_deref(), Some("3"));
    }

    #[test]
    fn existing_properties_are_kept_unless_override() {
        let build = Build::new()
            .load(
                r#"<project>
                     <property name="a" value="first"/>
                     <property name="a" value="second"/>
                     <property name="b" value="first"/>
                     <property name="b" value="second" override="true"/>
                   </project>"#,
            )
            .unwrap();
        assert_eq!(build.property("a").as_deref(), Some("first"));
        assert_eq!(build.property("b").as_deref(), Some("second"));
    }

    #[test]
    fn user_properties_are_never_overridden() {
        let mut build = Build::new();
        build.project.set_user_property("env", "prod").unwrap();
        let build = build
            .load(r#"<project><property name="env" value="dev" override="true"/></project>"#)
            .unwrap();
        assert_eq!(build.property("env").as_deref(), Some("prod"));
    }

    #[test]
    fn file_with_section_and_expansion() {
        let build = Build::new()
            .file(
                "build.properties",
                "root = /srv\nsrc = ${root}/src\nout = ${dest}/out\ndebug = true\n\
                 [prod]\nroot = /opt\n",
            )
            .load(
                r#"<project>
                     <property name="dest" value="/tmp"/>
                     <property file="build.properties" section="prod" prefix="cfg"/>
                   </project>"#,
            )
            .unwrap();
        assert_eq!(build.property("cfg.root").as_deref(), Some("/opt"));
        assert_eq!(build.property("cfg.src").as_deref(), Some("/opt/src"));
        assert_eq!(build.property("cfg.out").as_deref(), Some("/tmp/out"));
        assert_eq!(build.property("cfg.debug").as_deref(), Some("true"));
    }

    #[test]
    fn refid_renders_the_reference() {
        let build = Build::new()
            .load(
                r#"<project>
                     <path id="libs"><pathelement location="a.jar"/></path>
                     <property name="libs.path" refid="libs"/>
                   </project>"#,
            )
            .unwrap();
        assert_eq!(build.property("libs.path").as_deref(), Some("a.jar"));
    }

    #[test]
    fn environment_is_exposed_under_a_prefix() {
        let build = Build::new().load(r#"<project><property environment="env"/></project>"#).unwrap();
        let (key, value) = std::env::vars().next().expect("at least one environment variable");
        assert_eq!(build.property(&format!("env.{key}")), Some(value));
    }

    #[test]
    fn errors() {
        let err = Build::new().load(r#"<project><property name="x"/></project>"#).unwrap_err();
        assert!(err.to_string().contains("You must specify value or refid"), "{err}");

        let err = Build::new().load(r#"<project><property name="x" refid="ghost"/></project>"#).unwrap_err();
        assert!(err.to_string().contains("Reference 'ghost' not found."), "{err}");

        let err = Build::new().load(r#"<project><property/></project>"#).unwrap_err();
        assert!(err.to_string().contains("You must specify file, environment or name"), "{err}");

        let err = Build::new().load(r#"<project><property file="missing.properties"/></project>"#).unwrap_err();
        assert!(err.to_string().contains("missing.properties"), "{err}");
    }
}
