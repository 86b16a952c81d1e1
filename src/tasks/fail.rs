//! `<fail>`: stop the build, optionally only when a property is (not) set.

use crate::element::{AttributeValue, Configurable, Task, unsupported_attribute};
use crate::error::{BuildError, Result};
use crate::project::Project;

#[derive(Debug, Default)]
pub struct FailTask {
    message: Option<String>,
    text: String,
    if_condition: Option<String>,
    unless_condition: Option<String>,
    status: Option<i32>,
}

impl FailTask {
    fn should_fail(&self, project: &Project) -> Result<bool> {
        if let Some(name) = self.if_condition.as_deref() {
            if !project.is_property_set(name)? {
                return Ok(false);
            }
        }
        if let Some(name) = self.unless_condition.as_deref() {
            if project.is_property_set(name)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Configurable for FailTask {
    fn element_name(&self) -> &str {
        "fail"
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        match name {
            "message" | "msg" => self.message = Some(value.into_text("fail", name)?),
            "if" => self.if_condition = Some(value.into_text("fail", name)?),
            "unless" => self.unless_condition = Some(value.into_text("fail", name)?),
            "status" => {
                let text = value.into_text("fail", name)?;
                let status = text
                    .trim()
                    .parse()
                    .map_err(|_| BuildError::new(format!("Invalid status '{text}' for <fail>")))?;
                self.status = Some(status);
            }
            _ => return Err(unsupported_attribute("fail", name)),
        }
        Ok(())
    }

    fn add_text(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }
}

impl Task for FailTask {
    fn main(&mut self, project: &mut Project) -> Result<()> {
        if !self.should_fail(project)? {
            return Ok(());
        }

        let message = match &self.message {
            Some(message) => message.clone(),
            None if !self.text.is_empty() => self.text.clone(),
            None => "No message".to_string(),
        };
        Err(match self.status {
            Some(status) => BuildError::exit_status(message, status),
            None => BuildError::new(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BuildError;
    use crate::tasks::testing::Build;

    #[test]
    fn fails_with_message_and_location() {
        let err = Build::new()
            .load("<project>\n  <fail message=\"stop here\"/>\n</project>")
            .unwrap_err();
        assert_eq!(err.message(), "stop here");
        assert_eq!(err.location().map(|l| (l.line, l.column)), Some((2, 3)));
        assert_eq!(err.status(), 1);
    }

    #[test]
    fn status_becomes_an_exit_status() {
        let err = Build::new().load(r#"<project><fail status="3">bad</fail></project>"#).unwrap_err();
        assert!(matches!(err, BuildError::ExitStatus { status: 3, .. }), "{err:?}");
        assert_eq!(err.message(), "bad");
    }

    #[test]
    fn if_and_unless_guard_the_failure() {
        let build = Build::new()
            .load(
                r#"<project>
                     <property name="present" value="1"/>
                     <fail if="absent" message="not raised"/>
                     <fail unless="present" message="not raised either"/>
                   </project>"#,
            )
            .unwrap();
        assert_eq!(build.property("present").as_deref(), Some("1"));

        let err = Build::new().load(r#"<project><fail unless="absent"/></project>"#).unwrap_err();
        assert_eq!(err.message(), "No message");
    }

    #[test]
    fn circular_condition_is_reported_not_treated_as_unset() {
        let err = Build::new()
            .load(
                r#"<project>
                     <property name="a" value="${b}"/>
                     <property name="b" value="${a}"/>
                     <fail if="a" message="should not be the reason"/>
                   </project>"#,
            )
            .unwrap_err();
        assert!(err.to_string().contains("circularly defined"), "{err}");
    }
}
