//! Built-in tasks.

pub mod define;
pub mod echo;
pub mod exportproperties;
pub mod fail;
pub mod import;
pub mod property;
pub mod regex;

use crate::element::TypeRegistry;

pub use define::DefineTask;
pub use echo::EchoTask;
pub use exportproperties::ExportPropertiesTask;
pub use fail::FailTask;
pub use import::ImportTask;
pub use property::PropertyTask;
pub use regex::RegexTask;

pub fn register_builtins(registry: &mut TypeRegistry) {
    registry.register_task("property", || Box::new(PropertyTask::default()));
    registry.register_task("echo", || Box::new(EchoTask::default()));
    registry.register_task("fail", || Box::new(FailTask::default()));
    registry.register_task("import", || Box::new(ImportTask::default()));
    registry.register_task("taskdef", || Box::new(DefineTask::taskdef()));
    registry.register_task("typedef", || Box::new(DefineTask::typedef()));
    registry.register_task("regex", || Box::new(RegexTask::default()));
    registry.register_task("exportproperties", || Box::new(ExportPropertiesTask::default()));
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use tempfile::TempDir;

    use crate::configurator::ProjectConfigurator;
    use crate::error::Result;
    use crate::listener::{BuildListener, LogLevel};
    use crate::project::Project;

    type Log = Rc<RefCell<Vec<(LogLevel, String)>>>;

    struct Capture(Log);

    impl BuildListener for Capture {
        fn message_logged(&mut self, level: LogLevel, message: &str) {
            self.0.borrow_mut().push((level, message.to_string()));
        }
    }

    /// A project loaded from a build file written into a scratch directory.
    #[derive(Debug)]
    pub struct Build {
        pub project: Project,
        log: Log,
        dir: TempDir,
    }

    impl Build {
        pub fn new() -> Self {
            let log: Log = Rc::default();
            let mut project = Project::new();
            project.add_listener(Box::new(Capture(Rc::clone(&log))));
            Self { project, log, dir: TempDir::new().unwrap() }
        }

        /// Write a helper file next to the build file.
        pub fn file(self, name: &str, content: &str) -> Self {
            std::fs::write(self.path(name), content).unwrap();
            self
        }

        /// Write `build.xml` and parse it (running its top-level elements).
        pub fn load(mut self, xml: &str) -> Result<Self> {
            let build_file = self.path("build.xml");
            std::fs::write(&build_file, xml).unwrap();
            ProjectConfigurator::configure_project(&mut self.project, &build_file)?;
            Ok(self)
        }

        pub fn run(&mut self, target: &str) -> Result<()> {
            self.log.borrow_mut().clear();
            self.project.execute_target(target)
        }

        pub fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        /// Messages logged at info level or above, target banners excluded.
        pub fn messages(&self) -> Vec<String> {
            self.log
                .borrow()
                .iter()
                .filter(|(level, m)| *level <= LogLevel::Info && !m.ends_with(':'))
                .map(|(_, m)| m.clone())
                .collect()
        }

        pub fn logged_at(&self, level: LogLevel) -> Vec<String> {
            self.log.borrow().iter().filter(|(l, _)| *l == level).map(|(_, m)| m.clone()).collect()
        }

        pub fn property(&self, name: &str) -> Option<String> {
            self.project.property(name).unwrap()
        }
    }
}
