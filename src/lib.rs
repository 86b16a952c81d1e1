//! A build engine for Phing-style XML build files.
//!
//! A [`Project`] holds properties, references and targets.
//! [`ProjectConfigurator`] parses a build file (and everything it imports)
//! into a project, after which [`Project::execute_targets`] runs the
//! requested targets in dependency order.
//!
//! ```no_run
//! use phing_rs::{Project, ProjectConfigurator};
//!
//! let mut project = Project::new();
//! ProjectConfigurator::configure_project(&mut project, "build.xml")?;
//! project.execute_targets(&["dist".to_string()])?;
//! # Ok::<(), phing_rs::BuildError>(())
//! ```

pub mod configurator;
pub mod element;
pub mod error;
pub mod expansion;
pub mod listener;
pub mod project;
pub mod properties;
pub mod propfile;
pub mod regexp;
pub mod register;
pub mod target;
pub mod tasks;
pub mod types;

pub use configurator::{ElementNode, ProjectConfigurator, XmlContext};
pub use element::{AttributeValue, Configurable, DataType, Task, TypeRegistry};
pub use error::{BuildError, Location, Result, add_location_to_build_error};
pub use expansion::{PropertyExpansion, PropertyExpansionWrapper};
pub use listener::{BuildListener, LogLevel};
pub use project::Project;
pub use properties::{PropertySet, PropertySetImpl, PropertyValue};
pub use propfile::{PropertyFileReader, PropertyFileWriter};
pub use regexp::{RegexEngine, Regexp, RegexpEngine};
pub use register::{Register, RegisterSlot, SlotRef, SlotValue};
pub use target::Target;
