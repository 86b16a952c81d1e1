//! The in-memory build: properties, references, targets and their
//! execution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::configurator::{self, ElementNode, XmlContext};
use crate::element::{DataType, Definition, TypeRegistry};
use crate::error::{BuildError, Result};
use crate::expansion::PropertyExpansion;
use crate::listener::{BuildListener, LogLevel};
use crate::properties::{PropertySet, PropertySetImpl, PropertyValue};
use crate::register::Register;
use crate::target::{self, Target};

pub const PHING_VERSION: &str = env!("CARGO_PKG_VERSION");

// ═══════════════════════════════════════════════════════════════════════════════
//  Project
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Project {
    name: Option<String>,
    description: Option<String>,
    default_target: Option<String>,
    basedir: PathBuf,
    properties: PropertySetImpl,
    /// Names set from outside the build file (`-D`); never overridden.
    user_properties: PropertySetImpl,
    references: HashMap<String, Rc<dyn DataType>>,
    targets: IndexMap<String, Target>,
    registry: TypeRegistry,
    register: Register,
    listeners: Vec<Box<dyn BuildListener>>,
    xml_context: Option<XmlContext>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("basedir", &self.basedir)
            .field("default_target", &self.default_target)
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Project {
    /// A project with the built-in tasks and types and the `phing.*` /
    /// `host.*` properties.
    pub fn new() -> Self {
        Self {
            name: None,
            description: None,
            default_target: None,
            basedir: PathBuf::from("."),
            properties: [
                ("phing.version", PHING_VERSION),
                ("host.os", std::env::consts::OS),
                ("host.arch", std::env::consts::ARCH),
            ]
            .into_iter()
            .collect(),
            user_properties: PropertySetImpl::new(),
            references: HashMap::new(),
            targets: IndexMap::new(),
            registry: TypeRegistry::with_builtins(),
            register: Register::new(),
            listeners: Vec::new(),
            xml_context: None,
        }
    }

    // ─── Identity ────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.set_property("phing.project.name", name.as_str())?;
        self.name = Some(name);
        Ok(())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    pub fn set_default_target(&mut self, name: impl Into<String>) {
        self.default_target = Some(name.into());
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn set_basedir(&mut self, basedir: impl Into<PathBuf>) -> Result<()> {
        let basedir = basedir.into();
        let display = basedir.display().to_string();
        self.set_property("project.basedir", display.as_str())?;
        self.set_property("basedir", display.as_str())?;
        self.basedir = basedir;
        Ok(())
    }

    /// `path` relative to the base directory (absolute paths unchanged).
    pub fn resolve_file(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() { path.to_path_buf() } else { self.basedir.join(path) }
    }

    // ─── Properties ──────────────────────────────────────────────────────

    pub fn properties(&self) -> &PropertySetImpl {
        &self.properties
    }

    pub fn property_value(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.raw(name)
    }

    /// A property rendered as text (`true`/`false` for booleans,
    /// comma-joined for arrays).
    pub fn property(&self, name: &str) -> Result<Option<String>> {
        Ok(self.properties.get(name)?.map(|v| v.to_string()))
    }

    /// Whether `name` is defined.  A circular definition is an error, not
    /// "unset".
    pub fn is_property_set(&self, name: &str) -> Result<bool> {
        Ok(self.properties.get(name)?.is_some())
    }

    pub fn is_user_property(&self, name: &str) -> bool {
        self.user_properties.contains(name)
    }

    /// Set (or replace) a property.  User properties are left alone.
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        if self.is_user_property(name) {
            log::debug!("Override ignored for user property \"{name}\"");
            return Ok(());
        }
        self.properties.set(name, value.into())
    }

    /// Set a property only if it does not exist yet.
    pub fn set_new_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        if self.properties.contains(name) {
            log::debug!("Override ignored for property \"{name}\"");
            return Ok(());
        }
        self.properties.set(name, value.into())
    }

    /// Set a property from outside the build file; it wins over anything
    /// the build file does.
    pub fn set_user_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let value = value.into();
        self.user_properties.set(name, value.clone())?;
        self.properties.set(name, value)
    }

    /// Expand `${…}` references against the project properties.
    pub fn replace_properties(&self, value: &str) -> Result<String> {
        PropertyExpansion::new(&self.properties).expand_str(value)
    }

    // ─── References ──────────────────────────────────────────────────────

    pub fn add_reference(&mut self, id: &str, value: Rc<dyn DataType>) {
        if self.references.insert(id.to_string(), value).is_some() {
            log::debug!("Overriding previous definition of reference to {id}");
        }
    }

    pub fn reference(&self, id: &str) -> Option<Rc<dyn DataType>> {
        self.references.get(id).cloned()
    }

    pub fn has_reference(&self, id: &str) -> bool {
        self.references.contains_key(id)
    }

    // ─── Targets ─────────────────────────────────────────────────────────

    pub fn add_target(&mut self, target: Target) {
        self.targets.insert(target.name.clone(), target);
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn has_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    // ─── Registry, register, parsing context ─────────────────────────────

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn register(&self) -> &Register {
        &self.register
    }

    pub fn register_mut(&mut self) -> &mut Register {
        &mut self.register
    }

    /// The parsing context shared by a build file and all its imports.
    pub fn xml_context(&self) -> Option<&XmlContext> {
        self.xml_context.as_ref()
    }

    pub fn xml_context_mut(&mut self) -> &mut XmlContext {
        self.xml_context.get_or_insert_with(XmlContext::default)
    }

    // ─── Logging ─────────────────────────────────────────────────────────

    pub fn add_listener(&mut self, listener: Box<dyn BuildListener>) {
        self.listeners.push(listener);
    }

    pub fn log(&mut self, message: &str, level: LogLevel) {
        let log_level: log::Level = level.into();
        log::log!(target: "phing", log_level, "{message}");
        for listener in &mut self.listeners {
            listener.message_logged(level, message);
        }
    }

    pub fn fire_build_started(&mut self) {
        for listener in &mut self.listeners {
            listener.build_started();
        }
    }

    pub fn fire_build_finished(&mut self, error: Option<&BuildError>) {
        for listener in &mut self.listeners {
            listener.build_finished(error);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    //  Execution
    // ═══════════════════════════════════════════════════════════════════════

    /// Run `name` after all targets it depends on.
    pub fn execute_target(&mut self, name: &str) -> Result<()> {
        let order = target::topo_sort(name, &self.targets, self.name())?;
        log::debug!("Build sequence for target '{name}' is {order:?}");
        for target in order {
            self.run_target(&target)?;
        }
        Ok(())
    }

    /// Run each named target in turn; with no names, the default target.
    pub fn execute_targets(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            let default = self
                .default_target
                .clone()
                .ok_or_else(|| BuildError::new("No target specified and no default target"))?;
            return self.execute_target(&default);
        }
        for name in names {
            self.execute_target(name)?;
        }
        Ok(())
    }

    fn run_target(&mut self, name: &str) -> Result<()> {
        let Some(target) = self.targets.get(name).cloned() else {
            return Err(BuildError::new(format!("Target \"{name}\" does not exist in the project \"{}\".", self.name())));
        };

        if !self.test_if(&target)? {
            let condition = target.if_condition.as_deref().unwrap_or_default();
            self.log(
                &format!("Skipped target '{name}' because property '{condition}' not set."),
                LogLevel::Verbose,
            );
            return Ok(());
        }
        if !self.test_unless(&target)? {
            let condition = target.unless_condition.as_deref().unwrap_or_default();
            self.log(
                &format!("Skipped target '{name}' because property '{condition}' set."),
                LogLevel::Verbose,
            );
            return Ok(());
        }

        for listener in &mut self.listeners {
            listener.target_started(name);
        }
        self.log(&format!("{} > {name}:", self.name()), LogLevel::Info);

        let result = self.perform_elements(&target.elements);
        for listener in &mut self.listeners {
            listener.target_finished(name, result.as_ref().err());
        }
        result
    }

    fn test_if(&self, target: &Target) -> Result<bool> {
        match target.if_condition.as_deref() {
            None | Some("") => Ok(true),
            Some(cond) => self.is_property_set(&self.replace_properties(cond)?),
        }
    }

    fn test_unless(&self, target: &Target) -> Result<bool> {
        match target.unless_condition.as_deref() {
            None | Some("") => Ok(true),
            Some(cond) => Ok(!self.is_property_set(&self.replace_properties(cond)?)?),
        }
    }

    /// Resolve, configure and run each element in order.
    pub fn perform_elements(&mut self, elements: &[Rc<ElementNode>]) -> Result<()> {
        for element in elements {
            self.perform_element(element)?;
        }
        Ok(())
    }

    /// Resolve `element` against the registry.  Tasks are configured and
    /// executed; data types are configured and registered under their `id`.
    pub fn perform_element(&mut self, element: &ElementNode) -> Result<()> {
        let Some(definition) = self.registry.get(&element.tag).cloned() else {
            return Err(BuildError::at(
                format!("Could not create task or type of type: {}", element.tag),
                element.location.clone(),
            ));
        };

        match definition {
            Definition::Task { factory, .. } => {
                let mut task = factory();
                task.set_location(element.location.clone());
                configurator::configure(&mut *task, element, self)?;
                if element.attribute("id").is_some() {
                    log::debug!("Ignoring id on task <{}>; only data types are referenceable", element.tag);
                }

                for listener in &mut self.listeners {
                    listener.task_started(&element.tag);
                }
                let result = task.main(self).map_err(|e| e.with_location(element.location.clone()));
                for listener in &mut self.listeners {
                    listener.task_finished(&element.tag, result.as_ref().err());
                }
                result
            }
            Definition::Type(factory) => {
                let mut value = factory();
                configurator::configure(&mut *value, element, self)?;
                configurator::configure_id(self, &*value, element);
                Ok(())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_properties_are_present() {
        let project = Project::new();
        assert_eq!(project.property("phing.version").unwrap().as_deref(), Some(PHING_VERSION));
        assert_eq!(project.property("host.os").unwrap().as_deref(), Some(std::env::consts::OS));
    }

    #[test]
    fn user_properties_win() {
        let mut project = Project::new();
        project.set_user_property("env", "prod").unwrap();
        project.set_property("env", "dev").unwrap();
        assert_eq!(project.property("env").unwrap().as_deref(), Some("prod"));
        assert!(project.is_user_property("env"));
    }

    #[test]
    fn new_property_does_not_override() {
        let mut project = Project::new();
        project.set_new_property("a", "1").unwrap();
        project.set_new_property("a", "2").unwrap();
        assert_eq!(project.property("a").unwrap().as_deref(), Some("1"));
        project.set_property("a", "3").unwrap();
        assert_eq!(project.property("a").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn replace_properties_uses_project_values() {
        let mut project = Project::new();
        project.set_property("src", "${root}/src").unwrap();
        project.set_property("root", "/work").unwrap();
        project.set_property("flag", true).unwrap();
        assert_eq!(project.replace_properties("${src}:${flag}:${nope}").unwrap(), "/work/src:true:${nope}");
    }

    #[test]
    fn basedir_sets_properties() {
        let mut project = Project::new();
        project.set_basedir("/tmp/demo").unwrap();
        assert_eq!(project.property("project.basedir").unwrap().as_deref(), Some("/tmp/demo"));
        assert_eq!(project.resolve_file("a.txt"), PathBuf::from("/tmp/demo/a.txt"));
        assert_eq!(project.resolve_file("/abs"), PathBuf::from("/abs"));
    }

    #[test]
    fn execute_targets_needs_a_default() {
        let mut project = Project::new();
        let err = project.execute_targets(&[]).unwrap_err();
        assert!(err.to_string().contains("no default target"), "{err}");
    }

    #[test]
    fn if_and_unless_skip_targets() {
        let mut project = Project::new();
        let mut guarded = Target::new("guarded");
        guarded.if_condition = Some("${switch}".to_string());
        project.add_target(guarded);
        project.set_property("switch", "enabled").unwrap();

        let target = project.target("guarded").unwrap().clone();
        assert!(!project.test_if(&target).unwrap());
        project.set_property("enabled", "yes").unwrap();
        assert!(project.test_if(&target).unwrap());

        let mut unless = Target::new("unless");
        unless.unless_condition = Some("enabled".to_string());
        assert!(!project.test_unless(&unless).unwrap());
    }

    #[test]
    fn circular_condition_properties_fail_the_target() {
        let mut project = Project::new();
        project.set_property("a", "${b}").unwrap();
        project.set_property("b", "${a}").unwrap();
        let mut guarded = Target::new("guarded");
        guarded.if_condition = Some("a".to_string());
        project.add_target(guarded);

        assert!(matches!(project.property("a"), Err(BuildError::CircularProperty { .. })));
        let err = project.execute_target("guarded").unwrap_err();
        assert!(err.to_string().contains("circularly defined"), "{err}");
    }
}
