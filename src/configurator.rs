//! Build-file parsing and object configuration.
//!
//! A build file is read in two phases.  [`ProjectConfigurator`] parses the
//! XML into an owned [`ElementNode`] tree and files the elements away:
//! `<target>` children become [`Target`]s, anything else at the top level
//! goes to the implicit target (or, for deferred definitions, to the
//! parse-end target).  Nothing is resolved against the type registry until
//! an element runs; at that point [`configure`] and friends push the
//! element's attributes, text and children into the freshly created object.
//!
//! Imports share one [`XmlContext`] with the file that imports them.  The
//! context tracks which files are being or have been parsed so a file is
//! never imported twice.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::element::{AttributeValue, Configurable, DataType, to_boolean};
use crate::error::{BuildError, Location, Result};
use crate::listener::LogLevel;
use crate::project::Project;
use crate::register::slot_var;
use crate::target::Target;

// ═══════════════════════════════════════════════════════════════════════════════
//  ElementNode
// ═══════════════════════════════════════════════════════════════════════════════

/// An owned XML element: the unresolved form of a task or data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub tag: String,
    /// Attributes in document order, names as written.
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data of the element itself (CDATA included).
    pub text: String,
    pub children: Vec<ElementNode>,
    pub location: Location,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>, location: Location) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            location,
        }
    }

    /// Parse a whole document and return its root element.
    pub fn parse(source: &str, file: &Path) -> Result<Self> {
        let options = roxmltree::ParsingOptions { allow_dtd: true, ..Default::default() };
        let doc = roxmltree::Document::parse_with_options(source, options)
            .map_err(|e| BuildError::Parse { file: file.to_path_buf(), message: e.to_string() })?;
        Ok(Self::from_node(doc.root_element(), file))
    }

    fn from_node(node: roxmltree::Node, file: &Path) -> Self {
        let pos = node.document().text_pos_at(node.range().start);
        let mut element = Self::new(node.tag_name().name(), Location::new(file, pos.row, pos.col));

        element.attributes = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();

        for child in node.children() {
            if child.is_element() {
                element.children.push(Self::from_node(child, file));
            } else if child.is_text() {
                element.text.push_str(child.text().unwrap_or(""));
            }
        }
        element
    }

    /// Attribute value by name, compared case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  XmlContext
// ═══════════════════════════════════════════════════════════════════════════════

/// Parsing state shared by a build file and everything it imports.
#[derive(Debug, Default)]
pub struct XmlContext {
    /// Every file whose parse has started, in order.  Never popped, so a
    /// file that was imported once is recognised later.
    import_stack: Vec<PathBuf>,
    /// Files currently being configured, innermost last.
    configurators: Vec<PathBuf>,
    implicit_target: Target,
    /// Names of the targets defined by the file being parsed.
    current_targets: Vec<String>,
}

impl XmlContext {
    pub fn import_stack(&self) -> &[PathBuf] {
        &self.import_stack
    }

    pub fn add_import(&mut self, file: PathBuf) {
        self.import_stack.push(file);
    }

    pub fn is_imported(&self, file: &Path) -> bool {
        self.import_stack.iter().any(|f| f == file)
    }

    /// The file whose elements are currently being configured or run.
    pub fn current_file(&self) -> Option<&Path> {
        self.configurators.last().map(PathBuf::as_path)
    }

    pub fn configurator_depth(&self) -> usize {
        self.configurators.len()
    }

    fn push_configurator(&mut self, file: PathBuf) {
        self.configurators.push(file);
    }

    fn pop_configurator(&mut self) {
        self.configurators.pop();
    }

    pub fn implicit_target(&self) -> &Target {
        &self.implicit_target
    }

    pub fn implicit_target_mut(&mut self) -> &mut Target {
        &mut self.implicit_target
    }

    pub fn set_implicit_target(&mut self, target: Target) -> Target {
        std::mem::replace(&mut self.implicit_target, target)
    }

    pub fn current_targets(&self) -> &[String] {
        &self.current_targets
    }

    pub fn set_current_targets(&mut self, targets: Vec<String>) -> Vec<String> {
        std::mem::replace(&mut self.current_targets, targets)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ProjectConfigurator
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    NotStarted,
    Parsing,
    Complete,
}

/// Parses one build file into a [`Project`].
#[derive(Debug)]
pub struct ProjectConfigurator {
    build_file: PathBuf,
    build_file_parent: PathBuf,
    /// Set for imported files: their `<project>` attributes are not applied.
    ignore_project_tag: bool,
    state: ParseState,
    parse_end_target: Target,
}

impl ProjectConfigurator {
    /// Parse `build_file` into `project`, then run its top-level elements.
    pub fn configure_project(project: &mut Project, build_file: impl AsRef<Path>) -> Result<()> {
        let mut configurator = Self::new(build_file)?;
        configurator.parse(project)
    }

    pub fn new(build_file: impl AsRef<Path>) -> Result<Self> {
        let build_file = build_file.as_ref();
        let build_file = fs::canonicalize(build_file).map_err(|e| BuildError::io(build_file, e))?;
        let build_file_parent = build_file.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            build_file,
            build_file_parent,
            ignore_project_tag: false,
            state: ParseState::NotStarted,
            parse_end_target: Target::implicit(),
        })
    }

    pub fn build_file(&self) -> &Path {
        &self.build_file
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_parsing(&self) -> bool {
        self.state == ParseState::Parsing
    }

    /// Queue an element to run after the whole file (and its implicit
    /// target) has been processed.
    pub fn delay_task_until_parse_end(&mut self, element: Rc<ElementNode>) {
        self.parse_end_target.add_element(element);
    }

    pub fn parse(&mut self, project: &mut Project) -> Result<()> {
        if project.xml_context().is_none_or(|ctx| ctx.import_stack().is_empty()) {
            let file = self.build_file.display().to_string();
            let dir = self.build_file_parent.display().to_string();
            project.set_user_property("phing.file", file.as_str())?;
            project.set_user_property("phing.dir", dir.as_str())?;
        }

        let ctx = project.xml_context_mut();
        ctx.add_import(self.build_file.clone());
        ctx.push_configurator(self.build_file.clone());
        let nested = ctx.import_stack().len() > 1;

        let result = if nested {
            self.parse_nested(project)
        } else {
            self.parse_root(project)
        };

        let result = result.and_then(|()| {
            log::debug!("Running {} parse-end task(s)", self.parse_end_target.elements.len());
            project.perform_elements(&self.parse_end_target.elements)
        });
        project.xml_context_mut().pop_configurator();
        result
    }

    fn parse_root(&mut self, project: &mut Project) -> Result<()> {
        let ctx = project.xml_context_mut();
        ctx.set_implicit_target(Target::implicit());
        ctx.set_current_targets(Vec::new());

        self.parse_file(project)?;

        let elements = project.xml_context_mut().implicit_target().elements.clone();
        project.perform_elements(&elements)
    }

    /// Imported files collect into their own implicit target; the
    /// importer's is restored before the imported top-level elements run.
    fn parse_nested(&mut self, project: &mut Project) -> Result<()> {
        self.ignore_project_tag = true;
        let ctx = project.xml_context_mut();
        let saved_implicit = ctx.set_implicit_target(Target::implicit());
        let saved_targets = ctx.set_current_targets(Vec::new());

        let parsed = self.parse_file(project);

        let ctx = project.xml_context_mut();
        let implicit = ctx.set_implicit_target(saved_implicit);
        ctx.set_current_targets(saved_targets);

        parsed?;
        project.perform_elements(&implicit.elements)
    }

    fn parse_file(&mut self, project: &mut Project) -> Result<()> {
        log::debug!("Parsing {}", self.build_file.display());
        let source = fs::read_to_string(&self.build_file).map_err(|e| BuildError::io(&self.build_file, e))?;
        let root = ElementNode::parse(&source, &self.build_file)?;

        self.state = ParseState::Parsing;
        let result = self.handle_project(project, root);
        self.state = ParseState::Complete;
        result
    }

    // ─── <project> ───────────────────────────────────────────────────────

    fn handle_project(&mut self, project: &mut Project, root: ElementNode) -> Result<()> {
        if root.tag != "project" {
            return Err(BuildError::at(
                format!("Unexpected element '{}'; expected <project>", root.tag),
                root.location,
            ));
        }

        let mut name = None;
        let mut default = None;
        let mut basedir = None;
        let mut description = None;
        for (key, value) in &root.attributes {
            match key.to_ascii_lowercase().as_str() {
                "name" => name = Some(value.clone()),
                "default" => default = Some(value.clone()),
                "basedir" => basedir = Some(value.clone()),
                "description" => description = Some(value.clone()),
                "phingversion" | "strict" => log::debug!("Ignoring <project> attribute '{key}'"),
                _ => {
                    return Err(BuildError::at(
                        format!("Unexpected attribute '{key}' on <project>"),
                        root.location.clone(),
                    ));
                }
            }
        }

        if !self.ignore_project_tag {
            if let Some(name) = &name {
                project.set_name(name.as_str())?;
            }
            if let Some(default) = default {
                project.set_default_target(default);
            }
            if let Some(description) = description {
                project.set_description(description);
            }
            let basedir = match basedir {
                Some(dir) => self.build_file_parent.join(dir),
                None => self.build_file_parent.clone(),
            };
            project.set_basedir(basedir)?;
        }

        if let Some(name) = &name {
            let file = self.build_file.display().to_string();
            project.set_new_property(&format!("phing.file.{name}"), file.as_str())?;
        }

        for child in root.children {
            match child.tag.as_str() {
                "target" => self.handle_target(project, child, name.as_deref())?,
                "description" => {
                    if !self.ignore_project_tag {
                        project.set_description(child.text.trim());
                    }
                }
                _ => self.handle_top_level(project, child),
            }
        }
        Ok(())
    }

    // ─── <target> ────────────────────────────────────────────────────────

    fn handle_target(&mut self, project: &mut Project, element: ElementNode, project_name: Option<&str>) -> Result<()> {
        let location = element.location.clone();
        let mut target = Target::new("");
        target.location = Some(location.clone());

        let mut depends = None;
        for (key, value) in &element.attributes {
            match key.to_ascii_lowercase().as_str() {
                "name" => target.name = value.clone(),
                "depends" => depends = Some(value.clone()),
                "if" => target.if_condition = Some(value.clone()),
                "unless" => target.unless_condition = Some(value.clone()),
                "description" => target.description = Some(value.clone()),
                "hidden" => target.hidden = to_boolean(value),
                _ => {
                    return Err(BuildError::at(format!("Unexpected attribute '{key}' on <target>"), location));
                }
            }
        }

        if target.name.is_empty() {
            return Err(BuildError::at("target element appears without a name attribute", location));
        }
        if let Some(depends) = depends {
            target.set_depends(&depends).map_err(|e| e.with_location(location.clone()))?;
        }
        for child in element.children {
            target.add_element(Rc::new(child));
        }

        let name = target.name.clone();
        let ctx = project.xml_context_mut();
        if ctx.current_targets().contains(&name) {
            return Err(BuildError::at(format!("Duplicate target '{name}'"), location));
        }
        ctx.current_targets.push(name.clone());

        if self.ignore_project_tag {
            if let Some(prefix) = project_name {
                let alias = format!("{prefix}.{name}");
                if !project.has_target(&alias) {
                    let mut prefixed = target.clone();
                    prefixed.name = alias;
                    project.add_target(prefixed);
                }
            }
            if project.has_target(&name) {
                log::debug!("Already defined in main or a previous import, ignore {name}");
                return Ok(());
            }
        } else if project.has_target(&name) {
            return Err(BuildError::at(format!("Duplicate target '{name}'"), location));
        }
        project.add_target(target);
        Ok(())
    }

    // ─── Top-level elements ──────────────────────────────────────────────

    fn handle_top_level(&mut self, project: &mut Project, element: ElementNode) {
        let element = Rc::new(element);
        if project.registry().is_deferred(&element.tag) {
            self.delay_task_until_parse_end(element);
        } else {
            project.xml_context_mut().implicit_target_mut().add_element(element);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Static helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Push `element`'s attributes, text and children into `target`.
///
/// Attribute values are property-expanded; a whole-value `%{key}` passes the
/// register slot instead.  `id` is skipped (see [`configure_id`]).  Errors
/// pick up the location of the element they came from.
pub fn configure<C>(target: &mut C, element: &ElementNode, project: &mut Project) -> Result<()>
where
    C: Configurable + ?Sized,
{
    let location = &element.location;

    for (name, raw) in &element.attributes {
        if name.eq_ignore_ascii_case("id") {
            continue;
        }
        let value = match slot_var(raw) {
            Some(key) => AttributeValue::Slot(project.register_mut().slot(key)),
            None => AttributeValue::Text(project.replace_properties(raw).map_err(|e| e.with_location(location.clone()))?),
        };
        target
            .set_attribute(&name.to_ascii_lowercase(), value)
            .map_err(|e| e.with_location(location.clone()))?;
    }

    add_text(project, target, &element.text).map_err(|e| e.with_location(location.clone()))?;

    for child in &element.children {
        let mut object = target
            .create_child(&child.tag)
            .map_err(|e| e.with_location(child.location.clone()))?;
        configure(&mut *object, child, project)?;
        configure_id(project, &*object, child);
        store_child(project, target, object, &child.tag).map_err(|e| e.with_location(child.location.clone()))?;
    }
    Ok(())
}

/// Hand non-blank character data to `target`, expanded but otherwise as written.
pub fn add_text<C>(project: &Project, target: &mut C, text: &str) -> Result<()>
where
    C: Configurable + ?Sized,
{
    if text.trim().is_empty() {
        return Ok(());
    }
    let text = project.replace_properties(text)?;
    target.add_text(&text)
}

/// Attach a configured child to its parent.
pub fn store_child<C>(project: &Project, parent: &mut C, child: Box<dyn DataType>, tag: &str) -> Result<()>
where
    C: Configurable + ?Sized,
{
    log::trace!("Storing <{tag}> in <{}> of project '{}'", parent.element_name(), project.name());
    parent.store_child(tag, child)
}

/// Register a copy of `value` under the element's `id`, if it has one.
pub fn configure_id(project: &mut Project, value: &dyn DataType, element: &ElementNode) {
    if let Some(id) = element.attribute("id") {
        project.log(&format!("Registering reference '{id}' for <{}>", element.tag), LogLevel::Debug);
        project.add_reference(id, Rc::from(value.clone_box()));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
