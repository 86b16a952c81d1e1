//! Targets and their dependency order.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::configurator::ElementNode;
use crate::error::{BuildError, Location, Result};

/// A named unit of work: an ordered list of (not yet resolved) elements plus
/// the names of the targets that must run first.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub name: String,
    pub depends: Vec<String>,
    pub if_condition: Option<String>,
    pub unless_condition: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
    pub location: Option<Location>,
    pub elements: Vec<Rc<ElementNode>>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// The unnamed target collecting top-level elements.
    pub fn implicit() -> Self {
        Self::default()
    }

    pub fn is_implicit(&self) -> bool {
        self.name.is_empty()
    }

    pub fn add_element(&mut self, element: Rc<ElementNode>) {
        self.elements.push(element);
    }

    /// Parse a `depends` attribute: comma-separated, whitespace trimmed.
    /// An empty entry is an error.
    pub fn set_depends(&mut self, depends: &str) -> Result<()> {
        if depends.trim().is_empty() {
            return Ok(());
        }
        for dep in depends.split(',') {
            let dep = dep.trim();
            if dep.is_empty() {
                return Err(BuildError::new(format!(
                    "Syntax Error: depends attribute of target \"{}\" has an empty string as dependency.",
                    self.name
                )));
            }
            self.depends.push(dep.to_string());
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Dependency order
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Targets `root` depends on (transitively), dependencies first, ending with
/// `root`.  Dependencies are visited in declaration order.
pub fn topo_sort(root: &str, targets: &IndexMap<String, Target>, project_name: &str) -> Result<Vec<String>> {
    let mut marks = HashMap::new();
    let mut visiting = Vec::new();
    let mut order = Vec::new();
    visit(root, targets, project_name, &mut marks, &mut visiting, &mut order)?;
    Ok(order)
}

fn visit(
    name: &str,
    targets: &IndexMap<String, Target>,
    project_name: &str,
    marks: &mut HashMap<String, Mark>,
    visiting: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    let Some(target) = targets.get(name) else {
        let mut message = format!("Target \"{name}\" does not exist in the project \"{project_name}\".");
        if let Some(parent) = visiting.last() {
            message.push_str(&format!(" It is used from target \"{parent}\"."));
        }
        return Err(BuildError::new(message));
    };

    marks.insert(name.to_string(), Mark::Visiting);
    visiting.push(name.to_string());

    for dep in &target.depends {
        match marks.get(dep.as_str()) {
            None => visit(dep, targets, project_name, marks, visiting, order)?,
            Some(Mark::Visiting) => return Err(circular(dep, visiting)),
            Some(Mark::Visited) => {}
        }
    }

    visiting.pop();
    marks.insert(name.to_string(), Mark::Visited);
    order.push(name.to_string());
    Ok(())
}

/// `Circular dependency: a <- c <- b <- a`.
fn circular(end: &str, visiting: &[String]) -> BuildError {
    let mut chain = vec![end.to_string()];
    for name in visiting.iter().rev() {
        chain.push(name.clone());
        if name == end {
            break;
        }
    }
    BuildError::new(format!("Circular dependency: {}", chain.join(" <- ")))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
