//! INI-style property files.
//!
//! ```text
//! ; global section
//! build.dir = build
//! flags[] = -O2
//! flags[] = -g
//!
//! [top]
//! db.host = localhost
//!
//! [inherited : top]
//! db.host = db.example.org
//! long = first \
//!        second
//! ```
//!
//! The unnamed global section always applies first, then the requested
//! section's ancestors from the root down, then the section itself.  Later
//! values replace earlier ones for plain keys while `name[]` keys keep
//! accumulating.  The literals `true` / `false` are read as booleans.
//!
//! Each logical line is classified with a small [`chumsky`] grammar.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chumsky::prelude::*;

use crate::error::{BuildError, Result};
use crate::properties::{PropertySet, PropertySetImpl, PropertyValue};

// ═══════════════════════════════════════════════════════════════════════════════
//  Line grammar
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum Line<'a> {
    Blank,
    Section { name: &'a str, parent: Option<&'a str> },
    Assignment { key: &'a str, value: &'a str },
}

fn line_parser<'a>() -> impl Parser<'a, &'a str, Line<'a>, extra::Err<Simple<'a, char>>> {
    let ws = one_of(" \t").repeated();

    // ── `; comment` / `# comment` ────────────────────────────────────────
    let comment = ws
        .clone()
        .ignore_then(one_of(";#"))
        .ignore_then(any().repeated())
        .then_ignore(end())
        .to(Line::Blank);

    // ── `[name]` / `[name:parent]` ───────────────────────────────────────
    let section_name = none_of(":]").repeated().at_least(1).to_slice().map(str::trim);
    let parent_name = just(':')
        .ignore_then(none_of("]").repeated().to_slice().map(str::trim))
        .or_not();
    let section = ws
        .clone()
        .ignore_then(just('['))
        .ignore_then(section_name)
        .then(parent_name)
        .then_ignore(just(']'))
        .then_ignore(ws.clone())
        .then_ignore(end())
        .map(|(name, parent)| Line::Section {
            name,
            parent: parent.filter(|p| !p.is_empty()),
        });

    // ── `key = value` (split at the first `=`) ───────────────────────────
    let assignment = none_of("=")
        .repeated()
        .at_least(1)
        .to_slice()
        .then_ignore(just('='))
        .then(any().repeated().to_slice())
        .then_ignore(end())
        .map(|(key, value): (&'a str, &'a str)| Line::Assignment { key: key.trim(), value: value.trim() });

    let blank = ws.then_ignore(end()).to(Line::Blank);

    choice((comment, section, assignment, blank))
}

/// Strip the run of trailing backslashes from `text`.  An odd run continues
/// the line; each remaining pair stands for one literal backslash.
fn take_continuation(text: &mut String) -> bool {
    let run = text.len() - text.trim_end_matches('\\').len();
    text.truncate(text.len() - run);
    text.push_str(&"\\".repeat(run / 2));
    run % 2 == 1
}

/// Join backslash-continued physical lines into logical lines.
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let (start, mut text) = match pending.take() {
            Some((start, mut acc)) => {
                acc.push_str(raw.trim_start());
                (start, acc)
            }
            None => (line_no, raw.to_string()),
        };

        if take_continuation(&mut text) {
            pending = Some((start, text));
        } else {
            lines.push((start, text));
        }
    }

    if let Some(rest) = pending {
        lines.push(rest);
    }
    lines
}

fn in_value(raw: &str) -> PropertyValue {
    match raw {
        "true" => PropertyValue::Bool(true),
        "false" => PropertyValue::Bool(false),
        other => PropertyValue::Str(other.to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  PropertyFileReader
// ═══════════════════════════════════════════════════════════════════════════════

/// Section name → ordered `(key, value)` pairs, plus the parent links.
#[derive(Debug, Default)]
pub struct PropertyFileReader {
    sections: HashMap<String, Vec<(String, PropertyValue)>>,
    parents: HashMap<String, String>,
}

impl PropertyFileReader {
    /// Parse the **contents** of a property file.
    pub fn parse(content: &str) -> Self {
        let lines = logical_lines(content);
        let parser = line_parser();
        let mut reader = Self::default();
        let mut current = String::new();
        reader.sections.entry(current.clone()).or_default();

        for (line_no, text) in &lines {
            match parser.parse(text.as_str()).into_result() {
                Ok(Line::Blank) => {}
                Ok(Line::Section { name, parent }) => {
                    current = name.to_string();
                    reader.sections.entry(current.clone()).or_default();
                    if let Some(parent) = parent {
                        reader.parents.insert(current.clone(), parent.to_string());
                    }
                }
                Ok(Line::Assignment { key, value }) => {
                    reader
                        .sections
                        .entry(current.clone())
                        .or_default()
                        .push((key.to_string(), in_value(value)));
                }
                Err(_) => {
                    log::warn!("Ignoring malformed property line {line_no}: {text}");
                }
            }
        }

        reader
    }

    /// Read and parse a property file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        log::debug!("Loading property file {}", path.display());
        Ok(Self::parse(&content))
    }

    /// Section names in the order they must be applied for `section`:
    /// global first, then the root ancestor down to `section` itself.
    pub fn section_order(&self, section: Option<&str>) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut current = section.filter(|s| !s.is_empty()).map(str::to_string);

        while let Some(name) = current {
            if chain.contains(&name) {
                chain.push(name);
                return Err(BuildError::new(format!(
                    "Section inheritance cycle: {}",
                    chain.join(" => ")
                )));
            }
            current = self.parents.get(&name).cloned();
            chain.push(name);
        }

        chain.retain(|name| {
            let known = self.sections.contains_key(name);
            if !known {
                log::debug!("Property file has no section [{name}]");
            }
            known
        });
        chain.reverse();
        chain.insert(0, String::new());
        Ok(chain)
    }

    /// Apply the pairs of `section` (and its ancestors) onto `target`.
    pub fn apply(&self, section: Option<&str>, target: &mut dyn PropertySet) -> Result<()> {
        for name in self.section_order(section)? {
            for (key, value) in self.sections.get(&name).into_iter().flatten() {
                target.set(key, value.clone())?;
            }
        }
        Ok(())
    }

    /// Convenience: the resolved properties for `section` as a new set.
    pub fn properties(&self, section: Option<&str>) -> Result<PropertySetImpl> {
        let mut props = PropertySetImpl::new();
        self.apply(section, &mut props)?;
        Ok(props)
    }

    /// Read `path` and resolve `section` in one step.
    pub fn load(path: impl AsRef<Path>, section: Option<&str>) -> Result<PropertySetImpl> {
        Self::from_file(path)?.properties(section)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  PropertyFileWriter
// ═══════════════════════════════════════════════════════════════════════════════

/// Serialise a property set into the format [`PropertyFileReader`] reads.
#[derive(Debug, Default)]
pub struct PropertyFileWriter {
    header: Option<String>,
}

impl PropertyFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Render the file contents.  Values spanning several lines cannot be
    /// represented and are rejected.
    pub fn render(&self, props: &PropertySetImpl) -> Result<String> {
        let mut out = String::new();
        if let Some(header) = &self.header {
            for line in header.lines() {
                let _ = writeln!(out, "# {line}");
            }
        }

        for (key, value) in props.iter() {
            match value {
                PropertyValue::Array(items) => {
                    let dense = items.keys().enumerate().all(|(i, k)| *k == i.to_string());
                    for (index, item) in items {
                        let item = escape_value(key, &item.to_string())?;
                        if dense {
                            let _ = writeln!(out, "{key}[]={item}");
                        } else {
                            let _ = writeln!(out, "{key}[{index}]={item}");
                        }
                    }
                }
                scalar => {
                    let _ = writeln!(out, "{key}={}", escape_value(key, &scalar.to_string())?);
                }
            }
        }
        Ok(out)
    }

    /// Write `props` to `path`.
    pub fn store(&self, props: &PropertySetImpl, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        std::fs::write(path, self.render(props)?).map_err(|e| BuildError::io(path, e))?;
        log::debug!("Wrote {} properties to {}", props.len(), path.display());
        Ok(path.to_path_buf())
    }
}

/// Double a trailing backslash run so the reader does not take it for a
/// continuation.
fn escape_value(key: &str, value: &str) -> Result<String> {
    if value.contains(['\n', '\r']) {
        return Err(BuildError::new(format!(
            "Cannot write property '{key}': its value spans several lines"
        )));
    }
    let run = value.len() - value.trim_end_matches('\\').len();
    Ok(format!("{value}{}", "\\".repeat(run)))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
