//! Engine-independent regular expressions.
//!
//! Build files write patterns and replacements in one syntax regardless of
//! the engine underneath: backreferences in replacements are written `\1`,
//! and patterns may contain `/` freely.  [`Regexp`] holds the pattern,
//! replacement and modifiers; a [`RegexpEngine`] does the matching.
//! [`RegexEngine`] is the implementation backed by the `regex` crate.

use regex::{Regex, RegexBuilder};

use crate::error::{BuildError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════════════════════

pub trait RegexpEngine {
    fn set_ignore_case(&mut self, ignore_case: bool);

    fn ignore_case(&self) -> bool;

    fn set_multiline(&mut self, multiline: bool);

    fn multiline(&self) -> bool;

    /// Perl-style modifier letters (`i`, `m`, `s`, `x`).
    fn set_modifiers(&mut self, modifiers: &str) -> Result<()>;

    fn modifiers(&self) -> String;

    /// Maximum number of replacements; negative means unlimited.
    fn set_limit(&mut self, limit: i64);

    /// Match `subject`; `Some(groups)` on success where `groups[0]` is the
    /// whole match and non-participating groups are `None`.
    fn matches(&self, pattern: &str, subject: &str) -> Result<Option<Vec<Option<String>>>>;

    fn replace(&self, pattern: &str, replace: &str, subject: &str) -> Result<String>;
}

/// [`RegexpEngine`] on top of the `regex` crate.
#[derive(Debug, Clone)]
pub struct RegexEngine {
    ignore_case: bool,
    multiline: bool,
    dot_all: bool,
    extended: bool,
    limit: i64,
    delimiter: char,
}

impl Default for RegexEngine {
    fn default() -> Self {
        Self {
            ignore_case: false,
            multiline: false,
            dot_all: false,
            extended: false,
            limit: -1,
            delimiter: '/',
        }
    }
}

impl RegexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backslash any occurrence of the delimiter that is not already
    /// escaped.  An odd run of backslashes before it means it is.
    pub fn escape_delimiter(&self, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 2);
        let mut backslashes = 0usize;

        for c in pattern.chars() {
            if c == self.delimiter && backslashes % 2 == 0 {
                out.push('\\');
            }
            out.push(c);
            backslashes = if c == '\\' { backslashes + 1 } else { 0 };
        }
        out
    }

    /// The full expression as it would be written with delimiters,
    /// e.g. `/a\/b/im`.
    pub fn expression(&self, pattern: &str) -> String {
        format!(
            "{d}{}{d}{}",
            self.escape_delimiter(pattern),
            self.modifiers(),
            d = self.delimiter
        )
    }

    fn compile(&self, pattern: &str) -> Result<Regex> {
        let escaped = self.escape_delimiter(pattern);
        log::trace!("Compiling regular expression {}", self.expression(pattern));
        RegexBuilder::new(&escaped)
            .case_insensitive(self.ignore_case)
            .multi_line(self.multiline)
            .dot_matches_new_line(self.dot_all)
            .ignore_whitespace(self.extended)
            .build()
            .map_err(|e| {
                BuildError::new(format!("Invalid regular expression {}: {e}", self.expression(pattern)))
            })
    }
}

/// `\1` → `${1}`; a literal `$` is protected as `$$`.
fn normalize_replacement(replace: &str) -> String {
    let mut out = String::with_capacity(replace.len());
    let mut chars = replace.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{digits}}}"));
            }
            '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{digits}}}"));
            }
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }
    out
}

impl RegexpEngine for RegexEngine {
    fn set_ignore_case(&mut self, ignore_case: bool) {
        self.ignore_case = ignore_case;
    }

    fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    fn set_multiline(&mut self, multiline: bool) {
        self.multiline = multiline;
    }

    fn multiline(&self) -> bool {
        self.multiline
    }

    fn set_modifiers(&mut self, modifiers: &str) -> Result<()> {
        for m in modifiers.chars() {
            match m {
                'i' => self.ignore_case = true,
                'm' => self.multiline = true,
                's' => self.dot_all = true,
                'x' => self.extended = true,
                other => {
                    return Err(BuildError::new(format!("Unsupported regular expression modifier '{other}'")));
                }
            }
        }
        Ok(())
    }

    fn modifiers(&self) -> String {
        [
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.extended, 'x'),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, m)| *m)
        .collect()
    }

    fn set_limit(&mut self, limit: i64) {
        self.limit = limit;
    }

    fn matches(&self, pattern: &str, subject: &str) -> Result<Option<Vec<Option<String>>>> {
        let regex = self.compile(pattern)?;
        Ok(regex.captures(subject).map(|caps| {
            caps.iter()
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect()
        }))
    }

    fn replace(&self, pattern: &str, replace: &str, subject: &str) -> Result<String> {
        let regex = self.compile(pattern)?;
        let replacement = normalize_replacement(replace);
        let result = match self.limit {
            limit if limit < 0 => regex.replace_all(subject, replacement.as_str()),
            0 => return Ok(subject.to_string()),
            limit => regex.replacen(subject, limit as usize, replacement.as_str()),
        };
        Ok(result.into_owned())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Regexp
// ═══════════════════════════════════════════════════════════════════════════════

/// Pattern + replacement state on top of an engine.
pub struct Regexp {
    engine: Box<dyn RegexpEngine>,
    pattern: Option<String>,
    replace: Option<String>,
    groups: Vec<Option<String>>,
}

impl Default for Regexp {
    fn default() -> Self {
        Self::new()
    }
}

impl Regexp {
    pub fn new() -> Self {
        Self::with_engine(Box::new(RegexEngine::new()))
    }

    pub fn with_engine(engine: Box<dyn RegexpEngine>) -> Self {
        Self { engine, pattern: None, replace: None, groups: Vec::new() }
    }

    pub fn set_pattern(&mut self, pattern: impl Into<String>) {
        self.pattern = Some(pattern.into());
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn set_replace(&mut self, replace: impl Into<String>) {
        self.replace = Some(replace.into());
    }

    pub fn replace_text(&self) -> Option<&str> {
        self.replace.as_deref()
    }

    pub fn set_ignore_case(&mut self, ignore_case: bool) {
        self.engine.set_ignore_case(ignore_case);
    }

    pub fn set_multiline(&mut self, multiline: bool) {
        self.engine.set_multiline(multiline);
    }

    pub fn set_modifiers(&mut self, modifiers: &str) -> Result<()> {
        self.engine.set_modifiers(modifiers)
    }

    pub fn set_limit(&mut self, limit: i64) {
        self.engine.set_limit(limit);
    }

    /// Whether `subject` matches.  Captured groups become available
    /// through [`group`](Self::group).
    pub fn matches(&mut self, subject: &str) -> Result<bool> {
        let pattern = self
            .pattern
            .as_deref()
            .ok_or_else(|| BuildError::new("No pattern specified for regular expression match"))?;
        match self.engine.matches(pattern, subject)? {
            Some(groups) => {
                self.groups = groups;
                Ok(true)
            }
            None => {
                self.groups.clear();
                Ok(false)
            }
        }
    }

    pub fn replace(&self, subject: &str) -> Result<String> {
        let (Some(pattern), Some(replace)) = (self.pattern.as_deref(), self.replace.as_deref()) else {
            return Err(BuildError::new(
                "Missing pattern or replacement for regular expression replace",
            ));
        };
        self.engine.replace(pattern, replace, subject)
    }

    /// Group `index` of the last successful match; `None` when the group did
    /// not take part in it.
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    pub fn groups(&self) -> &[Option<String>] {
        &self.groups
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
