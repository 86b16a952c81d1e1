//! Build failures and their source locations.
//!
//! Every failure raised while parsing, configuring or executing a build file
//! is a [`BuildError`].  Errors raised inside a task pick up the location of
//! the XML element that declared the task, and errors crossing an
//! `<import>` boundary are re-wrapped with the importing element's location
//! (see [`add_location_to_build_error`]) so the final message shows the whole
//! calling chain.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
//  Location
// ═══════════════════════════════════════════════════════════════════════════════

/// A position inside a build file (1-based line and column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self { file: file.into(), line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

fn prefix(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!("{loc} "),
        None => String::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  BuildError
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration or execution failure (missing attribute, unknown
    /// element, failing task, …).
    #[error("{}{message}", prefix(.location))]
    Build {
        message: String,
        location: Option<Location>,
        #[source]
        cause: Option<Box<BuildError>>,
    },

    /// A failure that asks the process to exit with a specific status.
    #[error("{}{message}", prefix(.location))]
    ExitStatus {
        message: String,
        status: i32,
        location: Option<Location>,
    },

    /// A `${name}` reference that (transitively) refers back to itself.
    #[error("Property {name} was circularly defined: {}", .chain.join(" => "))]
    CircularProperty { name: String, chain: Vec<String> },

    /// A build or property file that could not be read or written.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed XML.  The message carries the parser's line/column.
    #[error("{}: {message}", .file.display())]
    Parse { file: PathBuf, message: String },
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Build { message: message.into(), location: None, cause: None }
    }

    pub fn at(message: impl Into<String>, location: Location) -> Self {
        Self::Build { message: message.into(), location: Some(location), cause: None }
    }

    pub fn exit_status(message: impl Into<String>, status: i32) -> Self {
        Self::ExitStatus { message: message.into(), status, location: None }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source }
    }

    /// The location attached to this error, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Build { location, .. } | Self::ExitStatus { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// The message without the location prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Build { message, .. } | Self::ExitStatus { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Process exit status requested by this error (`1` unless it is an
    /// [`BuildError::ExitStatus`]).
    pub fn status(&self) -> i32 {
        match self {
            Self::ExitStatus { status, .. } => *status,
            _ => 1,
        }
    }

    /// Attach `location` unless the error already carries one.
    ///
    /// Errors without a location slot (I/O, parse, circular property) are
    /// converted into a located [`BuildError::Build`] keeping the original
    /// as the cause.
    pub fn with_location(self, location: Location) -> Self {
        match self {
            Self::Build { message, location: None, cause } => {
                Self::Build { message, location: Some(location), cause }
            }
            Self::ExitStatus { message, status, location: None } => {
                Self::ExitStatus { message, status, location: Some(location) }
            }
            err @ (Self::Build { .. } | Self::ExitStatus { .. }) => err,
            other => Self::Build {
                message: other.to_string(),
                location: Some(location),
                cause: Some(Box::new(other)),
            },
        }
    }
}

/// Re-wrap `err` so that its message shows where it was called from.
///
/// When the error already has a location the result reads
///
/// ```text
/// <new location> The following error occurred while executing this line:
/// <old location> <old message>
/// ```
///
/// Exit-status errors keep their status.  Errors without a location are
/// returned unchanged.
pub fn add_location_to_build_error(err: BuildError, new_location: Option<Location>) -> BuildError {
    let Some(old_location) = err.location().cloned() else {
        return err;
    };
    let message = format!(
        "The following error occurred while executing this line:\n{old_location} {}",
        err.message()
    );

    match err {
        BuildError::ExitStatus { status, .. } => {
            BuildError::ExitStatus { message, status, location: new_location }
        }
        other => BuildError::Build {
            message,
            location: new_location,
            cause: Some(Box::new(other)),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> Location {
        Location::new("build.xml", line, 5)
    }

    #[test]
    fn located_error_renders_location_first() {
        let err = BuildError::at("boom", loc(3));
        assert_eq!(err.to_string(), "build.xml:3:5 boom");
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn with_location_keeps_the_innermost_location() {
        let err = BuildError::at("boom", loc(3)).with_location(loc(10));
        assert_eq!(err.location(), Some(&loc(3)));

        let err = BuildError::new("boom").with_location(loc(10));
        assert_eq!(err.location(), Some(&loc(10)));
    }

    #[test]
    fn with_location_wraps_unlocated_kinds() {
        let err = BuildError::CircularProperty { name: "a".into(), chain: vec!["a".into()] }
            .with_location(loc(7));
        assert_eq!(err.location(), Some(&loc(7)));
        assert!(err.to_string().contains("circularly defined"));
    }

    #[test]
    fn io_errors_name_the_file_and_stay_a_distinct_kind() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = BuildError::io("conf/build.properties", source);
        assert!(matches!(err, BuildError::Io { .. }));
        assert_eq!(err.to_string(), "conf/build.properties: gone");

        let located = err.with_location(loc(4));
        let BuildError::Build { cause: Some(cause), .. } = &located else {
            panic!("expected a located build error, got {located:?}");
        };
        assert!(matches!(**cause, BuildError::Io { .. }));
    }

    #[test]
    fn add_location_builds_the_calling_chain() {
        let inner = BuildError::at("inner failure", loc(3));
        let outer = add_location_to_build_error(inner, Some(Location::new("main.xml", 12, 1)));

        assert_eq!(outer.location(), Some(&Location::new("main.xml", 12, 1)));
        assert_eq!(
            outer.to_string(),
            "main.xml:12:1 The following error occurred while executing this line:\nbuild.xml:3:5 inner failure"
        );
    }

    #[test]
    fn add_location_preserves_exit_status() {
        let inner = BuildError::exit_status("stop", 3).with_location(loc(2));
        let outer = add_location_to_build_error(inner, Some(loc(9)));
        assert_eq!(outer.status(), 3);
        assert!(matches!(outer, BuildError::ExitStatus { .. }));
    }

    #[test]
    fn add_location_ignores_unlocated_errors() {
        let outer = add_location_to_build_error(BuildError::new("plain"), Some(loc(1)));
        assert_eq!(outer.location(), None);
        assert_eq!(outer.to_string(), "plain");
    }
}
