//! Build events.
//!
//! A [`BuildListener`] is told when the build, each target and each task
//! start and finish, and receives every message the project logs.  All
//! methods have empty defaults so a listener only implements what it needs.

use std::fmt;
use std::str::FromStr;

use crate::error::BuildError;

/// Message priority, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Verbose => log::Level::Debug,
            LogLevel::Debug => log::Level::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "verbose" => Ok(Self::Verbose),
            "debug" => Ok(Self::Debug),
            other => Err(BuildError::new(format!("Unknown log level '{other}'"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warn => "warning",
            Self::Info => "info",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
        };
        f.write_str(name)
    }
}

pub trait BuildListener {
    fn build_started(&mut self) {}

    fn build_finished(&mut self, _error: Option<&BuildError>) {}

    fn target_started(&mut self, _target: &str) {}

    fn target_finished(&mut self, _target: &str, _error: Option<&BuildError>) {}

    fn task_started(&mut self, _task: &str) {}

    fn task_finished(&mut self, _task: &str, _error: Option<&BuildError>) {}

    fn message_logged(&mut self, _level: LogLevel, _message: &str) {}
}
