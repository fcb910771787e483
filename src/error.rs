//! Error types for depsmith.
//!
//! Errors fall into two classes:
//! - **configuration** errors (empty required path, unknown generator,
//!   malformed version, bad settings file) abort the enclosing task at once
//! - **tool-execution** errors (non-zero exit code, spawn failure, I/O
//!   failure while staging files) propagate as a task failure
//!
//! Neither class is retried here. Whoever drives the task decides whether
//! to run it again.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{what} is empty")]
    EmptyPath { what: String },

    #[error("unknown generator '{generator}'")]
    UnknownGenerator { generator: String },

    #[error("bad {component} version '{version}', expected MAJOR.MINOR[.PATCH]")]
    BadVersion { component: String, version: String },

    #[error("don't know how to extract '{}'", path.display())]
    UnsupportedArchive { path: PathBuf },

    #[error("unknown task '{name}'")]
    UnknownTask { name: String },

    #[error("invalid config '{}': {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("missing required tools:\n{}", tools.join("\n"))]
    MissingTools { tools: Vec<String> },

    #[error("{tool} failed ({}): {}", exit_code_display(*code), binary.display())]
    ToolFailed {
        tool: String,
        binary: PathBuf,
        code: Option<i32>,
    },

    #[error("failed to start '{}'", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' cannot be represented in {encoding}", path.display())]
    Encoding { path: PathBuf, encoding: String },
}

impl Error {
    /// True for misconfiguration and programmer errors, false for failures
    /// reported by an external tool or the filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::EmptyPath { .. }
                | Error::UnknownGenerator { .. }
                | Error::BadVersion { .. }
                | Error::UnsupportedArchive { .. }
                | Error::UnknownTask { .. }
                | Error::Config { .. }
                | Error::MissingTools { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn empty(what: impl Into<String>) -> Self {
        Error::EmptyPath { what: what.into() }
    }
}

fn exit_code_display(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated by signal".to_string(),
    }
}

/// Attach a path to a raw `std::io::Result`.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
