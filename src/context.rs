//! Per-task execution context.
//!
//! A [`Context`] bundles the read-only settings a task needs (paths, tool
//! binaries, versions, force flags) and carries the task name into every
//! log event. Tasks never reach for global state; two contexts with
//! different flags can drive the same task side by side.

use std::fmt;

use tracing::{debug, info};

use crate::config::{ForceFlags, Paths, Settings, Tools};
use crate::error::Result;
use crate::tools::toolchain::{Inherited, Toolchain, VcVars};

/// Why a log event was emitted; used as the `reason` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// A step was skipped because its output already exists.
    Bypass,
    /// Something is deleted because of force-redownload.
    Redownload,
    /// Something is ignored or deleted because of force-rebuild.
    Rebuild,
    /// Sources are deleted because of force-reextract.
    Reextract,
    /// Filesystem operation.
    Fs,
    /// External command.
    Cmd,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Bypass => write!(f, "bypass"),
            Reason::Redownload => write!(f, "redownload"),
            Reason::Rebuild => write!(f, "rebuild"),
            Reason::Reextract => write!(f, "reextract"),
            Reason::Fs => write!(f, "fs"),
            Reason::Cmd => write!(f, "cmd"),
        }
    }
}

pub struct Context<'a> {
    task: String,
    settings: &'a Settings,
    force: ForceFlags,
    toolchain: Box<dyn Toolchain + Send + Sync>,
}

impl<'a> Context<'a> {
    /// Context for `task`, using the flags stored in `settings`.
    pub fn new(task: &str, settings: &'a Settings) -> Self {
        let toolchain: Box<dyn Toolchain + Send + Sync> = match &settings.tools.vcvars {
            Some(script) => Box::new(VcVars::new(script.clone())),
            None => Box::new(Inherited),
        };

        Self {
            task: task.to_string(),
            settings,
            force: settings.force,
            toolchain,
        }
    }

    /// Replace the force flags for this context only.
    pub fn with_force(mut self, force: ForceFlags) -> Self {
        self.force = force;
        self
    }

    /// Replace the toolchain environment provider.
    pub fn with_toolchain(mut self, toolchain: impl Toolchain + Send + Sync + 'static) -> Self {
        self.toolchain = Box::new(toolchain);
        self
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn force(&self) -> ForceFlags {
        self.force
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn paths(&self) -> &Paths {
        &self.settings.paths
    }

    pub fn tools(&self) -> &Tools {
        &self.settings.tools
    }

    pub fn version(&self, name: &str) -> Result<&str> {
        self.settings.version(name)
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// Log a skip or force decision at info level.
    pub fn note(&self, reason: Reason, message: impl fmt::Display) {
        info!(task = %self.task, reason = %reason, "{}", message);
    }

    /// Log a low-importance event (file operations, command lines).
    pub fn trace(&self, reason: Reason, message: impl fmt::Display) {
        debug!(task = %self.task, reason = %reason, "{}", message);
    }
}
