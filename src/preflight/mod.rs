//! Preflight checks run before any task.
//!
//! Verifies that every tool the selected tasks drive can be found, so a
//! missing `msbuild` fails in a second instead of halfway through a
//! build.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use depsmith::preflight::{check_required_tools, command_exists};
//!
//! if !command_exists(Path::new("git")) {
//!     println!("git not installed");
//! }
//!
//! let tools = [("git", Path::new("git")), ("python", Path::new("python3"))];
//! if let Err(e) = check_required_tools(&tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use std::path::Path;

use tracing::debug;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::task::Task;

/// Check if a command resolves, either as a path or through `PATH`.
pub fn command_exists(cmd: &Path) -> bool {
    crate::process::exists(cmd)
}

/// Check that every `(name, binary)` resolves.
///
/// The error lists each missing tool with the binary that was searched
/// for.
pub fn check_required_tools(tools: &[(&str, &Path)]) -> Result<()> {
    let mut missing = Vec::new();

    for (name, binary) in tools {
        if command_exists(binary) {
            debug!(tool = %name, binary = %binary.display(), "found");
        } else {
            missing.push(format!("  {} (looked for: {})", name, binary.display()));
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingTools { tools: missing })
    }
}

/// Check the tools needed by `tasks`, as configured in `settings`.
pub fn check_tasks(settings: &Settings, tasks: &[&dyn Task]) -> Result<()> {
    let configured = settings.tools.binaries();
    let mut needed: Vec<(&str, &Path)> = Vec::new();

    for task in tasks {
        for tool in task.required_tools() {
            if needed.iter().any(|(n, _)| n == tool) {
                continue;
            }
            if let Some((name, binary)) = configured.iter().find(|(n, _)| n == tool) {
                needed.push((*name, *binary));
            }
        }
    }

    if let Some(script) = &settings.tools.vcvars {
        if !script.is_file() {
            return Err(Error::MissingTools {
                tools: vec![format!("  vcvars (looked for: {})", script.display())],
            });
        }
    }

    check_required_tools(&needed)
}
