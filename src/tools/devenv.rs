//! One-time Visual Studio solution upgrades (`devenv <sln> /upgrade`).
//!
//! devenv leaves `UpgradeLog.htm` next to an upgraded solution; its
//! presence marks the step as done.

use std::path::{Path, PathBuf};

use super::{Arch, Tool};
use crate::context::{Context, Reason};
use crate::error::{Error, Result};
use crate::process::{Cmd, Env};
use crate::task::{generate_decision, Decision, Outcome};

pub const UPGRADE_LOG: &str = "UpgradeLog.htm";

#[derive(Debug, Clone)]
pub struct DevenvUpgrade {
    solution: PathBuf,
}

impl DevenvUpgrade {
    pub fn new(solution: impl Into<PathBuf>) -> Self {
        Self {
            solution: solution.into(),
        }
    }

    fn solution_dir(&self) -> Result<&Path> {
        self.solution
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::empty(format!("directory of solution '{}'", self.solution.display())))
    }

    pub fn marker(&self) -> Result<PathBuf> {
        Ok(self.solution_dir()?.join(UPGRADE_LOG))
    }

    pub fn command(&self, devenv: &Path, env: Env) -> Result<Cmd> {
        if self.solution.as_os_str().is_empty() {
            return Err(Error::empty("devenv solution"));
        }

        Ok(Cmd::new(devenv)
            .name("devenv")
            .arg_path(&self.solution)
            .arg("/upgrade")
            .env(env)
            .cwd(self.solution_dir()?))
    }
}

impl Tool for DevenvUpgrade {
    type Output = Outcome;

    fn name(&self) -> &str {
        "devenv upgrade"
    }

    fn run(self, cx: &Context) -> Result<Outcome> {
        let marker = self.marker()?;

        match generate_decision(cx.force(), marker.exists()) {
            Decision::Skip => {
                cx.note(
                    Reason::Bypass,
                    format!("{} already upgraded", self.solution.display()),
                );
                return Ok(Outcome::Skipped);
            }
            Decision::RunIgnoring => {
                cx.note(Reason::Rebuild, format!("ignoring {}", marker.display()));
            }
            Decision::Run | Decision::Replace => {}
        }

        let env = cx.toolchain().env(Arch::X64)?;
        self.command(&cx.tools().devenv, env)?.run()?;
        Ok(Outcome::Ran)
    }
}
