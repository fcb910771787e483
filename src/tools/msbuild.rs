//! Building selected targets of a Visual Studio solution.
//!
//! Only the named projects are built, never the whole solution, so
//! unrelated projects in a large tree are left alone.

use std::path::{Path, PathBuf};

use super::{Arch, Tool};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::process::{Cmd, Env};

#[derive(Debug, Clone)]
pub struct MsBuild {
    solution: PathBuf,
    projects: Vec<String>,
    configuration: String,
    arch: Arch,
}

impl Default for MsBuild {
    fn default() -> Self {
        Self {
            solution: PathBuf::new(),
            projects: Vec::new(),
            configuration: "Release".to_string(),
            arch: Arch::default(),
        }
    }
}

impl MsBuild {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solution(mut self, sln: impl Into<PathBuf>) -> Self {
        self.solution = sln.into();
        self
    }

    pub fn projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = projects.into_iter().map(Into::into).collect();
        self
    }

    pub fn configuration(mut self, config: impl Into<String>) -> Self {
        self.configuration = config.into();
        self
    }

    pub fn architecture(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    fn platform(&self) -> Option<&'static str> {
        match self.arch {
            Arch::X86 => Some("Win32"),
            Arch::X64 => Some("x64"),
            Arch::DontCare => None,
        }
    }

    pub fn command(&self, msbuild: &Path, env: Env) -> Result<Cmd> {
        if self.solution.as_os_str().is_empty() {
            return Err(Error::empty("msbuild solution"));
        }
        if self.projects.is_empty() {
            return Err(Error::empty(format!(
                "msbuild targets for '{}'",
                self.solution.display()
            )));
        }
        let dir = self
            .solution
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::empty(format!("directory of solution '{}'", self.solution.display())))?;

        let mut cmd = Cmd::new(msbuild)
            .name("msbuild")
            .args([
                "-nologo",
                "-maxCpuCount",
                "-property:UseMultiToolTask=true",
                "-property:EnforceProcessCountAcrossBuilds=true",
            ])
            .arg(format!("-property:Configuration={}", self.configuration));

        if let Some(platform) = self.platform() {
            cmd = cmd.arg(format!("-property:Platform={platform}"));
        }

        // msbuild target names cannot contain dots
        let targets: Vec<String> = self.projects.iter().map(|p| p.replace('.', "_")).collect();
        cmd = cmd.arg(format!("-target:{}", targets.join(";")));

        Ok(cmd
            .arg("-verbosity:minimal")
            .arg_path(&self.solution)
            .env(env)
            .cwd(dir))
    }
}

impl Tool for MsBuild {
    type Output = ();

    fn name(&self) -> &str {
        "msbuild"
    }

    fn run(self, cx: &Context) -> Result<()> {
        let env = cx.toolchain().env(self.arch)?;
        self.command(&cx.tools().msbuild, env)?.run()?;
        Ok(())
    }
}
