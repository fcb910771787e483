//! Compiler environments per target architecture.
//!
//! Native builds on Windows need the environment `vcvarsall.bat` sets up
//! (INCLUDE, LIB, PATH to cl.exe, ...). [`VcVars`] captures it once per
//! architecture; [`Inherited`] leaves the current environment alone.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::Level;

use super::Arch;
use crate::error::Result;
use crate::process::{Cmd, Env, Filter, FilterLine};

pub trait Toolchain {
    /// Variables to layer over the inherited environment for `arch`.
    fn env(&self, arch: Arch) -> Result<Env>;
}

/// Use the process environment unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inherited;

impl Toolchain for Inherited {
    fn env(&self, _arch: Arch) -> Result<Env> {
        Ok(Env::new())
    }
}

/// Capture the environment produced by `vcvarsall.bat <arch>`.
pub struct VcVars {
    script: PathBuf,
    cache: Mutex<HashMap<Arch, Env>>,
}

impl VcVars {
    pub fn new(script: PathBuf) -> Self {
        Self {
            script,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Command that prints the environment for `arch`.
    pub fn command(&self, arch: Arch) -> Cmd {
        // `set` dumps every variable; none of it is worth logging above trace
        let quiet: Filter = Arc::new(|f: &mut FilterLine| f.level = Level::TRACE);

        let dir = self
            .script
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        Cmd::new("cmd.exe")
            .name("vcvars")
            .cwd(dir)
            .arg("/C")
            .arg_path(&self.script)
            .arg(vcvars_arch(arch))
            .args(["&&", "set"])
            .stdout_filter(quiet)
    }
}

impl Toolchain for VcVars {
    fn env(&self, arch: Arch) -> Result<Env> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(env) = cache.get(&arch) {
                return Ok(env.clone());
            }
        }

        let output = self.command(arch).run()?;
        let env = Env::parse_listing(&output.stdout);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(arch, env.clone());
        }
        Ok(env)
    }
}

fn vcvars_arch(arch: Arch) -> &'static str {
    match arch {
        Arch::X86 => "x86",
        Arch::X64 | Arch::DontCare => "amd64",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherited_is_empty() {
        assert!(Inherited.env(Arch::X86).unwrap().is_empty());
    }

    #[test]
    fn test_vcvars_command() {
        let v = VcVars::new(PathBuf::from("vcvarsall.bat"));
        assert_eq!(v.command(Arch::X86).display(), "cmd.exe /C vcvarsall.bat x86 && set");
        assert_eq!(v.command(Arch::DontCare).display(), "cmd.exe /C vcvarsall.bat amd64 && set");
        assert_eq!(v.command(Arch::X64).working_dir(), Some(Path::new(".")));
    }

    #[test]
    fn test_vcvars_runs_next_to_script() {
        let v = VcVars::new(PathBuf::from("/vs/VC/Auxiliary/Build/vcvarsall.bat"));
        assert_eq!(
            v.command(Arch::X64).working_dir(),
            Some(Path::new("/vs/VC/Auxiliary/Build"))
        );
    }
}
