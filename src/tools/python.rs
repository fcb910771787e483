//! Driving the Python interpreter and pip.
//!
//! Every invocation forces UTF-8 mode (`-X utf8` plus `PYTHONUTF8=1`) and
//! decodes both streams as UTF-8, whatever the host code page is.

use std::path::{Path, PathBuf};

use super::{exe_name, Tool};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::process::{Cmd, Encoding, Env, Filter};

/// Base interpreter command with UTF-8 mode forced on.
pub fn python(exe: &Path) -> Cmd {
    Cmd::new(exe)
        .name("python")
        .code_page(65001)
        .stdout_encoding(Encoding::Utf8)
        .stderr_encoding(Encoding::Utf8)
        .env(Env::new().set("PYTHONUTF8", "1"))
        .arg("-X")
        .arg("utf8")
}

/// Directories of an installed interpreter.
#[derive(Debug, Clone)]
pub struct PythonLayout {
    exe: PathBuf,
    home: PathBuf,
}

impl PythonLayout {
    /// Resolve the configured interpreter through `PATH`.
    pub fn resolve(python: &Path) -> Result<Self> {
        let exe = which::which(python).map_err(|_| Error::MissingTools {
            tools: vec![python.display().to_string()],
        })?;
        Self::from_exe(exe)
    }

    pub fn from_exe(exe: impl Into<PathBuf>) -> Result<Self> {
        let exe = exe.into();
        let bin = exe
            .parent()
            .ok_or_else(|| Error::empty(format!("directory of {}", exe.display())))?;
        // unix installs keep the interpreter in <home>/bin
        let home = if cfg!(windows) {
            bin.to_path_buf()
        } else {
            bin.parent().unwrap_or(bin).to_path_buf()
        };
        Ok(Self { exe, home })
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    pub fn scripts_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.home.join("Scripts")
        } else {
            self.home.join("bin")
        }
    }

    pub fn include_dir(&self) -> PathBuf {
        self.home.join("include")
    }

    pub fn script(&self, stem: &str) -> PathBuf {
        self.scripts_dir().join(exe_name(stem))
    }
}

/// `pip download` of a source distribution, without wheels or
/// dependencies.
#[derive(Debug, Clone)]
pub struct PipDownload {
    package: String,
    version: String,
    dest: PathBuf,
}

impl PipDownload {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            dest: PathBuf::new(),
        }
    }

    pub fn dest(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dest = dir.into();
        self
    }

    pub fn command(&self, exe: &Path) -> Result<Cmd> {
        if self.dest.as_os_str().is_empty() {
            return Err(Error::empty(format!("pip download directory for {}", self.package)));
        }
        Ok(python(exe)
            .arg("-m")
            .arg("pip")
            .args(["download", "--no-binary=:all:", "--no-deps"])
            .arg("-d")
            .arg_path(&self.dest)
            .arg(format!("{}=={}", self.package, self.version))
            .cwd(&self.dest))
    }
}

impl Tool for PipDownload {
    type Output = ();

    fn name(&self) -> &str {
        "pip download"
    }

    fn run(self, cx: &Context) -> Result<()> {
        let cmd = self.command(&cx.tools().python)?;
        std::fs::create_dir_all(&self.dest).map_err(|e| Error::io(&self.dest, e))?;
        cmd.run()?;
        Ok(())
    }
}

/// `python setup.py install` from a source tree.
#[derive(Clone)]
pub struct SetupInstall {
    source: PathBuf,
    stderr_filter: Option<Filter>,
}

impl SetupInstall {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            stderr_filter: None,
        }
    }

    pub fn stderr_filter(mut self, f: Filter) -> Self {
        self.stderr_filter = Some(f);
        self
    }

    pub fn command(&self, exe: &Path) -> Result<Cmd> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::empty("setup.py source directory"));
        }
        let mut cmd = python(exe).arg("setup.py").arg("install").cwd(&self.source);
        if let Some(f) = &self.stderr_filter {
            cmd = cmd.stderr_filter(f.clone());
        }
        Ok(cmd)
    }
}

impl Tool for SetupInstall {
    type Output = ();

    fn name(&self) -> &str {
        "setup.py install"
    }

    fn run(self, cx: &Context) -> Result<()> {
        self.command(&cx.tools().python)?.run()?;
        Ok(())
    }
}
