//! CMake build configuration.
//!
//! Generators are a closed set with a static descriptor each: the output
//! directory convention and the architecture flag. A free-form generator
//! string bypasses the table entirely.
//!
//! ```rust,ignore
//! use depsmith::tools::cmake::{CMake, Generator};
//!
//! let build_dir = run_tool(cx, CMake::new()
//!     .generator(Generator::Vs)
//!     .root(&source)
//!     .prefix(&install)
//!     .def("BUILD_SHARED_LIBS", "ON"))?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{Arch, Tool};
use crate::config::VisualStudio;
use crate::context::{Context, Reason};
use crate::error::{Error, IoContext, Result};
use crate::process::{ArgFlags, Cmd, Encoding, Env};
use crate::staging;

/// Warning silenced in every CMake-driven compile: characters that cannot
/// be represented in the current code page.
const EXTRA_CXXFLAGS: &str = "/wd4566";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generator {
    /// NMake Makefiles JOM, parallel and without an IDE.
    Jom,
    /// Visual Studio solution.
    Vs,
}

impl FromStr for Generator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jom" => Ok(Generator::Jom),
            "vs" => Ok(Generator::Vs),
            other => Err(Error::UnknownGenerator {
                generator: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generator::Jom => write!(f, "jom"),
            Generator::Vs => write!(f, "vs"),
        }
    }
}

/// Static description of one generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorInfo {
    pub id: Generator,
    /// Output directory base name.
    pub dir: &'static str,
    /// Name passed to `-G`; `None` for the IDE generator, whose name
    /// comes from the configured Visual Studio release.
    pub name: Option<&'static str>,
    /// `-A` value for 32-bit builds, empty if the generator takes none.
    pub x86: &'static str,
    /// `-A` value for 64-bit builds, empty if the generator takes none.
    pub x64: &'static str,
}

pub const GENERATORS: &[GeneratorInfo] = &[
    GeneratorInfo {
        id: Generator::Jom,
        dir: "build",
        name: Some("NMake Makefiles JOM"),
        x86: "",
        x64: "",
    },
    GeneratorInfo {
        id: Generator::Vs,
        dir: "vsbuild",
        name: None,
        x86: "Win32",
        x64: "x64",
    },
];

impl GeneratorInfo {
    pub fn get(g: Generator) -> Result<&'static GeneratorInfo> {
        GENERATORS
            .iter()
            .find(|info| info.id == g)
            .ok_or_else(|| Error::UnknownGenerator {
                generator: g.to_string(),
            })
    }

    /// `-G` value, using `vs` for the IDE generator.
    pub fn generator_name(&self, vs: &VisualStudio) -> String {
        match self.name {
            Some(name) => name.to_string(),
            None => vs.generator_name(),
        }
    }

    /// `-A <platform>` for `arch`, or nothing.
    pub fn arch_flags(&self, arch: Arch) -> Vec<String> {
        let platform = match arch {
            Arch::X86 => self.x86,
            Arch::X64 => self.x64,
            Arch::DontCare => "",
        };

        if platform.is_empty() {
            Vec::new()
        } else {
            vec!["-A".to_string(), platform.to_string()]
        }
    }

    /// Output directory name for `arch`. Generators that take an
    /// architecture flag get a `_32` suffix for 32-bit builds; the others
    /// always use the base name.
    pub fn output_dir(&self, arch: Arch) -> String {
        match arch {
            Arch::X86 if !self.x86.is_empty() => format!("{}_32", self.dir),
            _ => self.dir.to_string(),
        }
    }
}

/// Builder for one `cmake` configure run.
#[derive(Debug, Clone)]
pub struct CMake {
    generator: Generator,
    generator_name: Option<String>,
    visual_studio: Option<VisualStudio>,
    arch: Arch,
    root: PathBuf,
    output: Option<PathBuf>,
    prefix: Option<PathBuf>,
    defs: Vec<(String, String)>,
    cmd: Option<String>,
}

impl Default for CMake {
    fn default() -> Self {
        Self::new()
    }
}

impl CMake {
    pub fn new() -> Self {
        Self {
            generator: Generator::Jom,
            generator_name: None,
            visual_studio: None,
            arch: Arch::default(),
            root: PathBuf::new(),
            output: None,
            prefix: None,
            defs: Vec::new(),
            cmd: None,
        }
    }

    /// Delete the output directories of every generator, for both
    /// architectures, under `root`.
    pub fn clean(cx: &Context, root: &Path) -> Result<()> {
        cx.trace(Reason::Rebuild, "deleting all generator directories");

        for info in GENERATORS {
            for arch in Arch::CONCRETE {
                staging::delete_directory_optional(&root.join(info.output_dir(arch)))?;
            }
        }
        Ok(())
    }

    pub fn generator(mut self, g: Generator) -> Self {
        self.generator = g;
        self
    }

    /// Free-form `-G` value; overrides the generator table and suppresses
    /// the architecture flag.
    pub fn generator_name(mut self, name: impl Into<String>) -> Self {
        self.generator_name = Some(name.into());
        self
    }

    /// Visual Studio release for the IDE generator. When unset, running
    /// the tool uses the one in the settings.
    pub fn visual_studio(mut self, vs: VisualStudio) -> Self {
        self.visual_studio = Some(vs);
        self
    }

    pub fn architecture(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = Some(dir.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// `-Dname=value`.
    pub fn def(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.defs.push((name.to_string(), value.to_string()));
        self
    }

    /// `-Dname=path`.
    pub fn def_path(self, name: &str, path: &Path) -> Self {
        let value = path.display().to_string();
        self.def(name, value)
    }

    /// Positional argument replacing the default `..`.
    pub fn cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    /// Directory the configure step runs in and writes to.
    pub fn output_dir(&self) -> Result<PathBuf> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::empty("cmake root path"));
        }

        match &self.output {
            Some(dir) => Ok(dir.clone()),
            None => {
                let info = GeneratorInfo::get(self.generator)?;
                Ok(self.root.join(info.output_dir(self.arch)))
            }
        }
    }

    /// Materialize the command line without running it.
    pub fn command(&self, binary: &Path, toolchain_env: Env) -> Result<Cmd> {
        let output = self.output_dir()?;

        let mut cmd = Cmd::new(binary).name("cmake");
        for (name, value) in &self.defs {
            cmd = cmd.arg(format!("-D{name}={value}"));
        }

        cmd = cmd
            .stdout_encoding(Encoding::Utf8)
            .stderr_encoding(Encoding::Utf8)
            .arg("-DCMAKE_BUILD_TYPE=Release")
            .arg_with("-DCMAKE_INSTALL_MESSAGE=NEVER", ArgFlags::QUIET)
            .arg_pair("--log-level", "WARNING", ArgFlags::QUIET)
            .arg("--warn-unused-cli");

        cmd = match &self.generator_name {
            Some(name) => cmd.arg("-G").arg(name),
            None => {
                let info = GeneratorInfo::get(self.generator)?;
                let vs = self.visual_studio.clone().unwrap_or_default();
                cmd.arg("-G")
                    .arg(info.generator_name(&vs))
                    .args(info.arch_flags(self.arch))
            }
        };

        if let Some(prefix) = &self.prefix {
            cmd = cmd.arg_joined("-DCMAKE_INSTALL_PREFIX=", prefix.as_os_str());
        }

        cmd = cmd.arg(self.cmd.as_deref().unwrap_or(".."));

        Ok(cmd
            .env(toolchain_env.set("CXXFLAGS", EXTRA_CXXFLAGS))
            .cwd(output))
    }
}

impl Tool for CMake {
    type Output = PathBuf;

    fn name(&self) -> &str {
        "cmake"
    }

    /// Returns the output directory.
    fn run(mut self, cx: &Context) -> Result<PathBuf> {
        if self.visual_studio.is_none() {
            self.visual_studio = Some(cx.settings().visual_studio.clone());
        }
        let output = self.output_dir()?;
        let env = cx.toolchain().env(self.arch)?;
        let cmd = self.command(&cx.tools().cmake, env)?;

        std::fs::create_dir_all(&output).at(&output)?;
        cmd.run()?;
        Ok(output)
    }
}
