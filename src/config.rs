//! Settings loaded from `depsmith.toml`.
//!
//! ```toml
//! [paths]
//! prefix = "C:/dev/deps"
//!
//! [tools]
//! cmake = "C:/Program Files/CMake/bin/cmake.exe"
//!
//! [visual_studio]
//! version = "16"
//! year = "2019"
//!
//! [versions]
//! lz4 = "v1.9.2"
//! sip = "5.1.1"
//! pyqt_sip = "12.7.2"
//!
//! [options]
//! redownload = false
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default settings file name, looked up in the current directory first.
pub const SETTINGS_FILENAME: &str = "depsmith.toml";

/// Process-wide overrides that disable skip decisions.
///
/// Set once at startup and passed down by value; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ForceFlags {
    /// Delete existing downloads and clones, fetch again.
    pub redownload: bool,
    /// Ignore completion markers and rerun generation steps.
    pub rebuild: bool,
    /// Delete extracted sources entirely.
    pub reextract: bool,
}

impl ForceFlags {
    /// Combine two flag sets, a flag is set if either side sets it.
    pub fn union(self, other: ForceFlags) -> ForceFlags {
        ForceFlags {
            redownload: self.redownload || other.redownload,
            rebuild: self.rebuild || other.rebuild,
            reextract: self.reextract || other.reextract,
        }
    }
}

/// Visual Studio release targeted by IDE-project builds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VisualStudio {
    /// Major version, e.g. `16`.
    pub version: String,
    /// Marketing year, e.g. `2019`.
    pub year: String,
}

impl Default for VisualStudio {
    fn default() -> Self {
        Self {
            version: "16".to_string(),
            year: "2019".to_string(),
        }
    }
}

impl VisualStudio {
    /// Name of the matching cmake generator, `Visual Studio 16 2019`.
    pub fn generator_name(&self) -> String {
        format!("Visual Studio {} {}", self.version, self.year)
    }
}

/// Resolved directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub prefix: PathBuf,
    /// Shared build tree, one `<package>-<version>` directory per task.
    pub build: PathBuf,
    /// Shared download cache, `<package>-<version>.<ext>`.
    pub cache: PathBuf,
    pub install_bin: PathBuf,
    pub install_pdbs: PathBuf,
    pub install_include: PathBuf,
}

impl Paths {
    /// Derive every directory from `prefix`.
    pub fn under(prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        Self {
            build: prefix.join("build"),
            cache: prefix.join("downloads"),
            install_bin: prefix.join("install").join("bin"),
            install_pdbs: prefix.join("install").join("pdb"),
            install_include: prefix.join("install").join("include"),
            prefix,
        }
    }
}

/// External programs, each either an absolute path or a name looked up on PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub cmake: PathBuf,
    pub git: PathBuf,
    pub msbuild: PathBuf,
    pub devenv: PathBuf,
    pub python: PathBuf,
    /// `vcvarsall.bat`; when unset the inherited environment is used as-is.
    pub vcvars: Option<PathBuf>,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            cmake: PathBuf::from("cmake"),
            git: PathBuf::from("git"),
            msbuild: PathBuf::from("msbuild"),
            devenv: PathBuf::from("devenv"),
            python: PathBuf::from("python"),
            vcvars: None,
        }
    }
}

impl Tools {
    /// All configured binaries with their logical names, for preflight.
    pub fn binaries(&self) -> Vec<(&'static str, &Path)> {
        vec![
            ("cmake", self.cmake.as_path()),
            ("git", self.git.as_path()),
            ("msbuild", self.msbuild.as_path()),
            ("devenv", self.devenv.as_path()),
            ("python", self.python.as_path()),
        ]
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: Paths,
    pub tools: Tools,
    pub visual_studio: VisualStudio,
    pub versions: BTreeMap<String, String>,
    pub force: ForceFlags,
    /// File the settings came from, used in error messages.
    pub source: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    paths: PathsToml,
    #[serde(default)]
    tools: ToolsToml,
    #[serde(default)]
    visual_studio: VisualStudio,
    #[serde(default)]
    versions: BTreeMap<String, String>,
    #[serde(default)]
    options: ForceFlags,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsToml {
    prefix: PathBuf,
    build: Option<PathBuf>,
    cache: Option<PathBuf>,
    install_bin: Option<PathBuf>,
    install_pdbs: Option<PathBuf>,
    install_include: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolsToml {
    cmake: Option<PathBuf>,
    git: Option<PathBuf>,
    msbuild: Option<PathBuf>,
    devenv: Option<PathBuf>,
    python: Option<PathBuf>,
    vcvars: Option<PathBuf>,
}

impl Settings {
    /// Settings with default tools and no versions, rooted at `prefix`.
    pub fn with_prefix(prefix: impl Into<PathBuf>) -> Self {
        Self {
            paths: Paths::under(prefix),
            tools: Tools::default(),
            visual_studio: VisualStudio::default(),
            versions: BTreeMap::new(),
            force: ForceFlags::default(),
            source: PathBuf::new(),
        }
    }

    /// Load and resolve a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: format!("cannot read: {e}"),
        })?;
        Self::parse(&text, path)
    }

    /// Parse settings from TOML text; `path` is only used for messages and
    /// to resolve a relative prefix.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let parsed: SettingsToml = toml::from_str(text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if parsed.paths.prefix.as_os_str().is_empty() {
            return Err(Error::Config {
                path: path.to_path_buf(),
                message: "paths.prefix is empty".to_string(),
            });
        }

        let prefix = if parsed.paths.prefix.is_absolute() {
            parsed.paths.prefix
        } else {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(parsed.paths.prefix)
        };

        let defaults = Paths::under(&prefix);
        let paths = Paths {
            build: parsed.paths.build.unwrap_or(defaults.build),
            cache: parsed.paths.cache.unwrap_or(defaults.cache),
            install_bin: parsed.paths.install_bin.unwrap_or(defaults.install_bin),
            install_pdbs: parsed.paths.install_pdbs.unwrap_or(defaults.install_pdbs),
            install_include: parsed
                .paths
                .install_include
                .unwrap_or(defaults.install_include),
            prefix,
        };

        let default_tools = Tools::default();
        let tools = Tools {
            cmake: parsed.tools.cmake.unwrap_or(default_tools.cmake),
            git: parsed.tools.git.unwrap_or(default_tools.git),
            msbuild: parsed.tools.msbuild.unwrap_or(default_tools.msbuild),
            devenv: parsed.tools.devenv.unwrap_or(default_tools.devenv),
            python: parsed.tools.python.unwrap_or(default_tools.python),
            vcvars: parsed.tools.vcvars,
        };

        let versions = parsed
            .versions
            .into_iter()
            .map(|(k, v)| (k, v.trim().to_string()))
            .collect();

        Ok(Self {
            paths,
            tools,
            visual_studio: parsed.visual_studio,
            versions,
            force: parsed.options,
            source: path.to_path_buf(),
        })
    }

    /// Find the settings file: the explicit path if given, otherwise
    /// `./depsmith.toml`, otherwise `<config dir>/depsmith/depsmith.toml`.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }

        let local = PathBuf::from(SETTINGS_FILENAME);
        if local.is_file() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|d| d.join("depsmith").join(SETTINGS_FILENAME))
            .filter(|p| p.is_file())
    }

    /// Version configured for `name`.
    pub fn version(&self, name: &str) -> Result<&str> {
        self.versions
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Config {
                path: self.source.clone(),
                message: format!("versions.{name} is not set"),
            })
    }

    /// Builder-style setter used by callers and tests.
    pub fn set_version(mut self, name: &str, version: &str) -> Self {
        self.versions.insert(name.to_string(), version.to_string());
        self
    }
}
