//! Adapters around the external tools a task drives.
//!
//! Each adapter is a small builder that turns higher-level intent (a
//! solution file and targets, a source root and a generator) into one
//! [`Cmd`](crate::process::Cmd):
//! - [`cmake`] - generator-based build configuration
//! - [`git`] - shallow clones
//! - [`msbuild`] - building named targets of a solution
//! - [`devenv`] - one-time solution upgrades
//! - [`python`] - pip downloads and `setup.py` runs
//! - [`extractor`] - unpacking downloaded archives
//! - [`toolchain`] - per-architecture compiler environments

pub mod cmake;
pub mod devenv;
pub mod extractor;
pub mod git;
pub mod msbuild;
pub mod python;
pub mod toolchain;

use std::fmt;

use tracing::debug_span;

use crate::context::Context;
use crate::error::Result;

/// Target architecture of a native build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    #[default]
    X64,
    /// The tool picks; no architecture flag is passed.
    DontCare,
}

impl Arch {
    /// Both concrete architectures, for cleaning every output directory.
    pub const CONCRETE: [Arch; 2] = [Arch::X86, Arch::X64];
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86 => write!(f, "x86"),
            Arch::X64 => write!(f, "x64"),
            Arch::DontCare => write!(f, "any"),
        }
    }
}

/// A configured invocation of one external tool.
pub trait Tool {
    type Output;

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Build the command and run it to completion.
    fn run(self, cx: &Context) -> Result<Self::Output>;
}

/// Run `tool` inside a span carrying its name.
pub fn run_tool<T: Tool>(cx: &Context, tool: T) -> Result<T::Output> {
    let span = debug_span!("tool", name = %tool.name());
    let _guard = span.enter();
    tool.run(cx)
}

/// Platform file name for an executable.
pub fn exe_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{stem}.exe")
    } else {
        stem.to_string()
    }
}
