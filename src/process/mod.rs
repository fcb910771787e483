//! External command execution.
//!
//! [`Cmd`] is a chainable description of one process: binary, arguments,
//! working directory, environment overlay, per-stream encodings and line
//! filters. Nothing runs until [`Cmd::execute`] or [`Cmd::run`].
//!
//! ```rust,ignore
//! use depsmith::process::{Cmd, Encoding, Env};
//!
//! Cmd::new("python")
//!     .args(["-X", "utf8", "setup.py", "install"])
//!     .cwd(&source)
//!     .stdout_encoding(Encoding::Utf8)
//!     .env(Env::new().set("PYTHONUTF8", "1"))
//!     .run()?;
//! ```

pub mod encoding;
pub mod env;
pub mod filter;

pub use encoding::{Encoding, LineDecoder};
pub use env::Env;
pub use filter::{demote_containing, Filter, FilterLine};

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, error, info, trace, warn, Level};

use crate::error::{Error, Result};

/// Check if a command resolves on PATH (or is an existing file).
pub fn exists(cmd: impl AsRef<OsStr>) -> bool {
    which::which(cmd).is_ok()
}

/// How an argument is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArgFlags {
    /// Passed to the process but left out of the logged command line.
    pub quiet: bool,
    /// Glued to the previous argument with no separator.
    pub nospace: bool,
}

impl ArgFlags {
    pub const NONE: ArgFlags = ArgFlags {
        quiet: false,
        nospace: false,
    };
    pub const QUIET: ArgFlags = ArgFlags {
        quiet: true,
        nospace: false,
    };
    pub const NOSPACE: ArgFlags = ArgFlags {
        quiet: false,
        nospace: true,
    };
}

#[derive(Debug, Clone)]
struct Arg {
    value: OsString,
    flags: ArgFlags,
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Builder for one external command.
#[derive(Clone)]
pub struct Cmd {
    name: String,
    binary: PathBuf,
    args: Vec<Arg>,
    cwd: Option<PathBuf>,
    env: Env,
    code_page: Option<u32>,
    stdout_encoding: Encoding,
    stderr_encoding: Encoding,
    stdout_filter: Option<Filter>,
    stderr_filter: Option<Filter>,
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cmd")
            .field("name", &self.name)
            .field("line", &self.display())
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("code_page", &self.code_page)
            .field("stdout_encoding", &self.stdout_encoding)
            .field("stderr_encoding", &self.stderr_encoding)
            .field("stdout_filter", &self.stdout_filter.is_some())
            .field("stderr_filter", &self.stderr_filter.is_some())
            .finish()
    }
}

impl Cmd {
    /// Command for `binary`, named after its file stem in logs and errors.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        let binary = binary.into();
        let name = binary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            binary,
            args: Vec::new(),
            cwd: None,
            env: Env::new(),
            code_page: None,
            stdout_encoding: Encoding::Inherit,
            stderr_encoding: Encoding::Inherit,
            stdout_filter: None,
            stderr_filter: None,
        }
    }

    /// Override the tool name used in logs and errors.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn arg(self, arg: impl AsRef<OsStr>) -> Self {
        self.arg_with(arg, ArgFlags::NONE)
    }

    pub fn arg_with(mut self, arg: impl AsRef<OsStr>, flags: ArgFlags) -> Self {
        let value = arg.as_ref().to_os_string();
        if value.is_empty() && !flags.nospace {
            return self;
        }
        self.args.push(Arg { value, flags });
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for a in args {
            self = self.arg(a);
        }
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// `name value` as two tokens, both carrying `flags`.
    pub fn arg_pair(self, name: impl AsRef<OsStr>, value: impl AsRef<OsStr>, flags: ArgFlags) -> Self {
        self.arg_with(name, flags).arg_with(
            value,
            ArgFlags {
                quiet: flags.quiet,
                nospace: false,
            },
        )
    }

    /// `namevalue` as one token, e.g. `-DCMAKE_INSTALL_PREFIX=` + path.
    pub fn arg_joined(self, name: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.arg(name).arg_with(value, ArgFlags::NOSPACE)
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Layer `env` on top of whatever overlay is already set.
    pub fn env(mut self, env: Env) -> Self {
        self.env = self.env.merge(&env);
        self
    }

    /// Console input code page (`chcp`) to switch to before running.
    /// Only meaningful on Windows; ignored elsewhere.
    pub fn code_page(mut self, cp: u32) -> Self {
        self.code_page = Some(cp);
        self
    }

    pub fn stdout_encoding(mut self, e: Encoding) -> Self {
        self.stdout_encoding = e;
        self
    }

    pub fn stderr_encoding(mut self, e: Encoding) -> Self {
        self.stderr_encoding = e;
        self
    }

    pub fn stdout_filter(mut self, f: Filter) -> Self {
        self.stdout_filter = Some(f);
        self
    }

    pub fn stderr_filter(mut self, f: Filter) -> Self {
        self.stderr_filter = Some(f);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn tool_name(&self) -> &str {
        &self.name
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env_overlay(&self) -> &Env {
        &self.env
    }

    /// Arguments as handed to the process, nospace arguments already joined.
    pub fn argv(&self) -> Vec<OsString> {
        self.tokens(false)
    }

    /// Printable command line, quiet arguments left out.
    pub fn display(&self) -> String {
        let mut s = quote(&self.binary.to_string_lossy());
        for t in self.tokens(true) {
            s.push(' ');
            s.push_str(&quote(&t.to_string_lossy()));
        }
        s
    }

    fn tokens(&self, skip_quiet: bool) -> Vec<OsString> {
        let mut out: Vec<OsString> = Vec::new();
        // whether the last pushed token was itself skipped
        let mut last_skipped = false;

        for a in &self.args {
            if a.flags.nospace {
                if last_skipped {
                    continue;
                }
                if skip_quiet && a.flags.quiet {
                    continue;
                }
                match out.last_mut() {
                    Some(prev) => prev.push(&a.value),
                    None => out.push(a.value.clone()),
                }
                continue;
            }

            if skip_quiet && a.flags.quiet {
                last_skipped = true;
                continue;
            }
            last_skipped = false;
            out.push(a.value.clone());
        }
        out
    }

    fn validate(&self) -> Result<PathBuf> {
        if self.binary.as_os_str().is_empty() {
            return Err(Error::empty(format!("binary for '{}'", self.name)));
        }
        match &self.cwd {
            Some(dir) if dir.as_os_str().is_empty() => Err(Error::empty(format!(
                "working directory for '{}'",
                self.binary.display()
            ))),
            Some(dir) => Ok(dir.clone()),
            None => Err(Error::empty(format!(
                "working directory for '{}'",
                self.binary.display()
            ))),
        }
    }

    fn build_command(&self, cwd: &Path) -> Command {
        let mut cmd = match self.code_page {
            #[cfg(windows)]
            Some(cp) => {
                use std::os::windows::process::CommandExt;

                let mut line = format!("chcp {cp} >nul && \"{}\"", self.binary.display());
                for t in self.argv() {
                    line.push(' ');
                    line.push_str(&quote(&t.to_string_lossy()));
                }
                let mut c = Command::new("cmd.exe");
                c.arg("/C").raw_arg(format!("\"{line}\""));
                c
            }
            _ => {
                if let Some(cp) = self.code_page {
                    trace!(tool = %self.name, code_page = cp, "code page ignored on this platform");
                }
                let mut c = Command::new(&self.binary);
                c.args(self.argv());
                c
            }
        };

        cmd.current_dir(cwd)
            .envs(self.env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run to completion and report the exit code without judging it.
    ///
    /// Both streams are decoded with their encodings, passed line by line
    /// through their filters and logged as they arrive.
    pub fn execute(&self) -> Result<CmdOutput> {
        let cwd = self.validate()?;

        debug!(tool = %self.name, cwd = %cwd.display(), "> {}", self.display());

        let mut child = self
            .build_command(&cwd)
            .spawn()
            .map_err(|source| Error::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (out_text, err_text) = std::thread::scope(|s| {
            let err_handle = s.spawn(|| {
                pump(
                    stderr,
                    self.stderr_encoding,
                    self.stderr_filter.as_ref(),
                    Level::WARN,
                    &self.name,
                )
            });
            let out_text = pump(
                stdout,
                self.stdout_encoding,
                self.stdout_filter.as_ref(),
                Level::INFO,
                &self.name,
            );
            let err_text = err_handle.join().unwrap_or_default();
            (out_text, err_text)
        });

        let status = child.wait().map_err(|source| Error::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        Ok(CmdOutput {
            code: status.code(),
            stdout: out_text,
            stderr: err_text,
        })
    }

    /// Run and turn a non-zero exit code into [`Error::ToolFailed`].
    pub fn run(&self) -> Result<CmdOutput> {
        let output = self.execute()?;
        if !output.success() {
            error!(tool = %self.name, code = ?output.code, "{} failed", self.name);
            return Err(Error::ToolFailed {
                tool: self.name.clone(),
                binary: self.binary.clone(),
                code: output.code,
            });
        }
        Ok(output)
    }
}

/// Read a stream to its end, logging each decoded line.
fn pump<R: Read>(
    stream: Option<R>,
    encoding: Encoding,
    filter: Option<&Filter>,
    default: Level,
    tool: &str,
) -> String {
    let Some(mut stream) = stream else {
        return String::new();
    };

    let mut decoder = LineDecoder::new(encoding);
    let mut collected = String::new();
    let mut buf = [0u8; 8192];

    let mut sink = |line: String, terminated: bool| {
        let f = filter::classify(filter, line, default);
        emit(tool, &f);
        collected.push_str(&f.line);
        if terminated {
            collected.push('\n');
        }
    };

    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for line in decoder.push(&buf[..n]) {
                    sink(line, true);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(tool = %tool, "reading output failed: {}", e);
                break;
            }
        }
    }
    // an unterminated last line is kept unterminated
    if let Some(line) = decoder.finish() {
        sink(line, false);
    }

    collected
}

fn emit(tool: &str, f: &FilterLine) {
    match f.level {
        Level::ERROR => error!(tool = %tool, "{}", f.line),
        Level::WARN => warn!(tool = %tool, "{}", f.line),
        Level::INFO => info!(tool = %tool, "{}", f.line),
        Level::DEBUG => debug!(tool = %tool, "{}", f.line),
        _ => trace!(tool = %tool, "{}", f.line),
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains([' ', '\t', '"']) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}
