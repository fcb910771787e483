//! Shallow git clones.
//!
//! A clone counts as fetched once `<output>/.git` exists. It follows the
//! same policy as downloads: skipped unless force-redownload is set, in
//! which case the checkout is deleted and cloned again.

use std::path::PathBuf;

use super::Tool;
use crate::context::{Context, Reason};
use crate::error::{Error, IoContext, Result};
use crate::process::{Cmd, Encoding};
use crate::staging;
use crate::task::{fetch_decision, Decision, Outcome};

/// `https://github.com/<org>/<repo>.git`
pub fn github_url(org: &str, repo: &str) -> String {
    format!("https://github.com/{org}/{repo}.git")
}

#[derive(Debug, Clone, Default)]
pub struct GitClone {
    url: String,
    branch: String,
    output: PathBuf,
}

impl GitClone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Branch or tag to check out.
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = dir.into();
        self
    }

    pub fn command(&self, git: &std::path::Path) -> Result<Cmd> {
        if self.url.is_empty() {
            return Err(Error::empty("git clone url"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::empty(format!("git clone output for {}", self.url)));
        }

        let mut cmd = Cmd::new(git)
            .name("git")
            .stdout_encoding(Encoding::Utf8)
            .stderr_encoding(Encoding::Utf8)
            .args(["clone", "--recurse-submodules", "--depth", "1"]);

        if !self.branch.is_empty() {
            cmd = cmd.arg("--branch").arg(&self.branch);
        }

        let parent = self
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(std::path::Path::new("."));

        Ok(cmd
            .args(["--quiet", "-c", "advice.detachedHead=false"])
            .arg(&self.url)
            .arg_path(&self.output)
            .cwd(parent))
    }
}

impl Tool for GitClone {
    type Output = Outcome;

    fn name(&self) -> &str {
        "git clone"
    }

    fn run(self, cx: &Context) -> Result<Outcome> {
        let cmd = self.command(&cx.tools().git)?;
        let marker = self.output.join(".git");

        match fetch_decision(cx.force(), marker.exists()) {
            Decision::Skip => {
                cx.note(
                    Reason::Bypass,
                    format!("not cloning, {} exists", self.output.display()),
                );
                return Ok(Outcome::Skipped);
            }
            Decision::Replace => {
                cx.note(Reason::Redownload, format!("deleting {}", self.output.display()));
                staging::delete_directory_optional(&self.output)?;
            }
            Decision::Run | Decision::RunIgnoring => {}
        }

        if let Some(parent) = cmd.working_dir() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        cmd.run()?;
        Ok(Outcome::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_github_url() {
        assert_eq!(github_url("lz4", "lz4"), "https://github.com/lz4/lz4.git");
    }

    #[test]
    fn test_command_line() {
        let cmd = GitClone::new()
            .url(github_url("lz4", "lz4"))
            .branch("v1.9.2")
            .output("/deps/build/lz4-v1.9.2")
            .command(Path::new("git"))
            .unwrap();

        assert_eq!(
            cmd.display(),
            "git clone --recurse-submodules --depth 1 --branch v1.9.2 --quiet \
             -c advice.detachedHead=false https://github.com/lz4/lz4.git /deps/build/lz4-v1.9.2"
        );
        assert_eq!(cmd.working_dir(), Some(Path::new("/deps/build")));
    }

    #[test]
    fn test_relative_output_runs_in_current_dir() {
        let cmd = GitClone::new()
            .url("https://example.invalid/x.git")
            .output("x")
            .command(Path::new("git"))
            .unwrap();
        assert_eq!(cmd.working_dir(), Some(Path::new(".")));
    }

    #[test]
    fn test_missing_url() {
        let err = GitClone::new()
            .output("/x")
            .command(Path::new("git"))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_existing_clone_bypassed() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("lz4");
        std::fs::create_dir_all(output.join(".git")).unwrap();

        let mut settings = Settings::with_prefix(temp.path());
        // would fail to spawn if it ever ran
        settings.tools.git = "definitely_not_a_real_command_12345".into();
        let cx = Context::new("lz4", &settings);

        let outcome = GitClone::new()
            .url("https://example.invalid/lz4.git")
            .output(&output)
            .run(&cx)
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(output.join(".git").exists());
    }
}
