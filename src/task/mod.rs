//! The per-package lifecycle: clean, fetch, extract/generate, build,
//! install.
//!
//! A [`Task`] supplies the package-specific steps. [`run_task`] sequences
//! them according to a [`Plan`] and the context's force flags, and
//! records what each phase did in a [`TaskReport`]. Any error ends the
//! task at once; nothing that already ran is rolled back.

mod decision;
mod version;

pub use decision::{
    ensure_fetched, ensure_generated, fetch_decision, generate_decision, Decision, Outcome,
};
pub use version::major_minor;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, info_span};

use crate::context::{Context, Reason};
use crate::error::Result;
use crate::staging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Clean,
    Fetch,
    Extract,
    Build,
    Install,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Clean => "clean",
            Phase::Fetch => "fetch",
            Phase::Extract => "extract",
            Phase::Build => "build",
            Phase::Install => "install",
        };
        f.write_str(s)
    }
}

/// Which parts of the lifecycle one invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub clean: bool,
    pub fetch: bool,
    pub build: bool,
}

impl Plan {
    /// Everything, in order.
    pub const FULL: Plan = Plan {
        clean: true,
        fetch: true,
        build: true,
    };

    pub const CLEAN_ONLY: Plan = Plan {
        clean: true,
        fetch: false,
        build: false,
    };
}

impl Default for Plan {
    fn default() -> Self {
        Plan::FULL
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub phases: Vec<(Phase, Outcome)>,
    pub started_at_utc: String,
    pub finished_at_utc: Option<String>,
}

impl TaskReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            phases: Vec::new(),
            started_at_utc: now_utc_compact(),
            finished_at_utc: None,
        }
    }

    pub fn record(&mut self, phase: Phase, outcome: Outcome) {
        self.phases.push((phase, outcome));
    }

    pub fn outcome(&self, phase: Phase) -> Option<Outcome> {
        self.phases
            .iter()
            .rev()
            .find(|(p, _)| *p == phase)
            .map(|(_, o)| *o)
    }

    /// True when every recorded phase was skipped.
    pub fn all_skipped(&self) -> bool {
        self.phases.iter().all(|(_, o)| *o == Outcome::Skipped)
    }
}

fn now_utc_compact() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// One package's build pipeline.
///
/// Implementations record the fetch, extract, build and install phases
/// they go through; the clean phase is driven by [`run_task`].
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Directory the package's sources live in.
    fn source_path(&self, cx: &Context) -> Result<PathBuf>;

    /// Logical names of the tools this task drives, as listed by
    /// [`Tools::binaries`](crate::config::Tools::binaries).
    fn required_tools(&self) -> &[&'static str] {
        &[]
    }

    /// Delete build outputs while keeping fetched sources.
    fn clean_for_rebuild(&self, cx: &Context) -> Result<()> {
        let build = self.source_path(cx)?.join("build");
        cx.trace(Reason::Rebuild, format!("deleting {}", build.display()));
        staging::delete_directory_optional(&build)?;
        Ok(())
    }

    fn fetch(&self, cx: &Context, report: &mut TaskReport) -> Result<()>;

    fn build_and_install(&self, cx: &Context, report: &mut TaskReport) -> Result<()>;
}

/// Run the phases of `task` selected by `plan`.
///
/// A re-extract clean deletes the sources and ends this invocation; the
/// caller runs the task again to fetch and extract afresh.
pub fn run_task(task: &dyn Task, cx: &Context, plan: Plan) -> Result<TaskReport> {
    let span = info_span!("task", name = %task.name());
    let _guard = span.enter();

    let mut report = TaskReport::new(task.name());
    let force = cx.force();

    if plan.clean && (force.reextract || force.rebuild) {
        if force.reextract {
            let source = task.source_path(cx)?;
            cx.note(Reason::Reextract, format!("deleting {}", source.display()));
            staging::delete_directory_optional(&source)?;
            report.record(Phase::Clean, Outcome::Ran);
            report.finished_at_utc = Some(now_utc_compact());
            return Ok(report);
        }
        task.clean_for_rebuild(cx)?;
        report.record(Phase::Clean, Outcome::Ran);
    }

    if plan.fetch {
        task.fetch(cx, &mut report)?;
    }
    if plan.build {
        task.build_and_install(cx, &mut report)?;
    }

    report.finished_at_utc = Some(now_utc_compact());
    info!(task = %task.name(), phases = report.phases.len(), "done");
    Ok(report)
}

/// Copy each `(file, dir)` into `dir` when it is better than what is
/// there. An install where nothing needed copying logs one bypass.
pub fn install(cx: &Context, files: &[(&Path, &Path)]) -> Result<Outcome> {
    let mut copied = 0;
    for (file, dir) in files {
        if staging::copy_if_better(file, dir)? {
            cx.trace(Reason::Fs, format!("installed {} into {}", file.display(), dir.display()));
            copied += 1;
        }
    }

    if copied == 0 {
        cx.note(Reason::Bypass, format!("{} file(s) already up to date", files.len()));
        Ok(Outcome::Skipped)
    } else {
        Ok(Outcome::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ForceFlags, Settings};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tracing_test::traced_test;

    struct Counting {
        fetched: AtomicUsize,
        built: AtomicUsize,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                fetched: AtomicUsize::new(0),
                built: AtomicUsize::new(0),
            }
        }
    }

    impl Task for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn source_path(&self, cx: &Context) -> Result<PathBuf> {
            Ok(cx.paths().build.join("counting-1.0"))
        }

        fn fetch(&self, _cx: &Context, report: &mut TaskReport) -> Result<()> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            report.record(Phase::Fetch, Outcome::Ran);
            Ok(())
        }

        fn build_and_install(&self, _cx: &Context, report: &mut TaskReport) -> Result<()> {
            self.built.fetch_add(1, Ordering::SeqCst);
            report.record(Phase::Build, Outcome::Ran);
            Ok(())
        }
    }

    #[test]
    fn test_reextract_deletes_sources_and_stops() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("counting", &settings).with_force(ForceFlags {
            reextract: true,
            ..ForceFlags::default()
        });
        let task = Counting::new();
        let src = task.source_path(&cx).unwrap();
        std::fs::create_dir_all(src.join("build")).unwrap();

        let report = run_task(&task, &cx, Plan::FULL).unwrap();
        assert!(!src.exists());
        assert_eq!(report.phases, vec![(Phase::Clean, Outcome::Ran)]);
        assert_eq!(task.fetched.load(Ordering::SeqCst), 0);
        assert_eq!(task.built.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rebuild_keeps_sources() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("counting", &settings).with_force(ForceFlags {
            rebuild: true,
            ..ForceFlags::default()
        });
        let task = Counting::new();
        let src = task.source_path(&cx).unwrap();
        std::fs::create_dir_all(src.join("build")).unwrap();
        std::fs::write(src.join("main.c"), "").unwrap();

        let report = run_task(&task, &cx, Plan::FULL).unwrap();
        assert!(src.join("main.c").exists());
        assert!(!src.join("build").exists());
        assert_eq!(report.outcome(Phase::Clean), Some(Outcome::Ran));
        assert_eq!(task.built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_flags_skips_clean() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("counting", &settings);
        let task = Counting::new();

        let report = run_task(&task, &cx, Plan::CLEAN_ONLY).unwrap();
        assert!(report.phases.is_empty());
        assert!(report.finished_at_utc.is_some());
        assert_eq!(task.fetched.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_install_bypasses_when_current() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("counting", &settings);
        let dll = temp.path().join("liblz4.dll");
        std::fs::write(&dll, b"dll").unwrap();
        let bin = temp.path().join("install").join("bin");

        assert_eq!(install(&cx, &[(dll.as_path(), bin.as_path())]).unwrap(), Outcome::Ran);
        assert_eq!(install(&cx, &[(dll.as_path(), bin.as_path())]).unwrap(), Outcome::Skipped);
    }

    /// Fetches, generates and installs with plain file operations.
    struct Staged;

    impl Task for Staged {
        fn name(&self) -> &str {
            "staged"
        }

        fn source_path(&self, cx: &Context) -> Result<PathBuf> {
            Ok(cx.paths().build.join("staged-1.0"))
        }

        fn fetch(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
            let archive = cx.paths().cache.join("staged-1.0.tar");
            let outcome = ensure_fetched(cx, &archive, || {
                std::fs::create_dir_all(&cx.paths().cache).unwrap();
                std::fs::write(&archive, b"archive").unwrap();
                Ok(())
            })?;
            report.record(Phase::Fetch, outcome);
            Ok(())
        }

        fn build_and_install(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
            let source = self.source_path(cx)?;
            let header = source.join("staged.h");
            let outcome = ensure_generated(cx, &header, || {
                std::fs::create_dir_all(&source).unwrap();
                std::fs::write(&header, b"#pragma once\n").unwrap();
                Ok(())
            })?;
            report.record(Phase::Extract, outcome);

            let paths = cx.paths();
            let installed = install(cx, &[(header.as_path(), paths.install_include.as_path())])?;
            report.record(Phase::Install, installed);
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn test_second_run_logs_one_bypass_per_skipped_phase() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("staged", &settings);

        let first = run_task(&Staged, &cx, Plan::FULL).unwrap();
        assert!(first.phases.iter().all(|(_, outcome)| *outcome == Outcome::Ran));
        assert!(!logs_contain("reason=bypass"));

        let second = run_task(&Staged, &cx, Plan::FULL).unwrap();
        assert_eq!(
            second.phases,
            vec![
                (Phase::Fetch, Outcome::Skipped),
                (Phase::Extract, Outcome::Skipped),
                (Phase::Install, Outcome::Skipped),
            ]
        );
        logs_assert(|lines: &[&str]| {
            let bypasses: Vec<&&str> =
                lines.iter().filter(|line| line.contains("reason=bypass")).collect();
            let once = |needle: &str| bypasses.iter().filter(|l| l.contains(needle)).count() == 1;
            match bypasses.len() {
                3 if once("staged-1.0.tar") && once("staged.h") && once("up to date") => Ok(()),
                n => Err(format!("expected one bypass per skipped phase, got {n}: {bypasses:?}")),
            }
        });
    }

    #[test]
    fn test_report_serializes_snake_case() {
        let mut report = TaskReport::new("lz4");
        report.record(Phase::Fetch, Outcome::Skipped);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "lz4");
        assert_eq!(json["phases"][0][0], "fetch");
        assert_eq!(json["phases"][0][1], "skipped");
        assert_eq!(report.started_at_utc.len(), "20260101T000000Z".len());
    }
}
