//! Skip-or-run decisions for the fetch and generate phases.
//!
//! The two phases treat an existing artifact differently. A fetched
//! artifact is replaced only under force-redownload, while a generated
//! one is left in place and the generator simply runs again under
//! force-rebuild.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::config::ForceFlags;
use crate::context::{Context, Reason};
use crate::error::Result;
use crate::staging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ran,
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ran => write!(f, "ran"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing there yet.
    Run,
    /// Output exists and nothing forces a redo.
    Skip,
    /// Delete the existing artifact, then run.
    Replace,
    /// Leave the existing output alone and run anyway.
    RunIgnoring,
}

pub fn fetch_decision(force: ForceFlags, exists: bool) -> Decision {
    match (exists, force.redownload) {
        (false, _) => Decision::Run,
        (true, true) => Decision::Replace,
        (true, false) => Decision::Skip,
    }
}

pub fn generate_decision(force: ForceFlags, exists: bool) -> Decision {
    match (exists, force.rebuild) {
        (false, _) => Decision::Run,
        (true, true) => Decision::RunIgnoring,
        (true, false) => Decision::Skip,
    }
}

/// Run `fetch` unless `artifact` is already present.
///
/// Under force-redownload the artifact (file or directory) is deleted
/// first.
pub fn ensure_fetched<F>(cx: &Context, artifact: &Path, fetch: F) -> Result<Outcome>
where
    F: FnOnce() -> Result<()>,
{
    match fetch_decision(cx.force(), artifact.exists()) {
        Decision::Skip => {
            cx.note(Reason::Bypass, format!("{} already exists", artifact.display()));
            return Ok(Outcome::Skipped);
        }
        Decision::Replace => {
            cx.note(Reason::Redownload, format!("deleting {}", artifact.display()));
            if artifact.is_dir() {
                staging::delete_directory_optional(artifact)?;
            } else {
                staging::delete_file_optional(artifact)?;
            }
        }
        Decision::Run | Decision::RunIgnoring => {}
    }

    fetch()?;
    Ok(Outcome::Ran)
}

/// Run `generate` unless `marker` already exists.
///
/// Under force-rebuild the marker is ignored, not deleted.
pub fn ensure_generated<F>(cx: &Context, marker: &Path, generate: F) -> Result<Outcome>
where
    F: FnOnce() -> Result<()>,
{
    match generate_decision(cx.force(), marker.exists()) {
        Decision::Skip => {
            cx.note(Reason::Bypass, format!("{} already exists", marker.display()));
            return Ok(Outcome::Skipped);
        }
        Decision::RunIgnoring => {
            cx.note(Reason::Rebuild, format!("ignoring {}", marker.display()));
        }
        Decision::Run | Decision::Replace => {}
    }

    generate()?;
    Ok(Outcome::Ran)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::cell::Cell;
    use tempfile::TempDir;
    use yare::parameterized;

    fn flags(redownload: bool, rebuild: bool) -> ForceFlags {
        ForceFlags {
            redownload,
            rebuild,
            reextract: false,
        }
    }

    #[parameterized(
        missing = { false, false, false, Decision::Run },
        missing_forced = { false, true, true, Decision::Run },
        present = { true, false, false, Decision::Skip },
        present_rebuild_only = { true, false, true, Decision::Skip },
        present_redownload = { true, true, false, Decision::Replace },
    )]
    fn fetch_policy(exists: bool, redownload: bool, rebuild: bool, expected: Decision) {
        assert_eq!(fetch_decision(flags(redownload, rebuild), exists), expected);
    }

    #[parameterized(
        missing = { false, false, false, Decision::Run },
        present = { true, false, false, Decision::Skip },
        present_redownload_only = { true, true, false, Decision::Skip },
        present_rebuild = { true, false, true, Decision::RunIgnoring },
    )]
    fn generate_policy(exists: bool, redownload: bool, rebuild: bool, expected: Decision) {
        assert_eq!(generate_decision(flags(redownload, rebuild), exists), expected);
    }

    #[test]
    fn test_ensure_fetched_replaces_under_redownload() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("pkg-1.0.tar.gz");
        std::fs::write(&artifact, b"old").unwrap();

        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("pkg", &settings).with_force(flags(true, false));

        let saw_old = Cell::new(true);
        let outcome = ensure_fetched(&cx, &artifact, || {
            saw_old.set(artifact.exists());
            std::fs::write(&artifact, b"new").unwrap();
            Ok(())
        })
        .unwrap();

        assert_eq!(outcome, Outcome::Ran);
        assert!(!saw_old.get());
        assert_eq!(std::fs::read(&artifact).unwrap(), b"new");
    }

    #[test]
    fn test_ensure_generated_keeps_marker_under_rebuild() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("sip.h");
        std::fs::write(&marker, b"x").unwrap();

        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("sip", &settings);

        let ran = Cell::new(0);
        let skipped = ensure_generated(&cx, &marker, || {
            ran.set(ran.get() + 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(skipped, Outcome::Skipped);
        assert_eq!(ran.get(), 0);

        let cx = cx.with_force(flags(false, true));
        let outcome = ensure_generated(&cx, &marker, || {
            assert!(marker.exists());
            ran.set(ran.get() + 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(outcome, Outcome::Ran);
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn test_errors_propagate() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_prefix(temp.path());
        let cx = Context::new("pkg", &settings);

        let err = ensure_fetched(&cx, &temp.path().join("missing"), || {
            Err(crate::Error::empty("download url"))
        })
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
