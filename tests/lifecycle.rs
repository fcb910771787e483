//! End-to-end lifecycle runs with a fake package whose fetch, extract,
//! build and install are plain file operations.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use depsmith::config::{ForceFlags, Settings};
use depsmith::task::{
    self, ensure_fetched, ensure_generated, run_task, Outcome, Phase, Plan, Task, TaskReport,
};
use depsmith::{staging, Context, Result};
use tempfile::TempDir;

#[derive(Default)]
struct FakePackage {
    downloads: AtomicUsize,
    extracts: AtomicUsize,
    builds: AtomicUsize,
}

impl FakePackage {
    fn download_file(&self, cx: &Context) -> PathBuf {
        cx.paths().cache.join("fake-1.0.tar")
    }
}

impl Task for FakePackage {
    fn name(&self) -> &str {
        "fake"
    }

    fn source_path(&self, cx: &Context) -> Result<PathBuf> {
        Ok(cx.paths().build.join("fake-1.0"))
    }

    fn fetch(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
        let file = self.download_file(cx);
        let outcome = ensure_fetched(cx, &file, || {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            fs::create_dir_all(&cx.paths().cache).unwrap();
            fs::write(&file, b"archive").unwrap();
            Ok(())
        })?;
        report.record(Phase::Fetch, outcome);
        Ok(())
    }

    fn build_and_install(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
        let source = self.source_path(cx)?;
        let marker = source.join("fake.h");
        let outcome = ensure_generated(cx, &marker, || {
            self.extracts.fetch_add(1, Ordering::SeqCst);
            fs::create_dir_all(&source).unwrap();
            fs::write(&marker, b"#pragma once\n").unwrap();
            Ok(())
        })?;
        report.record(Phase::Extract, outcome);

        self.builds.fetch_add(1, Ordering::SeqCst);
        let dll = source.join("fake.dll");
        if !dll.exists() {
            fs::write(&dll, b"dll").unwrap();
        }
        report.record(Phase::Build, Outcome::Ran);

        let paths = cx.paths();
        let installed = task::install(
            cx,
            &[
                (dll.as_path(), paths.install_bin.as_path()),
                (marker.as_path(), paths.install_include.as_path()),
            ],
        )?;
        report.record(Phase::Install, installed);
        Ok(())
    }
}

fn skipped(report: &TaskReport) -> Vec<Phase> {
    report
        .phases
        .iter()
        .filter(|(_, o)| *o == Outcome::Skipped)
        .map(|(p, _)| *p)
        .collect()
}

#[test]
fn second_run_skips_fetch_extract_and_install() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_prefix(temp.path());
    let task = FakePackage::default();

    let cx = Context::new("fake", &settings);
    let first = run_task(&task, &cx, Plan::FULL).unwrap();
    assert!(skipped(&first).is_empty());

    let second = run_task(&task, &cx, Plan::FULL).unwrap();
    assert_eq!(
        skipped(&second),
        vec![Phase::Fetch, Phase::Extract, Phase::Install]
    );
    assert_eq!(task.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(task.extracts.load(Ordering::SeqCst), 1);
    assert_eq!(task.builds.load(Ordering::SeqCst), 2);
}

#[test]
fn current_download_keeps_its_timestamp() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_prefix(temp.path());
    let task = FakePackage::default();
    let cx = Context::new("fake", &settings);

    let file = task.download_file(&cx);
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, b"archive").unwrap();
    let old = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(old)
        .unwrap();

    let report = run_task(&task, &cx, Plan { clean: false, fetch: true, build: false }).unwrap();
    assert_eq!(report.outcome(Phase::Fetch), Some(Outcome::Skipped));
    assert_eq!(task.downloads.load(Ordering::SeqCst), 0);
    assert_eq!(fs::metadata(&file).unwrap().modified().unwrap(), old);
}

#[test]
fn redownload_replaces_the_download() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_prefix(temp.path());
    let task = FakePackage::default();
    let cx = Context::new("fake", &settings);

    let file = task.download_file(&cx);
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, b"stale").unwrap();

    let cx = cx.with_force(ForceFlags {
        redownload: true,
        ..ForceFlags::default()
    });
    let report = run_task(&task, &cx, Plan { clean: false, fetch: true, build: false }).unwrap();
    assert_eq!(report.outcome(Phase::Fetch), Some(Outcome::Ran));
    assert_eq!(task.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read(&file).unwrap(), b"archive");
}

#[test]
fn rebuild_regenerates_without_redownloading() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_prefix(temp.path());
    let task = FakePackage::default();

    run_task(&task, &Context::new("fake", &settings), Plan::FULL).unwrap();

    let cx = Context::new("fake", &settings).with_force(ForceFlags {
        rebuild: true,
        ..ForceFlags::default()
    });
    let report = run_task(&task, &cx, Plan::FULL).unwrap();
    assert_eq!(report.phases[0], (Phase::Clean, Outcome::Ran));
    assert_eq!(report.outcome(Phase::Fetch), Some(Outcome::Skipped));
    assert_eq!(report.outcome(Phase::Extract), Some(Outcome::Ran));
    assert_eq!(task.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(task.extracts.load(Ordering::SeqCst), 2);
}

#[test]
fn reextract_then_build_starts_from_fresh_sources() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_prefix(temp.path());
    let task = FakePackage::default();
    run_task(&task, &Context::new("fake", &settings), Plan::FULL).unwrap();

    let source = task.source_path(&Context::new("fake", &settings)).unwrap();
    fs::write(source.join("stray.obj"), b"").unwrap();

    let cx = Context::new("fake", &settings).with_force(ForceFlags {
        reextract: true,
        ..ForceFlags::default()
    });
    let clean = run_task(&task, &cx, Plan::FULL).unwrap();
    assert_eq!(clean.phases, vec![(Phase::Clean, Outcome::Ran)]);
    assert!(!source.exists());

    let cx = cx.with_force(ForceFlags::default());
    let rebuilt = run_task(&task, &cx, Plan::FULL).unwrap();
    assert_eq!(rebuilt.outcome(Phase::Extract), Some(Outcome::Ran));
    assert!(!source.join("stray.obj").exists());
    assert_eq!(task.downloads.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_installs_into_shared_dirs() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let dst = temp.path().join("install").join("bin");
    fs::create_dir_all(&src).unwrap();
    for i in 0..8 {
        fs::write(src.join(format!("lib{i}.dll")), vec![i as u8; 4096]).unwrap();
    }

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..8 {
                    staging::copy_if_better(&src.join(format!("lib{i}.dll")), &dst).unwrap();
                }
            });
        }
    });

    for i in 0..8 {
        assert_eq!(
            fs::read(dst.join(format!("lib{i}.dll"))).unwrap(),
            vec![i as u8; 4096]
        );
    }
    let stray: Vec<_> = fs::read_dir(&dst)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".depsmith-"))
        .collect();
    assert!(stray.is_empty());
}
