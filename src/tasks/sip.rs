//! SIP, the binding generator PyQt is built with.
//!
//! The source distribution comes from pip. After `setup.py install`, the
//! installed `sip-module` entry script is re-encoded to the ANSI code
//! page once (the pristine copy is kept as `.bak`), then `sip-module`
//! produces `sip.h`, which is the completion marker for generation.

use std::path::{Path, PathBuf};

use crate::context::{Context, Reason};
use crate::error::Result;
use crate::process::{demote_containing, Cmd, Encoding};
use crate::staging;
use crate::task::{self, ensure_fetched, ensure_generated, major_minor, Phase, Task, TaskReport};
use crate::tools::extractor::Extractor;
use crate::tools::python::{PipDownload, PythonLayout, SetupInstall};
use crate::tools::run_tool;

const MODULE_SCRIPT: &str = "sip-module-script.py";

pub struct Sip;

impl Sip {
    fn version<'a>(&self, cx: &'a Context) -> Result<&'a str> {
        cx.version("sip")
    }

    pub fn download_file(&self, cx: &Context) -> Result<PathBuf> {
        Ok(cx.paths().cache.join(format!("sip-{}.tar.gz", self.version(cx)?)))
    }

    /// Module sources matching the `pyqt_sip` version, e.g.
    /// `sipbuild/module/source/12.7`.
    pub fn module_source_path(&self, cx: &Context) -> Result<PathBuf> {
        let dir = major_minor(cx.version("pyqt_sip")?, "pyqt_sip")?;
        Ok(self
            .source_path(cx)?
            .join("sipbuild")
            .join("module")
            .join("source")
            .join(dir))
    }

    fn generate(&self, cx: &Context, python: &PythonLayout) -> Result<()> {
        let source = self.source_path(cx)?;

        run_tool(
            cx,
            SetupInstall::new(&source).stderr_filter(demote_containing(&[
                "zip_safe flag not set",
                "module references __file__",
            ])),
        )?;

        if reencode_module_script(&python.scripts_dir())? {
            cx.trace(
                Reason::Fs,
                format!("re-encoded {MODULE_SCRIPT} to {}", Encoding::Acp),
            );
        }

        Cmd::new(python.script("sip-module"))
            .code_page(850)
            .stdout_encoding(Encoding::Acp)
            .stderr_encoding(Encoding::Acp)
            .arg("--sip-h")
            .arg("PyQt5.zip")
            .cwd(&source)
            .run()?;
        Ok(())
    }
}

/// Rewrite the UTF-8 `sip-module-script.py` in the ANSI code page, once.
///
/// Returns false when the `.bak` from an earlier run is already there.
pub fn reencode_module_script(scripts_dir: &Path) -> Result<bool> {
    let script = scripts_dir.join(MODULE_SCRIPT);
    let backup = staging::with_suffix(&script, ".bak");
    if backup.exists() {
        return Ok(false);
    }

    let converted = staging::with_suffix(&script, ".acp");
    let text = staging::read_text_file(&script, Encoding::Utf8)?;
    staging::write_text_file(&converted, Encoding::Acp, &text)?;
    staging::swap_with_backup(&script, &converted, &backup)
}

impl Task for Sip {
    fn name(&self) -> &str {
        "sip"
    }

    fn required_tools(&self) -> &[&'static str] {
        &["python"]
    }

    fn source_path(&self, cx: &Context) -> Result<PathBuf> {
        Ok(cx.paths().build.join(format!("sip-{}", self.version(cx)?)))
    }

    fn fetch(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
        let file = self.download_file(cx)?;
        let version = self.version(cx)?;
        let outcome = ensure_fetched(cx, &file, || {
            run_tool(cx, PipDownload::new("sip", version).dest(&cx.paths().cache))
        })?;
        report.record(Phase::Fetch, outcome);
        Ok(())
    }

    fn build_and_install(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
        let source = self.source_path(cx)?;

        let extracted = run_tool(
            cx,
            Extractor::new()
                .file(self.download_file(cx)?)
                .output(&source),
        )?;
        report.record(Phase::Extract, extracted);

        let python = PythonLayout::resolve(&cx.tools().python)?;
        let header = source.join("sip.h");
        let generated = ensure_generated(cx, &header, || self.generate(cx, &python))?;
        report.record(Phase::Build, generated);

        let include = python.include_dir();
        let installed = task::install(cx, &[(header.as_path(), include.as_path())])?;
        report.record(Phase::Install, installed);
        Ok(())
    }
}
