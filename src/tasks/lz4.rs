use std::path::PathBuf;

use crate::context::{Context, Reason};
use crate::error::Result;
use crate::staging;
use crate::task::{self, Outcome, Phase, Task, TaskReport};
use crate::tools::devenv::DevenvUpgrade;
use crate::tools::git::{github_url, GitClone};
use crate::tools::msbuild::MsBuild;
use crate::tools::run_tool;

/// LZ4 shared library, built from its Visual Studio solution.
pub struct Lz4;

impl Lz4 {
    fn solution_dir(&self, cx: &Context) -> Result<PathBuf> {
        Ok(self.source_path(cx)?.join("visual").join("VS2017"))
    }

    fn solution_file(&self, cx: &Context) -> Result<PathBuf> {
        Ok(self.solution_dir(cx)?.join("lz4.sln"))
    }

    fn out_dir(&self, cx: &Context) -> Result<PathBuf> {
        Ok(self.solution_dir(cx)?.join("bin").join("x64_Release"))
    }
}

impl Task for Lz4 {
    fn name(&self) -> &str {
        "lz4"
    }

    fn required_tools(&self) -> &[&'static str] {
        &["git", "devenv", "msbuild"]
    }

    fn source_path(&self, cx: &Context) -> Result<PathBuf> {
        Ok(cx.paths().build.join(format!("lz4-{}", cx.version("lz4")?)))
    }

    fn clean_for_rebuild(&self, cx: &Context) -> Result<()> {
        let bin = self.solution_dir(cx)?.join("bin");
        cx.trace(Reason::Rebuild, format!("deleting {}", bin.display()));
        staging::delete_directory_optional(&bin)?;
        Ok(())
    }

    fn fetch(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
        let clone = GitClone::new()
            .url(github_url("lz4", "lz4"))
            .branch(cx.version("lz4")?)
            .output(self.source_path(cx)?);
        report.record(Phase::Fetch, run_tool(cx, clone)?);

        let upgrade = DevenvUpgrade::new(self.solution_file(cx)?);
        report.record(Phase::Extract, run_tool(cx, upgrade)?);
        Ok(())
    }

    fn build_and_install(&self, cx: &Context, report: &mut TaskReport) -> Result<()> {
        run_tool(
            cx,
            MsBuild::new()
                .solution(self.solution_file(cx)?)
                .projects(["liblz4-dll"]),
        )?;
        report.record(Phase::Build, Outcome::Ran);

        let out = self.out_dir(cx)?;
        let dll = out.join("liblz4.dll");
        let pdb = out.join("liblz4.pdb");
        let paths = cx.paths();
        let installed = task::install(
            cx,
            &[
                (dll.as_path(), paths.install_bin.as_path()),
                (pdb.as_path(), paths.install_pdbs.as_path()),
            ],
        )?;
        report.record(Phase::Install, installed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let settings = Settings::with_prefix("/deps").set_version("lz4", "v1.9.2");
        let cx = Context::new("lz4", &settings);
        assert_eq!(
            Lz4.source_path(&cx).unwrap(),
            Path::new("/deps/build/lz4-v1.9.2")
        );
        assert_eq!(
            Lz4.out_dir(&cx).unwrap(),
            Path::new("/deps/build/lz4-v1.9.2/visual/VS2017/bin/x64_Release")
        );
    }

    #[test]
    fn test_missing_version() {
        let settings = Settings::with_prefix("/deps");
        let cx = Context::new("lz4", &settings);
        let err = Lz4.source_path(&cx).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("lz4"));
    }

    #[test]
    fn test_rebuild_clean_deletes_solution_bin_only() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_prefix(temp.path()).set_version("lz4", "v1.9.2");
        let cx = Context::new("lz4", &settings);
        let sln_dir = Lz4.solution_dir(&cx).unwrap();
        std::fs::create_dir_all(sln_dir.join("bin").join("x64_Release")).unwrap();
        std::fs::write(sln_dir.join("lz4.sln"), "").unwrap();

        Lz4.clean_for_rebuild(&cx).unwrap();
        assert!(!sln_dir.join("bin").exists());
        assert!(sln_dir.join("lz4.sln").exists());

        // already clean
        Lz4.clean_for_rebuild(&cx).unwrap();
    }
}
