use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use depsmith::config::{ForceFlags, Settings};
use depsmith::task::{run_task, Plan, Task, TaskReport};
use depsmith::{preflight, tasks, Context};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DEPSMITH_LOG";

fn usage() -> &'static str {
    "Usage:\n  depsmith [options] build [<task>...]\n  depsmith [options] clean <task>...\n  depsmith [options] preflight [<task>...]\n  depsmith list\n\nOptions:\n  -v, -vv          more logging (DEPSMITH_LOG overrides)\n  --config <path>  settings file (default: ./depsmith.toml)\n  --redownload     delete and fetch downloads again\n  --rebuild        clean build outputs and ignore completion markers\n  --reextract      delete sources and extract them again\n  --report <path>  write a JSON report of every task run"
}

#[derive(Default)]
struct Options {
    verbosity: u8,
    config: Option<PathBuf>,
    force: ForceFlags,
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (opts, positional) = parse_options(&args)?;
    init_logging(opts.verbosity);

    let positional: Vec<&str> = positional.iter().map(String::as_str).collect();
    match positional.as_slice() {
        ["list"] => list(),
        ["build", names @ ..] => build(&opts, names),
        ["clean", names @ ..] if !names.is_empty() => clean(&opts, names),
        ["preflight", names @ ..] => check(&opts, names),
        _ => bail!(usage()),
    }
}

fn parse_options(args: &[String]) -> Result<(Options, Vec<String>)> {
    let mut opts = Options::default();
    let mut positional = Vec::new();
    let mut it = args.iter();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-v" => opts.verbosity = opts.verbosity.max(1),
            "-vv" => opts.verbosity = 2,
            "--redownload" => opts.force.redownload = true,
            "--rebuild" => opts.force.rebuild = true,
            "--reextract" => opts.force.reextract = true,
            "--config" => {
                let Some(path) = it.next() else {
                    bail!("--config needs a path\n\n{}", usage());
                };
                opts.config = Some(PathBuf::from(path));
            }
            "--report" => {
                let Some(path) = it.next() else {
                    bail!("--report needs a path\n\n{}", usage());
                };
                opts.report = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!(usage()),
            other if other.starts_with('-') => {
                bail!("unknown option '{}'\n\n{}", other, usage())
            }
            other => positional.push(other.to_string()),
        }
    }
    Ok((opts, positional))
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn load_settings(opts: &Options) -> Result<Settings> {
    let Some(path) = Settings::locate(opts.config.as_deref()) else {
        bail!(
            "no {} found in the current directory or the user config directory; pass --config",
            depsmith::config::SETTINGS_FILENAME
        );
    };
    let mut settings =
        Settings::load(&path).with_context(|| format!("loading settings '{}'", path.display()))?;
    settings.force = settings.force.union(opts.force);
    Ok(settings)
}

fn select(names: &[&str]) -> Result<Vec<Box<dyn Task>>> {
    if names.is_empty() {
        return Ok(tasks::all());
    }
    names
        .iter()
        .map(|n| tasks::find(n).map_err(anyhow::Error::from))
        .collect()
}

fn list() -> Result<()> {
    for task in tasks::all() {
        println!("{}", task.name());
    }
    Ok(())
}

fn check(opts: &Options, names: &[&str]) -> Result<()> {
    let settings = load_settings(opts)?;
    let selected = select(names)?;
    let refs: Vec<&dyn Task> = selected.iter().map(|t| t.as_ref()).collect();
    preflight::check_tasks(&settings, &refs)?;
    println!("all tools found");
    Ok(())
}

fn build(opts: &Options, names: &[&str]) -> Result<()> {
    let settings = load_settings(opts)?;
    let selected = select(names)?;
    let refs: Vec<&dyn Task> = selected.iter().map(|t| t.as_ref()).collect();
    preflight::check_tasks(&settings, &refs)?;

    let mut reports = Vec::new();
    for task in &refs {
        let cx = Context::new(task.name(), &settings);
        if settings.force.reextract {
            // a re-extract clean ends its run; build again from fresh sources
            reports.push(run_one(*task, &cx, Plan::CLEAN_ONLY)?);
            let cx = cx.with_force(ForceFlags {
                reextract: false,
                ..settings.force
            });
            reports.push(run_one(*task, &cx, Plan::FULL)?);
        } else {
            reports.push(run_one(*task, &cx, Plan::FULL)?);
        }
    }
    write_report(opts.report.as_deref(), &reports)
}

fn clean(opts: &Options, names: &[&str]) -> Result<()> {
    let settings = load_settings(opts)?;
    let mut reports = Vec::new();
    for task in select(names)? {
        let cx = Context::new(task.name(), &settings);
        reports.push(run_one(task.as_ref(), &cx, Plan::CLEAN_ONLY)?);
    }
    write_report(opts.report.as_deref(), &reports)
}

fn run_one(task: &dyn Task, cx: &Context, plan: Plan) -> Result<TaskReport> {
    run_task(task, cx, plan).with_context(|| format!("task '{}' failed", task.name()))
}

fn write_report(path: Option<&Path>, reports: &[TaskReport]) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let bytes = serde_json::to_vec_pretty(reports).context("serializing task report")?;
    std::fs::write(path, bytes)
        .with_context(|| format!("writing task report '{}'", path.display()))
}
