//! Idempotent build orchestration for third-party source packages.
//!
//! Each package is a [`Task`](task::Task) whose lifecycle (clean, fetch,
//! extract or generate, build, install) is driven by
//! [`run_task`](task::run_task). Phases whose outputs already exist are
//! skipped unless a force flag says otherwise, so running a build twice
//! does no redundant work.
//!
//! - **Command invocation** - [`process::Cmd`] with quiet and nospace
//!   arguments, environment overlays, per-stream encodings and line filters
//! - **Tool adapters** - [`tools`]: cmake generators, git, msbuild, devenv,
//!   pip, archive extraction
//! - **File staging** - [`staging`]: optional deletes, copy-if-better,
//!   swap-with-backup
//! - **Lifecycle** - [`task`]: skip/force decisions and reports
//!
//! # Architecture
//!
//! ```text
//! tasks (lz4, sip)
//!     │
//!     ├── task: decides whether each phase runs
//!     ├── tools: turns intent into a Cmd
//!     │       └── process: spawns, decodes, filters, logs
//!     └── staging: publishes results into shared install dirs
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use depsmith::config::Settings;
//! use depsmith::task::{run_task, Plan};
//! use depsmith::{tasks, Context};
//!
//! # fn main() -> depsmith::Result<()> {
//! let settings = Settings::with_prefix("C:/deps").set_version("lz4", "v1.9.2");
//! let task = tasks::find("lz4")?;
//! let cx = Context::new(task.name(), &settings);
//! let report = run_task(task.as_ref(), &cx, Plan::FULL)?;
//! println!("{:?}", report.phases);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod preflight;
pub mod process;
pub mod staging;
pub mod task;
pub mod tasks;
pub mod tools;

pub use context::{Context, Reason};
pub use error::{Error, Result};
