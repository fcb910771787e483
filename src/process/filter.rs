//! Output line reclassification.
//!
//! A filter sees every decoded line of a stream and may change its text or
//! the level it is logged at. It cannot drop a line, and it has no say over
//! the exit code.

use std::sync::Arc;

use tracing::Level;

/// One decoded output line on its way to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLine {
    pub line: String,
    pub level: Level,
}

/// A caller-supplied strategy applied to each line.
pub type Filter = Arc<dyn Fn(&mut FilterLine) + Send + Sync>;

/// A filter that demotes any line containing one of `needles` to trace.
pub fn demote_containing(needles: &[&str]) -> Filter {
    let needles: Vec<String> = needles.iter().map(|s| s.to_string()).collect();
    Arc::new(move |f: &mut FilterLine| {
        if needles.iter().any(|n| f.line.contains(n.as_str())) {
            f.level = Level::TRACE;
        }
    })
}

/// Run `filter` (if any) over `line` at `default` level.
pub fn classify(filter: Option<&Filter>, line: String, default: Level) -> FilterLine {
    let mut f = FilterLine {
        line,
        level: default,
    };
    if let Some(filter) = filter {
        filter(&mut f);
    }
    f
}
