use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?$").expect("constant regex pattern is valid")
});

/// `MAJOR.MINOR` fragment of a `MAJOR.MINOR[.PATCH]` version.
///
/// `component` names the setting in the error message.
pub fn major_minor(version: &str, component: &str) -> Result<String> {
    let caps = VERSION_RE
        .captures(version)
        .ok_or_else(|| Error::BadVersion {
            component: component.to_string(),
            version: version.to_string(),
        })?;
    Ok(format!("{}.{}", &caps[1], &caps[2]))
}
