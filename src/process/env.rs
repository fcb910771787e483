//! Environment overlays for child processes.

use std::collections::BTreeMap;
use std::ffi::OsStr;

/// Variables set on top of the inherited environment. On conflict the
/// overlay wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Layer `other` on top of `self`.
    pub fn merge(mut self, other: &Env) -> Self {
        for (k, v) in &other.vars {
            self.vars.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars
            .iter()
            .map(|(k, v)| (OsStr::new(k.as_str()), OsStr::new(v.as_str())))
    }

    /// Parse `NAME=VALUE` lines as printed by `set` or `env`.
    ///
    /// Lines without `=`, or starting with `=` (cmd.exe's per-drive
    /// variables), are ignored.
    pub fn parse_listing(text: &str) -> Self {
        let mut env = Env::new();
        for line in text.lines() {
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            env.vars.insert(name.to_string(), value.to_string());
        }
        env
    }
}
