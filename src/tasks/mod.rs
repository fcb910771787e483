//! Package recipes.

mod lz4;
mod sip;

pub use lz4::Lz4;
pub use sip::Sip;

use crate::error::{Error, Result};
use crate::task::Task;

/// Every known recipe, in build order.
pub fn all() -> Vec<Box<dyn Task>> {
    vec![Box::new(Lz4), Box::new(Sip)]
}

pub fn find(name: &str) -> Result<Box<dyn Task>> {
    all()
        .into_iter()
        .find(|t| t.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownTask {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find() {
        assert_eq!(find("lz4").unwrap().name(), "lz4");
        assert_eq!(find("SIP").unwrap().name(), "sip");
    }

    #[test]
    fn test_unknown_task() {
        let err = find("zlib").err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("zlib"));
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<String> = all().iter().map(|t| t.name().to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }
}
