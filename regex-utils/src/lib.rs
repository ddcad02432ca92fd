//! Regex utilities for fileflow
//! Extracted to a separate crate for compilation optimization

use once_cell::sync::Lazy;
use regex::Regex;

/// Patterns supplied at runtime by workflow definitions
pub mod dynamic {
    use super::*;

    /// Compile `pattern` and test it against `text`.
    ///
    /// Returns `None` when the pattern does not compile. The pattern is compiled on
    /// every call; callers that need a cached matcher should hold a `Regex` themselves.
    pub fn is_match(pattern: &str, text: &str) -> Option<bool> {
        Regex::new(pattern).ok().map(|re| re.is_match(text))
    }
}

/// Recognizes file names uniquified with a `_YYYYMMDD_HHMMSS` collision suffix
pub mod stamped_name {
    use super::*;

    pub static STAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?P<stem>.+)_(?P<date>\d{8})_(?P<time>\d{6})(?:_(?P<seq>\d+))?(?P<ext>\.[^.]+)?$")
            .expect("Invalid regex pattern")
    });

    /// Whether `file_name` carries a collision timestamp suffix
    pub fn is_stamped(file_name: &str) -> bool {
        STAMP_PATTERN.is_match(file_name)
    }

    /// Strip the collision suffix, returning the name the file had before uniquification
    pub fn original_name(file_name: &str) -> Option<String> {
        let caps = STAMP_PATTERN.captures(file_name)?;
        let stem = caps.name("stem")?.as_str();
        let ext = caps.name("ext").map(|m| m.as_str()).unwrap_or("");
        Some(format!("{stem}{ext}"))
    }
}
