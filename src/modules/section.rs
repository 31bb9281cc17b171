//! # Per-module configuration section.
//!
//! A string-keyed map handed out by the configuration collaborator, with
//! typed accessors that fall back to a caller-supplied default.
//!
//! ```rust
//! use modvisor::ConfigSection;
//!
//! let s = ConfigSection::new("weather")
//!     .with("enable", "Yes")
//!     .with("refresh", "not-a-number");
//! assert!(s.get_bool("enable", false));
//! assert_eq!(s.get_int("refresh", 600), 600);
//! assert_eq!(s.get_str("city", "Paris"), "Paris");
//! ```

use std::collections::HashMap;

/// Key/value settings for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    values: HashMap<String, String>,
}

impl ConfigSection {
    /// Creates an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Section name (the module's config key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Raw value or `default`.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Integer value; missing or unparsable values yield `default`.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Boolean value: `true`, `1` and `yes` (any case) are true, anything
    /// else present is false, missing yields `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(v) => {
                let v = v.trim();
                v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes")
            }
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing() {
        let s = ConfigSection::new("m")
            .with("a", "TRUE")
            .with("b", "1")
            .with("c", "yes")
            .with("d", "no")
            .with("e", "0");
        assert!(s.get_bool("a", false));
        assert!(s.get_bool("b", false));
        assert!(s.get_bool("c", false));
        assert!(!s.get_bool("d", true));
        assert!(!s.get_bool("e", true));
        assert!(s.get_bool("missing", true));
    }

    #[test]
    fn int_parsing_falls_back() {
        let s = ConfigSection::new("m")
            .with("x", " 42 ")
            .with("y", "-7")
            .with("z", "12px");
        assert_eq!(s.get_int("x", 0), 42);
        assert_eq!(s.get_int("y", 0), -7);
        assert_eq!(s.get_int("z", 3), 3);
        assert_eq!(s.get_int("missing", 9), 9);
    }
}
