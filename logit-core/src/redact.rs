use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::AttrValue;

/// Replacement written in place of a redacted attribute value.
pub const REDACTED: &str = "[REDACTED]";

/// Patterns for attribute names that commonly carry credentials. Each is
/// compiled case-insensitively; `_?` tolerates both `apikey` and `api_key`.
const COMMON_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_?key",
    "auth",
    "credential",
    "private_?key",
    "access_?key",
    "bearer",
];

#[derive(Debug)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// A set of compiled patterns matched against attribute names before events
/// are handed to backends.
#[derive(Debug)]
pub struct RedactionSet {
    patterns: RwLock<Vec<CompiledPattern>>,
}

static GLOBAL_REDACTIONS: Lazy<RedactionSet> = Lazy::new(RedactionSet::new);

impl RedactionSet {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide set consulted by the tracing pipeline.
    pub fn global() -> &'static RedactionSet {
        &GLOBAL_REDACTIONS
    }

    /// Registers a literal substring to redact. The text is escaped, so
    /// `api.key` matches only the exact characters `api.key`.
    pub fn add_pattern(&self, pattern: &str) {
        self.insert(&regex::escape(pattern));
    }

    pub fn add_patterns<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.add_pattern(pattern.as_ref());
        }
    }

    /// Installs the built-in credential name patterns.
    pub fn enable_common_patterns(&self) {
        for pattern in COMMON_PATTERNS {
            self.insert(pattern);
        }
    }

    fn insert(&self, fragment: &str) {
        let source = format!("(?i){}", fragment);
        let mut patterns = self
            .patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if patterns.iter().any(|p| p.source == source) {
            return;
        }
        match Regex::new(&source) {
            Ok(regex) => patterns.push(CompiledPattern { source, regex }),
            Err(err) => {
                tracing::warn!(pattern = fragment, error = %err, "Skipping invalid redaction pattern");
            }
        }
    }

    /// True when any registered pattern matches the attribute name.
    pub fn should_redact(&self, name: &str) -> bool {
        let regexes: Vec<Regex> = {
            let patterns = self
                .patterns
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            patterns.iter().map(|p| p.regex.clone()).collect()
        };
        regexes.iter().any(|regex| regex.is_match(name))
    }

    /// Returns the sentinel for matching names, otherwise the value untouched.
    pub fn apply(&self, name: &str, value: AttrValue) -> AttrValue {
        if self.should_redact(name) {
            AttrValue::String(REDACTED.to_string())
        } else {
            value
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Removes every pattern. Intended for tests that share the global set.
    pub fn clear(&self) {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for RedactionSet {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Global convenience functions =====

pub fn add_pattern(pattern: &str) {
    RedactionSet::global().add_pattern(pattern);
}

pub fn add_patterns<I, S>(patterns: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    RedactionSet::global().add_patterns(patterns);
}

pub fn enable_common_patterns() {
    RedactionSet::global().enable_common_patterns();
}

pub fn should_redact(name: &str) -> bool {
    RedactionSet::global().should_redact(name)
}

pub fn redact_value(name: &str, value: AttrValue) -> AttrValue {
    RedactionSet::global().apply(name, value)
}

pub fn clear_patterns() {
    RedactionSet::global().clear();
}
