use crate::error::{LogitError, LogitResult};
use crate::level::Level;

/// Returns true when `namespace` matches the glob `pattern`.
///
/// Both are `::`-separated paths. `*` consumes exactly one segment, `**`
/// consumes zero or more. Empty segments from leading or trailing separators
/// are ignored, so `::A::B` is equivalent to `A::B`.
pub fn matches(namespace: &str, pattern: &str) -> bool {
    match_segments(&segments(namespace), &segments(pattern))
}

pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split("::").filter(|segment| !segment.is_empty()).collect()
}

fn match_segments(namespace: &[&str], pattern: &[&str]) -> bool {
    let (head, rest) = match pattern.split_first() {
        Some((head, rest)) => (head, rest),
        None => return namespace.is_empty(),
    };
    match *head {
        "**" => {
            if rest.is_empty() {
                return true;
            }
            // Consume zero or more namespace segments, backtracking until the
            // remaining pattern matches.
            (0..=namespace.len()).any(|skip| match_segments(&namespace[skip..], rest))
        }
        "*" => match namespace.split_first() {
            Some((_, ns_rest)) => match_segments(ns_rest, rest),
            None => false,
        },
        literal => match namespace.split_first() {
            Some((segment, ns_rest)) if *segment == literal => match_segments(ns_rest, rest),
            _ => false,
        },
    }
}

/// A validated glob pattern paired with the minimum level it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    pattern: String,
    level: Level,
    specificity: usize,
}

impl NamespaceBinding {
    /// Validates the pattern at construction. Empty patterns, `:::` runs,
    /// and single `:` separators are rejected.
    pub fn new(pattern: impl Into<String>, level: Level) -> LogitResult<Self> {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            return Err(LogitError::InvalidPattern {
                pattern,
                reason: "pattern must not be empty".to_string(),
            });
        }
        if pattern.contains(":::") {
            return Err(LogitError::InvalidPattern {
                pattern,
                reason: "more than two consecutive ':' characters".to_string(),
            });
        }
        if has_lone_colon(&pattern) {
            return Err(LogitError::InvalidPattern {
                pattern,
                reason: "single ':' is not a separator; join segments with '::'".to_string(),
            });
        }
        let specificity = segments(&pattern).len();
        Ok(Self {
            pattern,
            level,
            specificity,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Number of path segments; the most specific matching binding wins.
    pub fn specificity(&self) -> usize {
        self.specificity
    }

    pub fn matches(&self, namespace: &str) -> bool {
        matches(namespace, &self.pattern)
    }
}

fn has_lone_colon(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b':'
            && (i == 0 || bytes[i - 1] != b':')
            && bytes.get(i + 1).copied() != Some(b':')
    })
}
