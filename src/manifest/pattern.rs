//! manifest::pattern
//!
//! Glob patterns for manifest discovery and file exclusion.
//!
//! # Syntax
//!
//! Patterns are compiled with `globset`:
//!
//! - `*` matches any run of characters within one path segment
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!abc]` match one character from a class
//! - `**` as a whole segment matches zero or more directories
//!
//! Every pattern is first rewritten with [`case_insensitive_pattern`], which
//! turns each letter outside a bracket expression into a two-letter class.
//! This keeps behavior identical on case-sensitive and case-insensitive
//! filesystems.
//!
//! # Example
//!
//! ```
//! use soos_sca::manifest::pattern::{case_insensitive_pattern, GlobPattern};
//! use std::path::Path;
//!
//! assert_eq!(case_insensitive_pattern("a.json"), "[aA].[jJ][sS][oO][nN]");
//!
//! let glob = GlobPattern::recursive("package.json").unwrap();
//! assert!(glob.matches(Path::new("web/client/Package.JSON")));
//! ```

use std::path::Path;

use globset::{Glob, GlobBuilder, GlobMatcher};

/// Rewrite `pattern` so that letters match regardless of case.
///
/// Characters inside an existing bracket expression are left untouched.
pub fn case_insensitive_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 4);
    let mut in_class = false;
    let mut class_start = 0usize;

    for (i, c) in pattern.chars().enumerate() {
        if in_class {
            out.push(c);
            // A ']' directly after '[' (or '[!') is a literal member.
            if c == ']' && i > class_start {
                in_class = false;
            }
            continue;
        }

        match c {
            '[' => {
                in_class = true;
                class_start = i + 1;
                out.push(c);
            }
            c if c.is_alphabetic() => {
                let lower: String = c.to_lowercase().collect();
                let upper: String = c.to_uppercase().collect();
                if lower == upper {
                    out.push(c);
                } else {
                    out.push('[');
                    out.push_str(&lower);
                    out.push_str(&upper);
                    out.push(']');
                }
            }
            c => out.push(c),
        }

        if in_class && c == '[' {
            // Skip the negation marker when locating the first member.
            if matches!(pattern.chars().nth(i + 1), Some('!') | Some('^')) {
                class_start = i + 2;
            }
        }
    }

    out
}

/// Compile `pattern` case-insensitively, with `*` stopping at `/`.
pub fn compile(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(&case_insensitive_pattern(pattern))
        .case_insensitive(true)
        .literal_separator(true)
        .build()
}

/// A case-insensitive, segment-aware path glob.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    matcher: GlobMatcher,
}

impl GlobPattern {
    /// Build a glob that matches `pattern` at any depth below the root.
    ///
    /// This is equivalent to globbing `<root>/**/<pattern>`.
    pub fn recursive(pattern: &str) -> Result<Self, globset::Error> {
        let normalized = pattern
            .trim()
            .trim_start_matches(['/', '\\'])
            .replace('\\', "/");
        let anchored = if normalized.starts_with("**") {
            normalized
        } else {
            format!("**/{}", normalized)
        };

        Ok(Self {
            matcher: compile(&anchored)?.compile_matcher(),
        })
    }

    /// Check a path relative to the search root.
    pub fn matches(&self, relative: &Path) -> bool {
        !relative.as_os_str().is_empty() && self.matcher.is_match(relative)
    }
}
