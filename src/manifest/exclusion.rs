//! manifest::exclusion
//!
//! Directory and file exclusion rules applied during manifest discovery.
//!
//! # Rules
//!
//! - A directory rule excludes a file when the rule, split into path
//!   segments, appears as a contiguous run of segments in the file's
//!   directory (relative to the source root). `node_modules` excludes
//!   `web/node_modules/lib` but not `web/node_modules_old`.
//! - A file rule excludes a file when its name matches the rule as a
//!   case-insensitive glob, or simply contains the rule text. All file
//!   globs are checked in one pass through a `GlobSet`; a rule that is not
//!   a valid glob still excludes by containment.
//!
//! Rules are supplied once at startup and never change during a run.

use std::path::{Component, Path};

use globset::{GlobSet, GlobSetBuilder};
use tracing::warn;

use super::pattern::compile;

/// A directory rule, pre-split into normalized segments.
#[derive(Debug, Clone)]
struct DirRule {
    source: String,
    segments: Vec<String>,
}

/// A file-name rule: its position in the glob set, if it compiled, and
/// the lowercased text for containment checks.
#[derive(Debug, Clone)]
struct FileRule {
    source: String,
    glob: Option<usize>,
    needle: String,
}

/// Read-only exclusion lists for one run.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    dirs: Vec<DirRule>,
    files: Vec<FileRule>,
    file_globs: GlobSet,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

impl ExclusionRules {
    /// Build rules from the raw comma-split lists. Blank entries are ignored.
    pub fn new(dirs: &[String], files: &[String]) -> Self {
        let dirs = dirs
            .iter()
            .filter_map(|raw| {
                let segments = normalize_segments(raw);
                (!segments.is_empty()).then(|| DirRule {
                    source: raw.trim().to_string(),
                    segments,
                })
            })
            .collect();

        let mut builder = GlobSetBuilder::new();
        let mut compiled = 0usize;
        let files = files
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                let glob = match compile(raw) {
                    Ok(glob) => {
                        builder.add(glob);
                        compiled += 1;
                        Some(compiled - 1)
                    }
                    Err(e) => {
                        warn!("files_to_exclude rule '{}' is not a valid glob: {}", raw, e);
                        None
                    }
                };
                FileRule {
                    source: raw.to_string(),
                    glob,
                    needle: raw.to_lowercase(),
                }
            })
            .collect();

        let file_globs = builder.build().unwrap_or_else(|e| {
            warn!("Could not build files_to_exclude globs: {}", e);
            GlobSet::empty()
        });

        Self {
            dirs,
            files,
            file_globs,
        }
    }

    /// Whether no rule is configured at all.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    /// Return the directory rule that excludes `relative_dir`, if any.
    pub fn excluding_dir(&self, relative_dir: &Path) -> Option<&str> {
        let parts: Vec<String> = relative_dir
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        self.dirs
            .iter()
            .find(|rule| contains_run(&parts, &rule.segments))
            .map(|rule| rule.source.as_str())
    }

    /// Return the file rule that excludes `file_name`, if any.
    pub fn excluding_file(&self, file_name: &str) -> Option<&str> {
        let lowered = file_name.to_lowercase();
        let hits = self.file_globs.matches(file_name);
        self.files
            .iter()
            .find(|rule| {
                rule.glob.is_some_and(|i| hits.contains(&i)) || lowered.contains(&rule.needle)
            })
            .map(|rule| rule.source.as_str())
    }
}

/// Split a user-supplied directory rule into path segments.
fn normalize_segments(raw: &str) -> Vec<String> {
    raw.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(dirs: &[&str], files: &[&str]) -> ExclusionRules {
        let dirs: Vec<String> = dirs.iter().map(|s| s.to_string()).collect();
        let files: Vec<String> = files.iter().map(|s| s.to_string()).collect();
        ExclusionRules::new(&dirs, &files)
    }

    mod directories {
        use super::*;

        #[test]
        fn matches_whole_segment() {
            let r = rules(&["node_modules"], &[]);
            assert_eq!(
                r.excluding_dir(Path::new("web/node_modules/lib")),
                Some("node_modules")
            );
            assert_eq!(r.excluding_dir(Path::new("web/node_modules_old")), None);
        }

        #[test]
        fn multi_segment_rule() {
            let r = rules(&["/build/out/"], &[]);
            assert!(r.excluding_dir(Path::new("a/build/out")).is_some());
            assert!(r.excluding_dir(Path::new("a/build/other/out")).is_none());
        }

        #[test]
        fn root_directory_is_never_excluded() {
            let r = rules(&["soos"], &[]);
            assert!(r.excluding_dir(Path::new("")).is_none());
        }

        #[test]
        fn blank_rules_are_ignored() {
            let r = rules(&["", "  ", "/"], &[" "]);
            assert!(r.is_empty());
        }
    }

    mod files {
        use super::*;

        #[test]
        fn wildcard_and_substring() {
            let r = rules(&[], &["pubspec.yaml", "*composer.json", "cargo*"]);
            assert_eq!(r.excluding_file("pubspec.yaml"), Some("pubspec.yaml"));
            assert_eq!(r.excluding_file("composer.json"), Some("*composer.json"));
            assert_eq!(r.excluding_file("cargo.toml"), Some("cargo*"));
            assert_eq!(r.excluding_file("Cargo.lock"), Some("cargo*"));
            assert_eq!(r.excluding_file("package.json"), None);
        }

        #[test]
        fn substring_containment() {
            let r = rules(&[], &["lock"]);
            assert_eq!(r.excluding_file("yarn.lock"), Some("lock"));
        }

        #[test]
        fn first_matching_rule_wins() {
            let r = rules(&[], &["*.toml", "cargo*"]);
            assert_eq!(r.excluding_file("Cargo.toml"), Some("*.toml"));
        }

        #[test]
        fn invalid_glob_still_excludes_by_containment() {
            let r = rules(&[], &["[abc"]);
            assert_eq!(r.excluding_file("x[abc.json"), Some("[abc"));
            assert_eq!(r.excluding_file("abc.json"), None);
        }
    }
}
