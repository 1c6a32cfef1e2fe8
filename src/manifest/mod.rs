//! manifest
//!
//! Manifest discovery: find the dependency files to upload for a scan.
//!
//! # Pipeline
//!
//! 1. Walk the source root once (sorted by name, hidden entries skipped)
//! 2. For each package manager allowed by the filter, for each of its
//!    patterns, take the walked files that match the pattern
//! 3. Drop files in excluded directories, then files with excluded names
//! 4. Drop unreadable files and files that are blank after trimming
//! 5. Keep the first [`MAX_MANIFESTS`] candidates in discovery order
//!
//! A file matched by several patterns is discovered once per pattern. Its
//! exclusion, however, is decided and logged only the first time.
//!
//! # Example
//!
//! ```no_run
//! use soos_sca::core::types::{ManifestPattern, PackageManagerManifests};
//! use soos_sca::manifest::{find_manifests, ExclusionRules, SearchOptions};
//! use std::path::Path;
//!
//! let catalogue = vec![PackageManagerManifests {
//!     package_manager: "NPM".into(),
//!     manifests: vec![ManifestPattern { pattern: "package.json".into(), is_lock_file: false }],
//! }];
//! let exclusions = ExclusionRules::new(&["node_modules".to_string()], &[]);
//! let search = find_manifests(
//!     &catalogue,
//!     &SearchOptions {
//!         source_root: Path::new("."),
//!         exclusions: &exclusions,
//!         package_managers: &[],
//!     },
//! );
//! println!("{} manifests", search.candidates.len());
//! ```

pub mod exclusion;
pub mod pattern;

pub use exclusion::ExclusionRules;
pub use pattern::GlobPattern;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::core::types::{ManifestCandidate, PackageManagerManifests, MAX_MANIFESTS};

/// Inputs of one discovery run.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions<'a> {
    /// Directory searched recursively
    pub source_root: &'a Path,
    /// Directory and file exclusions
    pub exclusions: &'a ExclusionRules,
    /// Case-insensitive package manager inclusion list; empty means all
    pub package_managers: &'a [String],
}

/// Why a matched file was not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The containing directory matched this `dirs_to_exclude` rule
    ExcludedDir(String),
    /// The file name matched this `files_to_exclude` rule
    ExcludedFile(String),
    /// The file could not be read
    Unreadable(String),
    /// The file is empty after trimming whitespace
    Empty,
}

/// A matched file that was not kept, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of a discovery run.
#[derive(Debug, Clone, Default)]
pub struct ManifestSearch {
    /// Kept candidates, at most [`MAX_MANIFESTS`], in discovery order
    pub candidates: Vec<ManifestCandidate>,
    /// Every file that matched a pattern but was skipped
    pub skipped: Vec<SkippedFile>,
    /// Number of candidates found before truncation
    pub discovered: usize,
    /// Set when more than [`MAX_MANIFESTS`] candidates were found
    pub truncated: bool,
}

impl ManifestSearch {
    /// Whether the run produced nothing to upload.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Discover manifest files under `options.source_root`.
///
/// Never fails: I/O problems are logged and the affected files skipped. A
/// run that finds nothing returns an empty [`ManifestSearch`] and leaves
/// it to the caller to decide what that means.
pub fn find_manifests(
    catalogue: &[PackageManagerManifests],
    options: &SearchOptions<'_>,
) -> ManifestSearch {
    let root = options
        .source_root
        .canonicalize()
        .unwrap_or_else(|_| options.source_root.to_path_buf());
    let files = walk_files(&root);
    debug!("Walked {} files under {}", files.len(), root.display());

    let mut search = ManifestSearch::default();
    let mut already_skipped: HashSet<PathBuf> = HashSet::new();

    for definition in catalogue
        .iter()
        .filter(|d| is_selected(&d.package_manager, options.package_managers))
    {
        debug!("Looking for {} manifests", definition.package_manager);

        for manifest in &definition.manifests {
            let glob = match GlobPattern::recursive(&manifest.pattern) {
                Ok(glob) => glob,
                Err(e) => {
                    warn!("Ignoring invalid manifest pattern '{}': {}", manifest.pattern, e);
                    continue;
                }
            };

            for relative in files.iter().filter(|f| glob.matches(f)) {
                if already_skipped.contains(relative) {
                    continue;
                }

                match evaluate(&root, relative, options.exclusions) {
                    Ok(parent_folder) => {
                        let file_path = root.join(relative);
                        info!("Found manifest file: {}", file_path.display());
                        search.candidates.push(ManifestCandidate {
                            file_path,
                            package_manager: definition.package_manager.clone(),
                            parent_folder,
                        });
                    }
                    Err(reason) => {
                        already_skipped.insert(relative.clone());
                        search.skipped.push(SkippedFile {
                            path: root.join(relative),
                            reason,
                        });
                    }
                }
            }
        }
    }

    search.discovered = search.candidates.len();
    if search.discovered > MAX_MANIFESTS {
        warn!(
            "Found {} manifests, only the first {} will be uploaded",
            search.discovered, MAX_MANIFESTS
        );
        search.candidates.truncate(MAX_MANIFESTS);
        search.truncated = true;
    }

    if search.is_empty() {
        warn!("No manifest files found under {}", root.display());
    }

    search
}

/// Decide whether a matched file is kept.
///
/// Returns the parent folder label on success.
fn evaluate(
    root: &Path,
    relative: &Path,
    exclusions: &ExclusionRules,
) -> Result<String, SkipReason> {
    let full_path = root.join(relative);
    let directory = relative.parent().unwrap_or_else(|| Path::new(""));
    let file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(rule) = exclusions.excluding_dir(directory) {
        info!(
            "Skipping file due to dirs_to_exclude: {} (rule '{}')",
            full_path.display(),
            rule
        );
        return Err(SkipReason::ExcludedDir(rule.to_string()));
    }

    if let Some(rule) = exclusions.excluding_file(&file_name) {
        info!(
            "Skipping file due to files_to_exclude: {} (rule '{}')",
            full_path.display(),
            rule
        );
        return Err(SkipReason::ExcludedFile(rule.to_string()));
    }

    let contents = fs::read_to_string(&full_path).map_err(|e| {
        warn!("Could not read {}: {}", full_path.display(), e);
        SkipReason::Unreadable(e.to_string())
    })?;

    if contents.trim().is_empty() {
        warn!("Skipping empty manifest file: {}", full_path.display());
        return Err(SkipReason::Empty);
    }

    Ok(full_path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default())
}

fn is_selected(package_manager: &str, filter: &[String]) -> bool {
    filter.is_empty()
        || filter
            .iter()
            .any(|wanted| wanted.trim().eq_ignore_ascii_case(package_manager))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// All regular files below `root`, as paths relative to it, sorted by name.
fn walk_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable path: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}
