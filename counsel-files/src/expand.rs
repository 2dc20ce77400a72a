//! Recursive expansion of file and directory paths.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::security::{is_home_directory_root, is_server_directory, EXCLUDED_DIRS};
use crate::reader::resolve_and_validate_path;

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_excluded_dir(name: &str) -> bool {
    is_hidden(name) || EXCLUDED_DIRS.contains(&name)
}

/// Expand files and directories into a sorted, deduplicated file list.
///
/// Invalid paths are skipped silently so a partially-good selection still
/// succeeds; hidden entries, the exclusion set, and the server's own
/// directory are pruned during traversal.
pub fn expand_paths(paths: &[String]) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for path_str in paths {
        let Ok(path) = resolve_and_validate_path(path_str) else {
            continue;
        };
        if !path.exists() {
            continue;
        }

        if path.is_file() {
            seen.insert(path.to_string_lossy().into_owned());
            continue;
        }

        if path.is_dir() {
            if is_home_directory_root(&path) {
                debug!(path = %path.display(), "skipping home directory root");
                continue;
            }
            if is_server_directory(&path) {
                debug!(path = %path.display(), "skipping server's own directory");
                continue;
            }
            walk_directory(&path, &mut seen);
        }
    }

    seen.into_iter().collect()
}

fn walk_directory(root: &Path, seen: &mut BTreeSet<String>) {
    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        if e.depth() == 0 {
            return true;
        }
        if e.file_type().is_dir() {
            !is_excluded_dir(&name) && !is_server_directory(e.path())
        } else {
            !is_hidden(&name)
        }
    }) {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_file() {
            seen.insert(entry.path().to_string_lossy().into_owned());
        }
    }
}
