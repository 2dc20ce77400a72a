//! Path deny lists and attack-pattern detection.

use std::path::{Path, PathBuf};

use tracing::warn;

/// System locations whose entire subtree must never be scanned or read.
const DANGEROUS_PATHS: &[&str] = &[
    "/etc",
    "/usr",
    "/bin",
    "/sbin",
    "/root",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/var/log",
    "/var/mail",
    "/var/spool",
    "/var/run",
    "/var/db",
    "/var/cache/private",
];

/// Locations denied exactly, but whose children are judged on their own
/// (individual home directories go through the home-root check instead).
const DANGEROUS_EXACT: &[&str] = &["/home", "/Users"];

/// Directory names excluded from recursive expansion: VCS metadata, build
/// output, caches, and language-ecosystem trees.
pub const EXCLUDED_DIRS: &[&str] = &[
    // Python
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    "htmlcov",
    // Node.js / JavaScript
    "node_modules",
    ".next",
    ".nuxt",
    "bower_components",
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Build output
    "build",
    "dist",
    "target",
    "out",
    // IDEs
    ".idea",
    ".vscode",
    // Caches
    ".cache",
    ".temp",
    ".tmp",
    // JVM
    ".gradle",
    ".m2",
    // Package managers
    "vendor",
];

/// Substrings that indicate traversal or encoding attacks, checked before
/// any resolution so symlink tricks cannot hide them.
const TRAVERSAL_PATTERNS: &[&str] = &[
    "..",
    "..%2f",
    "..%5c",
    "%2e%2e",
    "%252e%252e",
    "..;/",
    "..\\x2f",
    "..\\x5c",
];

/// Whether the raw path string carries a traversal, encoding, or
/// null-byte attack pattern. Checked before any resolution so symlink
/// tricks cannot hide the pattern.
pub fn has_attack_pattern(path: &Path) -> bool {
    let raw = path.to_string_lossy().to_ascii_lowercase();
    for pattern in TRAVERSAL_PATTERNS {
        if raw.contains(pattern) {
            return true;
        }
    }
    raw.contains('\0') || raw.contains("%00")
}

/// Whether a path is in the deny set or carries an attack pattern.
///
/// Combines [`has_attack_pattern`] with a canonical-path check against
/// the deny list. Paths that cannot be examined safely count as
/// dangerous.
pub fn is_dangerous_path(path: &Path) -> bool {
    if has_attack_pattern(path) {
        return true;
    }

    let resolved = canonicalize_lenient(path);

    // Filesystem root.
    if resolved.parent().is_none() {
        return true;
    }

    for dangerous in DANGEROUS_PATHS {
        if resolved.starts_with(dangerous) {
            return true;
        }
    }
    for dangerous in DANGEROUS_EXACT {
        if resolved == Path::new(dangerous) {
            return true;
        }
    }

    false
}

/// Whether the path is exactly a user's home directory root.
///
/// Scanning an entire home directory would sweep in non-project files;
/// callers must name a subdirectory instead.
pub fn is_home_directory_root(path: &Path) -> bool {
    let resolved = canonicalize_lenient(path);

    if let Some(home) = std::env::var_os("HOME") {
        if resolved == canonicalize_lenient(Path::new(&home)) {
            warn!(path = %path.display(), "refusing to scan home directory root");
            return true;
        }
    }

    // Pattern check for home layouts regardless of the current user.
    let s = resolved.to_string_lossy();
    for prefix in ["/home/", "/Users/"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            if !rest.is_empty() && !rest.contains('/') {
                warn!(path = %path.display(), "refusing to scan home directory root");
                return true;
            }
        }
    }

    false
}

/// Whether the path is inside the server's own installation directory.
///
/// Prevents the server from feeding its own code into prompts when a
/// project checkout contains it as a subdirectory.
pub fn is_server_directory(path: &Path) -> bool {
    let Ok(exe) = std::env::current_exe() else {
        return false;
    };
    let Some(server_dir) = exe.parent() else {
        return false;
    };
    canonicalize_lenient(path).starts_with(canonicalize_lenient(server_dir))
}

/// Resolve symlinks where possible; fall back to the path itself when the
/// target does not exist yet (the caller reports that separately).
pub(crate) fn canonicalize_lenient(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_directories_are_dangerous() {
        assert!(is_dangerous_path(Path::new("/")));
        assert!(is_dangerous_path(Path::new("/etc")));
        assert!(is_dangerous_path(Path::new("/etc/passwd")));
        assert!(is_dangerous_path(Path::new("/var/log/syslog")));
    }

    #[test]
    fn home_root_is_denied_but_projects_under_it_are_not() {
        assert!(is_dangerous_path(Path::new("/home")));
        assert!(!is_dangerous_path(Path::new("/home/somebody/project")));
    }

    #[test]
    fn traversal_patterns_are_dangerous() {
        assert!(is_dangerous_path(Path::new("/tmp/../etc/passwd")));
        assert!(is_dangerous_path(Path::new("/tmp/..%2fetc")));
        assert!(is_dangerous_path(Path::new("/tmp/%2e%2e/secret")));
        assert!(is_dangerous_path(Path::new("/tmp/file%00.txt")));
    }

    #[test]
    fn ordinary_project_paths_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_dangerous_path(dir.path()));
        assert!(!is_dangerous_path(&dir.path().join("src/main.rs")));
    }

    #[test]
    fn home_root_detected_by_pattern() {
        assert!(is_home_directory_root(Path::new("/home/somebody")));
        assert!(!is_home_directory_root(Path::new("/home/somebody/project")));
    }

    #[test]
    fn tempdir_is_not_home_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_home_directory_root(dir.path()));
    }
}
