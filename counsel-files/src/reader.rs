//! Framed file reads with validation, normalisation, and token budgeting.

use std::path::{Path, PathBuf};

use counsel_budget::TokenEstimator;
use counsel_types::FileError;
use tracing::debug;

use crate::expand::expand_paths;
use crate::security::{
    canonicalize_lenient, has_attack_pattern, is_dangerous_path, is_home_directory_root,
};

/// Default cap on a single embedded file.
const MAX_EMBED_SIZE: u64 = 1_000_000;

/// Options for a framed read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Prefix each line with a right-aligned number and `│ ` separator.
    pub line_numbers: bool,
    /// Per-file size cap in bytes; zero means the 1 MiB default.
    pub max_size: u64,
}

/// Validate a client-supplied path and resolve it for reading.
///
/// Absolute paths only; symlinks are resolved before the deny-list check
/// so they cannot smuggle reads into system locations.
pub fn resolve_and_validate_path(path_str: &str) -> Result<PathBuf, FileError> {
    let path = Path::new(path_str);
    if !path.is_absolute() {
        return Err(FileError::RelativePath(path.to_path_buf()));
    }
    if has_attack_pattern(path) {
        return Err(FileError::SuspiciousPath(path.to_path_buf()));
    }
    if is_dangerous_path(path) {
        return Err(FileError::DeniedPath(path.to_path_buf()));
    }
    let resolved = canonicalize_lenient(path);
    if is_dangerous_path(&resolved) {
        return Err(FileError::DeniedPath(resolved));
    }
    if is_home_directory_root(&resolved) {
        return Err(FileError::HomeDirectoryRoot(resolved));
    }
    Ok(resolved)
}

/// Normalise CRLF/CR line endings to LF.
fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Prefix lines with right-aligned numbers: `"  45│ code"`.
///
/// Width grows with the line count, never below 4.
fn add_line_numbers(content: &str) -> String {
    let normalized = normalize_line_endings(content);
    let lines: Vec<&str> = normalized.split('\n').collect();
    let width = lines.len().to_string().len().max(4);
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}│ {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read one file and frame it for prompt inclusion.
///
/// Never fails: validation and I/O errors come back as framed
/// `--- ERROR READING FILE ---` blocks so the model knows what was
/// attempted and why it is missing. Returns the framed text and its
/// estimated token count.
pub fn read_file_content(
    path_str: &str,
    options: ReadOptions,
    estimator: &TokenEstimator,
) -> (String, usize) {
    let path = match resolve_and_validate_path(path_str) {
        Ok(path) => path,
        Err(err) => {
            debug!(path = path_str, %err, "path validation failed");
            let content =
                format!("\n--- ERROR ACCESSING FILE: {path_str} ---\nError: {err}\n--- END FILE ---\n");
            let tokens = estimator.estimate_plain(&content);
            return (content, tokens);
        }
    };

    if !path.exists() {
        let content =
            format!("\n--- FILE NOT FOUND: {path_str} ---\nError: File does not exist\n--- END FILE ---\n");
        let tokens = estimator.estimate_plain(&content);
        return (content, tokens);
    }
    if !path.is_file() {
        let content =
            format!("\n--- NOT A FILE: {path_str} ---\nError: Path is not a file\n--- END FILE ---\n");
        let tokens = estimator.estimate_plain(&content);
        return (content, tokens);
    }

    let max_size = if options.max_size == 0 {
        MAX_EMBED_SIZE
    } else {
        options.max_size
    };
    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > max_size => {
            let content = format!(
                "\n--- FILE TOO LARGE: {path_str} ---\nFile size: {} bytes (max: {max_size})\n--- END FILE ---\n",
                meta.len()
            );
            let tokens = estimator.estimate_plain(&content);
            return (content, tokens);
        }
        Ok(_) => {}
        Err(err) => {
            let content =
                format!("\n--- ERROR READING FILE: {path_str} ---\nError: {err}\n--- END FILE ---\n");
            let tokens = estimator.estimate_plain(&content);
            return (content, tokens);
        }
    }

    match std::fs::read(&path) {
        Ok(bytes) => {
            let raw = String::from_utf8_lossy(&bytes);
            let body = if options.line_numbers {
                add_line_numbers(&raw)
            } else {
                normalize_line_endings(&raw)
            };
            let formatted =
                format!("\n--- BEGIN FILE: {path_str} ---\n{body}\n--- END FILE: {path_str} ---\n");
            let tokens = estimator.estimate_plain(&formatted);
            (formatted, tokens)
        }
        Err(err) => {
            let content =
                format!("\n--- ERROR READING FILE: {path_str} ---\nError: {err}\n--- END FILE ---\n");
            let tokens = estimator.estimate_plain(&content);
            (content, tokens)
        }
    }
}

/// Read many files (directories expand recursively) under a token budget.
///
/// Files are embedded whole, in sorted order, until the budget is
/// exhausted; omitted files are listed in a trailing
/// `--- SKIPPED FILES (TOKEN LIMIT) ---` note rather than silently
/// dropped.
pub fn read_files(
    file_paths: &[String],
    max_tokens: usize,
    reserve_tokens: usize,
    options: ReadOptions,
    estimator: &TokenEstimator,
) -> String {
    let available = max_tokens.saturating_sub(reserve_tokens);
    debug!(
        paths = file_paths.len(),
        budget = available,
        "reading files under budget"
    );

    let mut parts: Vec<String> = Vec::new();
    let mut total_tokens = 0usize;
    let mut skipped: Vec<String> = Vec::new();

    let all_files = expand_paths(file_paths);
    if all_files.is_empty() && !file_paths.is_empty() {
        return format!(
            "\n--- NO FILES FOUND ---\nProvided paths: {}\n--- END ---\n",
            file_paths.join(", ")
        );
    }

    for (i, file_path) in all_files.iter().enumerate() {
        if total_tokens >= available {
            skipped.extend(all_files[i..].iter().cloned());
            break;
        }
        let (content, tokens) = read_file_content(file_path, options, estimator);
        if total_tokens + tokens <= available {
            parts.push(content);
            total_tokens += tokens;
        } else {
            skipped.push(file_path.clone());
        }
    }

    if !skipped.is_empty() {
        let mut note = String::from("\n\n--- SKIPPED FILES (TOKEN LIMIT) ---\n");
        note.push_str(&format!("Total skipped: {}\n", skipped.len()));
        for path in skipped.iter().take(10) {
            note.push_str(&format!("  - {path}\n"));
        }
        if skipped.len() > 10 {
            note.push_str(&format!("  ... and {} more\n", skipped.len() - 10));
        }
        note.push_str("--- END SKIPPED FILES ---\n");
        parts.push(note);
    }

    parts.join("\n\n")
}
