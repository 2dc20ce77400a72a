#![deny(missing_docs)]
//! Sandboxed file access for the counsel server.
//!
//! Every path an LLM client hands us is validated before any filesystem
//! operation: absolute-only, traversal and encoding attacks rejected,
//! symlinks resolved, and the result checked against a deny list of
//! system locations. Reads come back framed with explicit BEGIN/END
//! markers (errors included) so the model always sees why content is
//! missing, and large files stream in bounded chunks.

mod expand;
mod reader;
mod security;
mod streaming;

pub use expand::expand_paths;
pub use reader::{read_file_content, read_files, resolve_and_validate_path, ReadOptions};
pub use security::{has_attack_pattern, is_dangerous_path, is_home_directory_root, EXCLUDED_DIRS};
pub use streaming::StreamingFileReader;
