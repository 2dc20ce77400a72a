//! File-level token estimation and the strict pre-flight size check.

use std::path::Path;

use counsel_types::{EstimateError, ModelCapabilities, ToolOutput};
use tracing::debug;

use crate::allocation::TokenAllocation;
use crate::estimator::TokenEstimator;
use crate::pdf::estimate_pdf_tokens;

/// Tokens charged for the `--- BEGIN/END FILE ---` framing around each
/// embedded file.
pub const FILE_FRAME_OVERHEAD_TOKENS: usize = 40;

/// Coarse content classification used for estimation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Source code.
    Code,
    /// Prose or other plain text.
    Text,
    /// Structured data (JSON, YAML, CSV, ...); denser per byte.
    Structured,
    /// Raster image.
    Image,
    /// PDF document.
    Pdf,
    /// Audio: not estimable, must be rejected.
    Audio,
    /// Video: not estimable, must be rejected.
    Video,
    /// Anything else.
    Binary,
}

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "c", "h", "cpp", "hpp", "cc", "cs",
    "rb", "php", "swift", "kt", "scala", "sh", "bash", "zsh", "sql", "html", "css", "vue",
    "zig", "lua", "pl", "r", "m", "ex", "exs", "erl", "hs", "ml", "clj", "dart",
];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "rst", "log", "cfg", "conf", "ini", "env", "toml"];
const STRUCTURED_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "csv", "tsv", "xml", "lock"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "aac"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Classify a path by extension.
pub fn detect_content_kind(path: &Path) -> ContentKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let ext = ext.as_str();
    if CODE_EXTENSIONS.contains(&ext) {
        ContentKind::Code
    } else if TEXT_EXTENSIONS.contains(&ext) {
        ContentKind::Text
    } else if STRUCTURED_EXTENSIONS.contains(&ext) {
        ContentKind::Structured
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        ContentKind::Image
    } else if ext == "pdf" {
        ContentKind::Pdf
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        ContentKind::Audio
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        ContentKind::Video
    } else {
        ContentKind::Binary
    }
}

/// Bytes-per-token ratio for size-based estimation of a file type.
fn estimation_ratio(kind: ContentKind) -> f64 {
    match kind {
        ContentKind::Code => 3.5,
        ContentKind::Structured => 2.5,
        _ => 4.0,
    }
}

/// Cheap size-based token estimate for the pre-flight check.
///
/// Inaccessible paths estimate to zero so partial selections still get a
/// meaningful total; the read path reports its own errors later.
pub fn quick_file_estimate(path: &Path) -> usize {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            let kind = detect_content_kind(path);
            (meta.len() as f64 / estimation_ratio(kind)) as usize
        }
        _ => 0,
    }
}

/// Token cost of attaching an image, using the 512x512 tile formula at a
/// nominal 1024x1024 when real dimensions are unknowable, or the flat
/// fallback for providers without a vision estimator.
pub(crate) fn estimate_image_tokens(caps: &ModelCapabilities) -> usize {
    const BASE_TOKENS: usize = 85;
    const PER_TILE_TOKENS: usize = 170;
    const FALLBACK_IMAGE_TOKENS: usize = 765;
    if caps.supports_images {
        // Nominal 1024x1024: 2x2 tiles.
        BASE_TOKENS + PER_TILE_TOKENS * 4
    } else {
        FALLBACK_IMAGE_TOKENS
    }
}

/// Full estimate for one file as the resolved model would see it.
///
/// Text-like files are read (up to 1 MiB) and estimated through the
/// model's tokenizer plus framing overhead; images use the vision
/// estimate; PDFs combine page geometry and extracted text. Audio, video,
/// and unknown binary types are refused; the caller must drop them.
pub fn estimate_file_tokens(
    path: &Path,
    model_name: &str,
    caps: &ModelCapabilities,
    estimator: &TokenEstimator,
) -> Result<usize, EstimateError> {
    const READ_CAP: u64 = 1_000_000;
    match detect_content_kind(path) {
        ContentKind::Code | ContentKind::Text | ContentKind::Structured => {
            let meta = std::fs::metadata(path)?;
            if meta.len() > READ_CAP {
                // Too big to embed anyway; size ratio is close enough.
                return Ok(quick_file_estimate(path) + FILE_FRAME_OVERHEAD_TOKENS);
            }
            let body = std::fs::read_to_string(path)?;
            Ok(estimator.estimate_text(&body, model_name, caps.tokenizer)
                + FILE_FRAME_OVERHEAD_TOKENS)
        }
        ContentKind::Image => Ok(estimate_image_tokens(caps)),
        ContentKind::Pdf => estimate_pdf_tokens(path, model_name, caps, estimator),
        ContentKind::Audio => Err(EstimateError::UnsupportedContentType {
            model: model_name.to_string(),
            kind: "audio".into(),
            path: path.to_path_buf(),
        }),
        ContentKind::Video => Err(EstimateError::UnsupportedContentType {
            model: model_name.to_string(),
            kind: "video".into(),
            path: path.to_path_buf(),
        }),
        ContentKind::Binary => Err(EstimateError::UnsupportedContentType {
            model: model_name.to_string(),
            kind: "binary".into(),
            path: path.to_path_buf(),
        }),
    }
}

/// Strict pre-flight check on a request's file selection.
///
/// Either every file fits under the model-sensitive fraction of the file
/// budget or the whole request is rejected with a `code_too_large`
/// envelope. Partial inclusion is never performed, forcing the caller to
/// narrow its selection.
pub fn check_total_file_size(
    files: &[String],
    model_name: &str,
    caps: &ModelCapabilities,
) -> Option<ToolOutput> {
    if files.is_empty() {
        return None;
    }
    debug_assert!(
        !model_name.eq_ignore_ascii_case("auto"),
        "file size check requires a resolved model"
    );

    let allocation = TokenAllocation::for_window(caps.context_window);
    let threshold = allocation.file_threshold_percent();
    let max_file_tokens = (allocation.file_tokens as f64 * threshold) as usize;

    let mut total = 0usize;
    let mut counted = 0usize;
    for file in files {
        let estimate = quick_file_estimate(Path::new(file));
        total += estimate;
        if estimate > 0 {
            counted += 1;
        }
    }
    debug!(
        model = model_name,
        total_estimated_tokens = total,
        limit = max_file_tokens,
        "file size pre-flight"
    );

    if total <= max_file_tokens {
        return None;
    }

    Some(
        ToolOutput {
            status: "code_too_large".into(),
            content: format!(
                "The selected files are too large for analysis (estimated {total} tokens, \
                 limit {max_file_tokens}). Please select fewer, more specific files that are \
                 most relevant to your question, then invoke the tool again."
            ),
            content_type: counsel_types::ContentType::Text,
            metadata: serde_json::json!({
                "total_estimated_tokens": total,
                "limit": max_file_tokens,
                "file_count": counted,
                "threshold_percent": threshold,
                "model_context_window": caps.context_window,
                "model_name": model_name,
                "instructions": "Reduce file selection and try again - all files must fit \
                 within budget. If this persists, use a model with a larger context window \
                 where available.",
            }),
            continuation_id: None,
        },
    )
}
