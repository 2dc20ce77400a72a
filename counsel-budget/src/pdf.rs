//! PDF token estimation from page geometry and embedded text.

use std::path::Path;

use counsel_types::{EstimateError, ModelCapabilities};
use lopdf::{Document, Object};
use tracing::debug;

use crate::estimator::TokenEstimator;

const BASE_TOKENS_PER_PAGE: usize = 85;
const PER_TILE_TOKENS: usize = 170;
const RENDER_DPI: f64 = 150.0;
const TILE_SIDE_PX: f64 = 512.0;
// Above this long/short ratio the common-paper approximation stops holding.
const MAX_COMMON_RATIO: f64 = 2.667;
// US Letter in PDF points, used when a page carries no media box.
const DEFAULT_PAGE: (f64, f64) = (612.0, 792.0);

/// Estimate tokens for a PDF as the resolved model would consume it.
///
/// For vision-capable models each page is costed as a rendered image via
/// the 512x512 tile formula, with the page's media box (rotation applied)
/// driving the tile count; extracted text is costed through the model's
/// text tokenizer either way.
pub fn estimate_pdf_tokens(
    path: &Path,
    model_name: &str,
    caps: &ModelCapabilities,
    estimator: &TokenEstimator,
) -> Result<usize, EstimateError> {
    let doc = Document::load(path).map_err(|e| EstimateError::PdfParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let pages = doc.get_pages();
    let mut total = 0usize;

    for (page_no, page_id) in &pages {
        if caps.supports_images {
            let (width_pt, height_pt, rotation) = page_geometry(&doc, *page_id);
            let (width_pt, height_pt) = if rotation % 180 == 90 {
                (height_pt, width_pt)
            } else {
                (width_pt, height_pt)
            };
            total += BASE_TOKENS_PER_PAGE + PER_TILE_TOKENS * page_tiles(width_pt, height_pt);
        }
        if let Ok(text) = doc.extract_text(&[*page_no]) {
            if !text.trim().is_empty() {
                total += estimator.estimate_text(&text, model_name, caps.tokenizer);
            }
        }
    }

    debug!(path = %path.display(), pages = pages.len(), tokens = total, "pdf estimate");
    Ok(total)
}

/// Tiles covering a page rendered at the nominal DPI.
///
/// Common paper ratios use the `2 * ceil(1.5 * r)` approximation; pages
/// longer than that fall back to the exact per-axis tile grid.
fn page_tiles(width_pt: f64, height_pt: f64) -> usize {
    let (long, short) = if width_pt >= height_pt {
        (width_pt, height_pt)
    } else {
        (height_pt, width_pt)
    };
    if short <= 0.0 {
        return 1;
    }
    let ratio = long / short;
    if ratio <= MAX_COMMON_RATIO {
        2 * (1.5 * ratio).ceil() as usize
    } else {
        let w_px = width_pt / 72.0 * RENDER_DPI;
        let h_px = height_pt / 72.0 * RENDER_DPI;
        ((w_px / TILE_SIDE_PX).ceil() as usize).max(1) * ((h_px / TILE_SIDE_PX).ceil() as usize).max(1)
    }
}

/// Media-box dimensions (points) and rotation for one page.
fn page_geometry(doc: &Document, page_id: lopdf::ObjectId) -> (f64, f64, i64) {
    let Ok(dict) = doc.get_dictionary(page_id) else {
        return (DEFAULT_PAGE.0, DEFAULT_PAGE.1, 0);
    };
    let rotation = dict
        .get(b"Rotate")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360);
    let media_box = dict
        .get(b"MediaBox")
        .ok()
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| {
            if arr.len() == 4 {
                let nums: Vec<f64> = arr.iter().filter_map(number).collect();
                (nums.len() == 4).then(|| ((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs()))
            } else {
                None
            }
        });
    match media_box {
        Some((w, h)) if w > 0.0 && h > 0.0 => (w, h, rotation),
        _ => (DEFAULT_PAGE.0, DEFAULT_PAGE.1, rotation),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_uses_common_ratio_formula() {
        // Letter: 612x792, ratio ~1.294 -> 2 * ceil(1.94) = 4 tiles.
        assert_eq!(page_tiles(612.0, 792.0), 4);
    }

    #[test]
    fn extreme_pages_fall_back_to_grid() {
        // A 1x10 inch strip at 150dpi -> 150x1500px -> 1 x 3 tiles.
        assert_eq!(page_tiles(72.0, 720.0), 3);
    }

    #[test]
    fn degenerate_page_costs_one_tile() {
        assert_eq!(page_tiles(100.0, 0.0), 1);
    }

    #[test]
    fn non_pdf_bytes_are_a_parse_error() {
        let mut f = tempfile::NamedTempFile::with_suffix(".pdf").unwrap();
        use std::io::Write;
        f.write_all(b"not a pdf at all").unwrap();
        let est = TokenEstimator::standalone();
        let caps = ModelCapabilities::conservative();
        let err = estimate_pdf_tokens(f.path(), "o3", &caps, &est).unwrap_err();
        assert!(matches!(err, EstimateError::PdfParse { .. }));
    }
}
