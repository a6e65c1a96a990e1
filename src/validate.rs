//! Request validation.
//!
//! Checks run in a fixed order and stop at the first violation, so a
//! request with several problems always reports the same one:
//!
//! 1. source text  2. page layout  3. footer  4. watermark  5. cover
//! 6. table of contents  7. page breaks  8. signature
//!
//! Each block validator has its own fixed internal order as well.

use crate::error::ValidationError;
use crate::input::*;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static RE_HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Validate a whole request. Performs no I/O beyond existence checks for
/// local image paths.
pub fn validate_input(input: &ConversionInput) -> Result<(), ValidationError> {
    if input.markdown.trim().is_empty() {
        return Err(ValidationError::EmptySource);
    }
    if let Some(ref page) = input.page {
        validate_page_layout(page)?;
    }
    if let Some(ref footer) = input.footer {
        validate_footer(footer)?;
    }
    if let Some(ref wm) = input.watermark {
        validate_watermark(wm)?;
    }
    if let Some(ref cover) = input.cover {
        validate_cover(cover)?;
    }
    if let Some(ref toc) = input.toc {
        validate_toc(toc)?;
    }
    if let Some(ref pb) = input.page_breaks {
        validate_page_breaks(pb)?;
    }
    if let Some(ref sig) = input.signature {
        validate_signature(sig)?;
    }
    Ok(())
}

pub fn validate_page_layout(page: &PageLayout) -> Result<(), ValidationError> {
    if !page.size.trim().is_empty() && !PAGE_SIZES.contains(&page.size_or_default().as_str()) {
        return Err(ValidationError::InvalidPageSize(page.size.clone()));
    }
    if !page.orientation.trim().is_empty()
        && !ORIENTATIONS.contains(&page.orientation_or_default().as_str())
    {
        return Err(ValidationError::InvalidOrientation(page.orientation.clone()));
    }
    if page.margin != 0.0 && !(MIN_MARGIN..=MAX_MARGIN).contains(&page.margin) {
        return Err(ValidationError::MarginOutOfRange {
            value: page.margin,
            min: MIN_MARGIN,
            max: MAX_MARGIN,
        });
    }
    Ok(())
}

pub fn validate_footer(footer: &Footer) -> Result<(), ValidationError> {
    let position = footer.position.trim().to_ascii_lowercase();
    if !FOOTER_POSITIONS.contains(&position.as_str()) {
        return Err(ValidationError::InvalidFooterPosition(footer.position.clone()));
    }
    Ok(())
}

pub fn validate_watermark(wm: &Watermark) -> Result<(), ValidationError> {
    if wm.text.trim().is_empty() {
        return Err(ValidationError::EmptyWatermarkText);
    }
    if !wm.color.is_empty() && !RE_HEX_COLOR.is_match(&wm.color) {
        return Err(ValidationError::InvalidWatermarkColor(wm.color.clone()));
    }
    if !(0.0..=1.0).contains(&wm.opacity) {
        return Err(ValidationError::WatermarkOpacityOutOfRange(wm.opacity));
    }
    if !(-90.0..=90.0).contains(&wm.angle) {
        return Err(ValidationError::WatermarkAngleOutOfRange(wm.angle));
    }
    Ok(())
}

pub fn validate_cover(cover: &Cover) -> Result<(), ValidationError> {
    if let Some(path) = missing_local_image(&cover.logo) {
        return Err(ValidationError::LogoNotFound { path });
    }
    Ok(())
}

pub fn validate_toc(toc: &TableOfContents) -> Result<(), ValidationError> {
    let min = toc.min_depth_or_default();
    let max = toc.max_depth_or_default();
    if !(MIN_TOC_DEPTH..=MAX_TOC_DEPTH).contains(&min) {
        return Err(ValidationError::TocMinDepthOutOfRange(min));
    }
    if !(MIN_TOC_DEPTH..=MAX_TOC_DEPTH).contains(&max) {
        return Err(ValidationError::TocMaxDepthOutOfRange(max));
    }
    if min > max {
        return Err(ValidationError::TocDepthOrder { min, max });
    }
    Ok(())
}

pub fn validate_page_breaks(pb: &PageBreaks) -> Result<(), ValidationError> {
    if pb.orphans != 0 && !(MIN_ORPHANS..=MAX_ORPHANS).contains(&pb.orphans) {
        return Err(ValidationError::OrphansOutOfRange(pb.orphans));
    }
    if pb.widows != 0 && !(MIN_WIDOWS..=MAX_WIDOWS).contains(&pb.widows) {
        return Err(ValidationError::WidowsOutOfRange(pb.widows));
    }
    Ok(())
}

pub fn validate_signature(sig: &Signature) -> Result<(), ValidationError> {
    if let Some(path) = missing_local_image(&sig.image_path) {
        return Err(ValidationError::SignatureImageNotFound { path });
    }
    Ok(())
}

/// `Some(path)` when `reference` names a local file that does not exist.
/// URLs are accepted without a network check.
fn missing_local_image(reference: &str) -> Option<PathBuf> {
    if reference.is_empty() || is_url(reference) {
        return None;
    }
    let path = Path::new(reference);
    if path.exists() {
        None
    } else {
        Some(path.to_path_buf())
    }
}
