//! HTML rewrites applied between fragment conversion and styling.
//!
//! Two passes, both pure `&str → String`:
//!
//! - [`rewrite_asset_paths`] anchors relative `src` / `href` asset
//!   references at the source directory so the renderer, which loads the
//!   document from a temp file, still finds images and stylesheets.
//! - [`finalize_highlights`] turns the preprocessor's sentinels into
//!   `<mark>` elements.

use super::preprocess::{HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};
use crate::error::StageError;
use lol_html::html_content::Element;
use lol_html::{element, rewrite_str, HandlerResult, RewriteStrSettings};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use url::Url;

static RE_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// Rewrite every relative asset reference to an absolute `file://` URL
/// under `source_dir`. Scheme-qualified, protocol-relative, root-relative
/// and fragment-only references are left byte-for-byte unchanged.
pub fn rewrite_asset_paths(html: &str, source_dir: &Path) -> Result<String, StageError> {
    let base = std::path::absolute(source_dir).map_err(|e| {
        StageError::with_source(
            format!("cannot resolve source directory '{}'", source_dir.display()),
            e,
        )
    })?;
    let base = Url::from_directory_path(&base).map_err(|()| {
        StageError::new(format!(
            "source directory '{}' cannot be expressed as a file URL",
            base.display()
        ))
    })?;

    let rewrite_attr = |attr: &'static str| {
        let base = base.clone();
        move |el: &mut Element<'_, '_>| -> HandlerResult {
            if let Some(value) = el.get_attribute(attr) {
                if let Some(absolute) = absolutise(&value, &base) {
                    el.set_attribute(attr, &absolute)?;
                }
            }
            Ok(())
        }
    };

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("img[src]", rewrite_attr("src")),
                element!("source[src]", rewrite_attr("src")),
                element!("video[src]", rewrite_attr("src")),
                element!("video[poster]", rewrite_attr("poster")),
                element!("audio[src]", rewrite_attr("src")),
                element!("track[src]", rewrite_attr("src")),
                element!("link[href]", rewrite_attr("href")),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| StageError::with_source("HTML rewrite failed", e))
}

/// `Some(file URL)` when `reference` is relative, `None` to leave it alone.
/// The reference is already URL-encoded, so it is resolved as a URL
/// against the directory rather than joined as a file name.
fn absolutise(reference: &str, base: &Url) -> Option<String> {
    let trimmed = reference.trim();
    if !is_relative_reference(trimmed) {
        return None;
    }
    base.join(trimmed).ok().map(String::from)
}

fn is_relative_reference(reference: &str) -> bool {
    !(reference.is_empty()
        || reference.starts_with('#')
        || reference.starts_with('/')
        || reference.starts_with('\\')
        || RE_SCHEME.is_match(reference))
}

/// Replace highlight sentinels with `<mark>` tags. Running it twice is a
/// no-op because no sentinels survive the first pass.
pub fn finalize_highlights(html: &str) -> String {
    if !html.contains(HIGHLIGHT_OPEN) && !html.contains(HIGHLIGHT_CLOSE) {
        return html.to_string();
    }
    html.replace(HIGHLIGHT_OPEN, "<mark>")
        .replace(HIGHLIGHT_CLOSE, "</mark>")
}
