//! Small HTML helpers shared by the injectors.
//!
//! Injection positions are anchored on the document skeleton produced by
//! [`crate::pipeline::fragment`]: `</head>`, the opening `<body>` tag, the
//! cover end marker, and `</body>`. When an anchor is missing (a custom
//! converter that returns a bare fragment) the block is prepended or
//! appended instead of being dropped.

use crate::error::StageError;
use crate::input::is_url;
use base64::Engine;
use std::path::Path;

/// Comment emitted right after the cover section; the TOC goes after it.
pub const COVER_END_MARKER: &str = "<!-- mdpress:cover-end -->";

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Insert `block` just before `</head>`, creating nothing if absent.
pub fn insert_in_head(html: &str, block: &str) -> String {
    match find_ascii_ci(html, "</head>") {
        Some(idx) => splice(html, idx, block),
        None => format!("{block}{html}"),
    }
}

/// Insert `block` immediately after the opening `<head ...>` tag, ahead of
/// every stylesheet already in the document.
pub fn insert_after_head_open(html: &str, block: &str) -> String {
    insert_after_open_tag(html, "<head", block)
}

/// Insert `block` immediately after the opening `<body ...>` tag.
pub fn insert_after_body_open(html: &str, block: &str) -> String {
    insert_after_open_tag(html, "<body", block)
}

fn insert_after_open_tag(html: &str, tag: &str, block: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    // `<header` must not match `<head`.
    while let Some(rel) = lower[from..].find(tag) {
        let start = from + rel;
        let after = start + tag.len();
        match lower.as_bytes().get(after) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                if let Some(rel_end) = html[after..].find('>') {
                    return splice(html, after + rel_end + 1, block);
                }
                break;
            }
            _ => from = after,
        }
    }
    format!("{block}{html}")
}

/// Insert `block` just before `</body>`.
pub fn insert_before_body_close(html: &str, block: &str) -> String {
    match rfind_ascii_ci(html, "</body>") {
        Some(idx) => splice(html, idx, block),
        None => format!("{html}{block}"),
    }
}

/// Insert `block` after the cover end marker, or after `<body>` when the
/// document has no cover.
pub fn insert_after_cover(html: &str, block: &str) -> String {
    match html.find(COVER_END_MARKER) {
        Some(idx) => splice(html, idx + COVER_END_MARKER.len(), block),
        None => insert_after_body_open(html, block),
    }
}

/// Turn an image reference into something usable in an `src` attribute.
///
/// URLs pass through unchanged. Local files are embedded as base64 data
/// URIs so the renderer needs no file-system access for them.
pub fn image_src(reference: &str) -> Result<String, StageError> {
    if is_url(reference) || reference.starts_with("data:") {
        return Ok(reference.to_string());
    }
    let path = Path::new(reference);
    let bytes = std::fs::read(path).map_err(|e| {
        StageError::with_source(format!("cannot read image '{}'", path.display()), e)
    })?;
    let mime = image_mime(path, &bytes);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

fn image_mime(path: &Path, bytes: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("svg") => "image/svg+xml",
        _ => image::ImageFormat::from_path(path)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream"),
    }
}

fn splice(html: &str, at: usize, block: &str) -> String {
    let mut out = String::with_capacity(html.len() + block.len());
    out.push_str(&html[..at]);
    out.push_str(block);
    out.push_str(&html[at..]);
    out
}

// ASCII lowercasing keeps byte offsets identical to the original string.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

fn rfind_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().rfind(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = "<html><head><title>t</title></head><body class=\"x\"><p>hi</p></body></html>";

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">O'Neil & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&#39;Neil &amp; co&lt;/a&gt;"
        );
    }

    #[test]
    fn head_insertion() {
        let out = insert_in_head(DOC, "<style>s</style>");
        assert!(out.contains("<title>t</title><style>s</style></head>"));
    }

    #[test]
    fn body_open_insertion_skips_attributes() {
        let out = insert_after_body_open(DOC, "<nav/>");
        assert!(out.contains("<body class=\"x\"><nav/><p>hi</p>"));
    }

    #[test]
    fn head_open_insertion_ignores_header_elements() {
        let doc = "<html><body><header>h</header></body></html>";
        assert_eq!(insert_after_head_open(doc, "<s/>"), format!("<s/>{doc}"));
        let out = insert_after_head_open(DOC, "<s/>");
        assert!(out.contains("<head><s/><title>"));
    }

    #[test]
    fn body_close_insertion() {
        let out = insert_before_body_close(DOC, "<footer/>");
        assert!(out.contains("<p>hi</p><footer/></body>"));
    }

    #[test]
    fn fragment_without_skeleton_still_gets_blocks() {
        assert_eq!(insert_after_body_open("<p>x</p>", "<a/>"), "<a/><p>x</p>");
        assert_eq!(insert_before_body_close("<p>x</p>", "<a/>"), "<p>x</p><a/>");
    }

    #[test]
    fn after_cover_uses_marker() {
        let doc = format!("<body><section>c</section>{COVER_END_MARKER}<p>x</p></body>");
        let out = insert_after_cover(&doc, "<nav/>");
        assert!(out.contains(&format!("{COVER_END_MARKER}<nav/><p>x</p>")));
    }

    #[test]
    fn url_image_passes_through() {
        let src = image_src("https://example.com/a.png").unwrap();
        assert_eq!(src, "https://example.com/a.png");
    }

    #[test]
    fn local_png_is_embedded() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        // PNG signature is enough for format sniffing.
        file.write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0])
            .unwrap();
        let src = image_src(file.path().to_str().unwrap()).unwrap();
        assert!(src.starts_with("data:image/png;base64,"), "got: {src}");
    }

    #[test]
    fn missing_image_is_stage_error() {
        assert!(image_src("/no/such/logo.png").is_err());
    }
}
