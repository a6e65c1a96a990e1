//! Built-in stylesheets.
//!
//! These are the base layer of the composed style sheet. A converter picks
//! one by name at construction; an unknown name fails construction rather
//! than silently rendering unstyled documents. A name that is a path to an
//! existing `.css` file is read from disk instead.
//!
//! Editing a sheet here changes every document rendered with it, so keep
//! selectors generic (element and `.cover` / `.toc` / `.signature` classes
//! emitted by the injectors) and leave per-document tweaks to the caller's
//! own CSS layer.

use crate::error::ConvertError;
use std::path::Path;

/// Name used when the configuration does not choose a style.
pub const DEFAULT_STYLE: &str = "default";

/// Clean proportional typography for reports and letters.
pub const DEFAULT_CSS: &str = r#"html { font-size: 11pt; }
body {
  font-family: -apple-system, "Segoe UI", "Helvetica Neue", Arial, sans-serif;
  line-height: 1.5;
  color: #1f2328;
  margin: 0;
}
h1, h2, h3, h4, h5, h6 { line-height: 1.25; margin: 1.4em 0 0.6em; page-break-after: avoid; }
h1 { font-size: 2em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.3em; }
h2 { font-size: 1.5em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.3em; }
h3 { font-size: 1.25em; }
p, ul, ol, table, pre, blockquote { margin: 0 0 1em; }
a { color: #0969da; text-decoration: none; }
code { font-family: "SFMono-Regular", Consolas, "Liberation Mono", monospace; font-size: 0.9em; }
pre { background: #f6f8fa; padding: 0.8em 1em; border-radius: 6px; overflow-x: auto; page-break-inside: avoid; }
blockquote { border-left: 0.25em solid #d0d7de; padding: 0 1em; color: #59636e; }
table { border-collapse: collapse; width: 100%; page-break-inside: avoid; }
th, td { border: 1px solid #d0d7de; padding: 0.4em 0.8em; }
th { background: #f6f8fa; }
img { max-width: 100%; }
mark { background: #fff3a3; padding: 0 0.1em; }
.cover { min-height: 90vh; display: flex; flex-direction: column; justify-content: center; text-align: center; page-break-after: always; }
.cover-logo { max-height: 120px; margin: 0 auto 2em; }
.cover-title { font-size: 2.6em; border: none; margin: 0 0 0.3em; }
.cover-subtitle { font-size: 1.3em; color: #59636e; margin: 0 0 2em; }
.cover-meta { color: #59636e; margin: 0.2em 0; }
.toc { page-break-after: always; }
.toc ul { list-style: none; padding-left: 1.2em; }
.toc > ul { padding-left: 0; }
.toc a { color: inherit; }
.signature { margin-top: 3em; page-break-inside: avoid; }
.signature-image { max-height: 60px; display: block; margin-bottom: 0.5em; }
.signature-name { font-weight: 600; }
"#;

/// Denser sheet for specifications and API documents.
pub const TECHNICAL_CSS: &str = r#"html { font-size: 10pt; }
body {
  font-family: "IBM Plex Sans", "Segoe UI", Arial, sans-serif;
  line-height: 1.45;
  color: #111;
  margin: 0;
}
h1, h2, h3, h4 { font-family: "IBM Plex Sans Condensed", Arial, sans-serif; page-break-after: avoid; }
h1 { font-size: 1.9em; counter-reset: h2; }
h2 { font-size: 1.4em; counter-increment: h2; counter-reset: h3; }
h2::before { content: counter(h2) ". "; }
h3 { font-size: 1.15em; counter-increment: h3; }
h3::before { content: counter(h2) "." counter(h3) " "; }
code, pre { font-family: "IBM Plex Mono", Consolas, monospace; }
pre { background: #f4f4f4; border-left: 3px solid #0f62fe; padding: 0.6em 0.9em; page-break-inside: avoid; }
table { border-collapse: collapse; width: 100%; font-size: 0.95em; }
th, td { border: 1px solid #c6c6c6; padding: 0.3em 0.6em; text-align: left; }
th { background: #e0e0e0; }
img { max-width: 100%; }
mark { background: #d0e2ff; }
.cover { min-height: 90vh; display: flex; flex-direction: column; justify-content: flex-end; page-break-after: always; }
.cover-logo { max-height: 80px; align-self: flex-start; margin-bottom: auto; }
.cover-title { font-size: 2.4em; margin: 0; }
.cover-subtitle { font-size: 1.2em; color: #525252; }
.cover-meta { color: #525252; margin: 0.1em 0; }
.toc { page-break-after: always; }
.toc ul { list-style: none; padding-left: 1em; }
.toc > ul { padding-left: 0; }
.signature { margin-top: 2.5em; border-top: 1px solid #c6c6c6; padding-top: 1em; page-break-inside: avoid; }
.signature-image { max-height: 50px; display: block; }
"#;

/// Typography-only sheet: no colours, no borders.
pub const MINIMAL_CSS: &str = r#"body { font-family: Georgia, "Times New Roman", serif; line-height: 1.6; margin: 0; }
h1, h2, h3 { page-break-after: avoid; }
pre, table { page-break-inside: avoid; }
img { max-width: 100%; }
.cover { page-break-after: always; text-align: center; padding-top: 30vh; }
.toc { page-break-after: always; }
.signature { margin-top: 3em; }
"#;

/// Names accepted by [`resolve_style`].
pub const STYLE_NAMES: [&str; 3] = ["default", "technical", "minimal"];

/// Look up a built-in stylesheet by name (case-insensitive).
pub fn builtin_style(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "default" => Some(DEFAULT_CSS),
        "technical" => Some(TECHNICAL_CSS),
        "minimal" => Some(MINIMAL_CSS),
        _ => None,
    }
}

/// Resolve a style name or a path to a `.css` file into stylesheet text.
pub fn resolve_style(name_or_path: &str) -> Result<String, ConvertError> {
    if let Some(css) = builtin_style(name_or_path) {
        return Ok(css.to_string());
    }

    let path = Path::new(name_or_path);
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("css")) {
        return std::fs::read_to_string(path).map_err(|e| {
            ConvertError::Config(format!("cannot read style '{}': {e}", path.display()))
        });
    }

    Err(ConvertError::Config(format!(
        "unknown style '{name_or_path}': expected one of {} or a path to a .css file",
        STYLE_NAMES.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_names_resolve() {
        for name in STYLE_NAMES {
            assert!(builtin_style(name).is_some(), "{name}");
        }
        assert!(builtin_style("Technical").is_some());
    }

    #[test]
    fn unknown_style_is_config_error() {
        let err = resolve_style("baroque").unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
        assert!(err.to_string().contains("baroque"));
    }

    #[test]
    fn css_file_is_read_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".css").tempfile().unwrap();
        write!(file, "body {{ color: teal; }}").unwrap();
        let css = resolve_style(file.path().to_str().unwrap()).unwrap();
        assert!(css.contains("teal"));
    }

    #[test]
    fn missing_css_file_is_config_error() {
        let err = resolve_style("/no/such/dir/house.css").unwrap_err();
        assert!(err.to_string().contains("house.css"));
    }
}
