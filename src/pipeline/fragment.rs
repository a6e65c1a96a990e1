//! Markdown → HTML document via comrak.
//!
//! comrak produces a body fragment; [`wrap_document`] places it in the
//! fixed skeleton the injectors anchor on (`</head>`, `<body>`, `</body>`).

use super::html::escape_html;
use super::FragmentConverter;
use crate::error::StageError;
use comrak::options::Options;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_FIRST_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t#]*$").unwrap());

/// Production converter: GitHub-flavoured markdown with tables, footnotes,
/// task lists and strikethrough.
pub struct ComrakConverter {
    options: Options<'static>,
}

impl Default for ComrakConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ComrakConverter {
    pub fn new() -> Self {
        Self {
            options: default_options(),
        }
    }
}

impl FragmentConverter for ComrakConverter {
    fn to_html(&self, markdown: &str) -> Result<String, StageError> {
        let fragment = comrak::markdown_to_html(markdown, &self.options);
        Ok(wrap_document(&fragment, document_title(markdown).as_deref()))
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.description_lists = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    // Documents are authored by the caller, not untrusted users; raw HTML
    // (page-break divs, inline spans) must survive.
    render.r#unsafe = true;

    options
}

/// Text of the first level-1 ATX heading, used as the document title.
pub fn document_title(markdown: &str) -> Option<String> {
    RE_FIRST_H1
        .captures(markdown)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Place a body fragment inside the standard document skeleton.
pub fn wrap_document(fragment: &str, title: Option<&str>) -> String {
    let title = escape_html(title.unwrap_or("Document"));
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n</head>\n<body>\n{fragment}</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_and_paragraph() {
        let html = ComrakConverter::new().to_html("# Hello\n\nWorld").unwrap();
        assert!(html.contains("<h1>Hello</h1>"), "got: {html}");
        assert!(html.contains("<p>World</p>"), "got: {html}");
        assert!(html.contains("<title>Hello</title>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn tables_are_enabled() {
        let html = ComrakConverter::new()
            .to_html("| a | b |\n|---|---|\n| 1 | 2 |\n")
            .unwrap();
        assert!(html.contains("<table>"), "got: {html}");
    }

    #[test]
    fn title_defaults_when_no_h1() {
        assert_eq!(document_title("## Sub\ntext"), None);
        let html = wrap_document("<p>x</p>", None);
        assert!(html.contains("<title>Document</title>"));
    }

    #[test]
    fn title_is_escaped() {
        let html = wrap_document("", Some("A <b> & C"));
        assert!(html.contains("<title>A &lt;b&gt; &amp; C</title>"));
    }

    #[test]
    fn closing_hashes_are_trimmed_from_title() {
        assert_eq!(document_title("# Report ##\n").as_deref(), Some("Report"));
    }
}
