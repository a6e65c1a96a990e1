//! Cover page template.

use super::html::{escape_html, image_src, insert_after_body_open, COVER_END_MARKER};
use super::CoverInjector;
use crate::error::StageError;
use crate::input::Cover;

/// Renders [`Cover`] into a `<section class="cover">` at the top of the body.
///
/// Empty fields are omitted rather than rendered as blank lines. The section
/// is always followed by [`COVER_END_MARKER`], which the TOC injector uses
/// both as its insertion point and as the boundary for heading discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCoverInjector;

impl CoverInjector for TemplateCoverInjector {
    fn inject_cover(&self, html: &str, cover: Option<&Cover>) -> Result<String, StageError> {
        let Some(cover) = cover else {
            return Ok(html.to_string());
        };
        let block = format!("{}{COVER_END_MARKER}\n", render_cover(cover)?);
        Ok(insert_after_body_open(html, &block))
    }
}

fn render_cover(cover: &Cover) -> Result<String, StageError> {
    let mut out = String::from("\n<section class=\"cover\">\n");

    if !cover.logo.is_empty() {
        let src = image_src(&cover.logo)?;
        out.push_str(&format!(
            "<img class=\"cover-logo\" src=\"{}\" alt=\"\">\n",
            escape_html(&src)
        ));
    }
    // Titles are divs so they never appear as document headings.
    push_field(&mut out, "div", "cover-title", &cover.title);
    push_field(&mut out, "div", "cover-subtitle", &cover.subtitle);
    push_field(&mut out, "p", "cover-meta cover-document-type", &cover.document_type);
    push_field(&mut out, "p", "cover-description", &cover.description);

    let labelled = [
        ("Client", &cover.client_name),
        ("Project", &cover.project_name),
        ("Prepared by", &cover.author),
        ("Role", &cover.author_title),
        ("Department", &cover.department),
        ("Organization", &cover.organization),
        ("Date", &cover.date),
        ("Version", &cover.version),
        ("Document ID", &cover.document_id),
    ];
    let rows: Vec<_> = labelled.iter().filter(|(_, v)| !v.is_empty()).collect();
    if !rows.is_empty() {
        out.push_str("<dl class=\"cover-details\">\n");
        for (label, value) in rows {
            out.push_str(&format!(
                "<div class=\"cover-meta\"><dt>{label}</dt><dd>{}</dd></div>\n",
                escape_html(value)
            ));
        }
        out.push_str("</dl>\n");
    }

    out.push_str("</section>\n");
    Ok(out)
}

fn push_field(out: &mut String, tag: &str, class: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push_str(&format!(
        "<{tag} class=\"{class}\">{}</{tag}>\n",
        escape_html(value)
    ));
}
