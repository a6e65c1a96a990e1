//! Table of contents generation.
//!
//! Two `lol_html` passes over the part of the document after the cover:
//! the first collects headings (level, existing id, text), the second
//! assigns slug ids to the headings that lack one. The nested list is built
//! from the collected entries and inserted right after the cover, so cover
//! headings are never listed.

use super::html::{escape_html, insert_after_cover, COVER_END_MARKER};
use super::TocInjector;
use crate::error::StageError;
use crate::input::TableOfContents;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

const HEADINGS: &str = "h1, h2, h3, h4, h5, h6";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Heading {
    level: u8,
    id: Option<String>,
    /// Text as it appears in the markup (entities not decoded).
    text: String,
}

/// Production TOC injector: slug anchors plus a nested `<nav class="toc">`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingTocInjector;

impl TocInjector for HeadingTocInjector {
    fn inject_toc(&self, html: &str, toc: Option<&TableOfContents>) -> Result<String, StageError> {
        let Some(toc) = toc else {
            return Ok(html.to_string());
        };

        let split = html
            .find(COVER_END_MARKER)
            .map(|idx| idx + COVER_END_MARKER.len())
            .unwrap_or(0);
        let (cover_part, content) = html.split_at(split);

        let mut headings = collect_headings(content)?;
        let ids = assign_ids(&mut headings);
        let content = apply_heading_ids(content, &ids)?;

        let min = toc.min_depth_or_default();
        let max = toc.max_depth_or_default();
        let listed: Vec<&Heading> = headings
            .iter()
            .filter(|h| (min..=max).contains(&h.level))
            .collect();

        tracing::debug!(
            headings = headings.len(),
            listed = listed.len(),
            min_depth = min,
            max_depth = max,
            "Building table of contents"
        );

        let nav = render_nav(toc.title_or_default(), &listed);
        Ok(insert_after_cover(&format!("{cover_part}{content}"), &nav))
    }
}

fn collect_headings(html: &str) -> Result<Vec<Heading>, StageError> {
    let headings = Rc::new(RefCell::new(Vec::<Heading>::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(HEADINGS, {
                    let headings = Rc::clone(&headings);
                    move |el| {
                        let level = el
                            .tag_name()
                            .strip_prefix('h')
                            .and_then(|v| v.parse::<u8>().ok())
                            .unwrap_or(0);
                        headings.borrow_mut().push(Heading {
                            level,
                            id: el.get_attribute("id").filter(|id| !id.is_empty()),
                            text: String::new(),
                        });
                        Ok(())
                    }
                }),
                // Headings cannot nest, so text always belongs to the last one.
                text!(HEADINGS, {
                    let headings = Rc::clone(&headings);
                    move |chunk| {
                        if let Some(current) = headings.borrow_mut().last_mut() {
                            current.text.push_str(chunk.as_str());
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| StageError::with_source("heading scan failed", e))?;

    let mut collected = headings.borrow().clone();
    for h in &mut collected {
        h.text = h.text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    Ok(collected)
}

/// Give every heading an id, keeping existing ones. Returns the id each
/// heading should carry, in document order.
fn assign_ids(headings: &mut [Heading]) -> Vec<String> {
    let mut taken: HashSet<String> = headings.iter().filter_map(|h| h.id.clone()).collect();

    headings
        .iter_mut()
        .map(|h| {
            if let Some(id) = &h.id {
                return id.clone();
            }
            let mut base = slug::slugify(decode_entities(&h.text));
            if base.is_empty() {
                base = "section".to_string();
            }
            let mut candidate = base.clone();
            let mut n = 1;
            while taken.contains(&candidate) {
                candidate = format!("{base}-{n}");
                n += 1;
            }
            taken.insert(candidate.clone());
            h.id = Some(candidate.clone());
            candidate
        })
        .collect()
}

fn apply_heading_ids(html: &str, ids: &[String]) -> Result<String, StageError> {
    let ids = Rc::new(ids.to_vec());
    let index = Rc::new(RefCell::new(0usize));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(HEADINGS, {
                let ids = Rc::clone(&ids);
                let index = Rc::clone(&index);
                move |el| {
                    let mut idx = index.borrow_mut();
                    if let Some(id) = ids.get(*idx) {
                        if el.get_attribute("id").as_deref() != Some(id.as_str()) {
                            el.set_attribute("id", id)?;
                        }
                    }
                    *idx += 1;
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| StageError::with_source("heading id assignment failed", e))
}

/// Nested `<ul>` following heading levels. A heading shallower than the
/// current root becomes a sibling at the root.
fn render_nav(title: &str, headings: &[&Heading]) -> String {
    let mut out = format!(
        "\n<nav class=\"toc\">\n<div class=\"toc-title\">{}</div>\n",
        escape_html(title)
    );
    let mut stack: Vec<u8> = Vec::new();

    for h in headings {
        match stack.last().copied() {
            None => {
                out.push_str("<ul>\n<li>");
                stack.push(h.level);
            }
            Some(top) if h.level > top => {
                out.push_str("\n<ul>\n<li>");
                stack.push(h.level);
            }
            Some(_) => {
                while stack.len() > 1 && stack.last().is_some_and(|&top| h.level < top) {
                    out.push_str("</li>\n</ul>\n");
                    stack.pop();
                }
                match stack.last_mut() {
                    Some(top) if h.level > *top => {
                        out.push_str("<ul>\n<li>");
                        stack.push(h.level);
                    }
                    Some(top) => {
                        out.push_str("</li>\n<li>");
                        *top = h.level;
                    }
                    None => {}
                }
            }
        }
        let id = h.id.as_deref().unwrap_or_default();
        out.push_str(&format!(
            "<a href=\"#{}\">{}</a>",
            escape_html(id),
            h.text
        ));
    }
    for _ in &stack {
        out.push_str("</li>\n</ul>\n");
    }
    out.push_str("</nav>\n");
    out
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
