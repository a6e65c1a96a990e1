//! Style composition and injection.
//!
//! The final sheet is four layers in a fixed order:
//!
//! 1. page-break rules (from [`PageBreaks`])
//! 2. watermark rules (from [`Watermark`])
//! 3. base style (built-in or configured sheet)
//! 4. user style (`ConversionInput::css`)
//!
//! Later layers override earlier ones under normal cascade rules, so the
//! order is part of the contract: a caller's CSS always wins.

use super::html::insert_in_head;
use super::StyleInjector;
use crate::error::StageError;
use crate::input::{ConversionInput, PageBreaks, Watermark};

/// The four layers of one document's style sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleLayers {
    pub page_breaks: String,
    pub watermark: String,
    pub base: String,
    pub user: String,
}

impl StyleLayers {
    /// Derive the per-document layers from `input` on top of `base`.
    pub fn for_input(input: &ConversionInput, base: &str) -> Self {
        Self {
            page_breaks: page_break_css(input.page_breaks.as_ref()),
            watermark: watermark_css(input.watermark.as_ref()),
            base: base.to_string(),
            user: input.css.clone().unwrap_or_default(),
        }
    }

    /// Concatenate the non-empty layers in cascade order.
    pub fn compose(&self) -> String {
        [
            self.page_breaks.as_str(),
            self.watermark.as_str(),
            self.base.as_str(),
            self.user.as_str(),
        ]
        .iter()
        .map(|layer| layer.trim())
        .filter(|layer| !layer.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

/// Structural page-break rules. Empty when no policy was requested.
pub fn page_break_css(policy: Option<&PageBreaks>) -> String {
    let Some(policy) = policy else {
        return String::new();
    };

    let mut css = String::from("/* page breaks */\n");
    for (enabled, tag) in [
        (policy.before_h1, "h1"),
        (policy.before_h2, "h2"),
        (policy.before_h3, "h3"),
    ] {
        if enabled {
            css.push_str(&format!(
                "{tag} {{ page-break-before: always; break-before: page; }}\n"
            ));
        }
    }
    // The first heading of the body must not leave a blank page behind.
    if policy.before_h1 || policy.before_h2 || policy.before_h3 {
        css.push_str(
            ".cover + h1, .cover + h2, .cover + h3, .toc + h1, .toc + h2, .toc + h3, \
             body > h1:first-child, body > h2:first-child, body > h3:first-child \
             { page-break-before: auto; break-before: auto; }\n",
        );
    }
    css.push_str(&format!(
        "p, li, blockquote {{ orphans: {}; widows: {}; }}\n",
        policy.orphans_or_default(),
        policy.widows_or_default()
    ));
    css
}

/// Fixed, rotated text behind the page content. Empty when no watermark.
pub fn watermark_css(watermark: Option<&Watermark>) -> String {
    let Some(wm) = watermark else {
        return String::new();
    };
    format!(
        "/* watermark */\n\
         body::before {{\n  \
           content: \"{text}\";\n  \
           position: fixed;\n  \
           top: 50%;\n  \
           left: 50%;\n  \
           transform: translate(-50%, -50%) rotate({angle}deg);\n  \
           font-size: 96px;\n  \
           font-weight: 700;\n  \
           white-space: nowrap;\n  \
           color: {color};\n  \
           opacity: {opacity};\n  \
           pointer-events: none;\n  \
           z-index: 9999;\n\
         }}\n",
        text = escape_css_string(&wm.text),
        angle = wm.angle_or_default(),
        color = wm.color_or_default(),
        opacity = wm.opacity_or_default(),
    )
}

/// Escape text for a double-quoted CSS string.
pub(crate) fn escape_css_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\A "),
            '\r' => {}
            // A literal `</style>` in the text would end the element early.
            '<' => out.push_str("\\3C "),
            c => out.push(c),
        }
    }
    out
}

/// Embeds the sheet as a `<style>` element at the end of `<head>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadStyleInjector;

impl StyleInjector for HeadStyleInjector {
    fn inject_style(&self, html: &str, css: &str) -> Result<String, StageError> {
        if css.trim().is_empty() {
            return Ok(html.to_string());
        }
        let block = format!("<style>\n{css}\n</style>\n");
        Ok(insert_in_head(html, &block))
    }
}
