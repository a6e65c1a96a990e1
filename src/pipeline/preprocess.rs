//! Source preprocessing: normalise the markdown before parsing.
//!
//! The markdown parser has no notion of `==highlight==`. Rather than enable
//! raw HTML passthrough for `<mark>`, the preprocessor swaps each marker
//! pair for private-use sentinel characters that survive parsing as plain
//! text; [`crate::pipeline::rewrite::finalize_highlights`] turns them into
//! `<mark>` once the HTML exists. Code spans and fenced blocks are left
//! alone so `a == b` inside code stays literal.

use super::Preprocessor;
use once_cell::sync::Lazy;
use regex::Regex;

/// Opening sentinel for a protected highlight (U+E000, private use).
pub const HIGHLIGHT_OPEN: char = '\u{E000}';
/// Closing sentinel for a protected highlight (U+E001, private use).
pub const HIGHLIGHT_CLOSE: char = '\u{E001}';

static RE_HIGHLIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"==([^=\s](?:[^=\n]*[^=\s])?)==").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(?:[-*+]|\d{1,9}[.)])(?:[ \t]|$)").unwrap());

/// Default preprocessor: line endings, BOM, highlight markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownPreprocessor;

impl Preprocessor for MarkdownPreprocessor {
    fn preprocess(&self, markdown: &str) -> String {
        let s = normalise_line_endings(markdown);
        let s = strip_bom(&s);
        protect_highlights(s)
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{FEFF}').unwrap_or(input)
}

/// Replace `==text==` with sentinels outside code blocks and code spans.
///
/// Code blocks are fenced (```` ``` ```` / `~~~`) or indented by four
/// spaces or a tab after a blank line. Indented lines under a list item
/// are list content, not code.
fn protect_highlights(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut fence: Option<&str> = None;
    let mut prev_blank = true;
    let mut in_indented_code = false;
    let mut in_list = false;

    for line in input.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let blank = trimmed.trim_end().is_empty();

        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            out.push_str(line);
            prev_blank = false;
            continue;
        }

        if blank {
            out.push_str(line);
            prev_blank = true;
            continue;
        }

        let indented = line.starts_with("    ") || line.starts_with('\t');
        if indented && !in_list && (prev_blank || in_indented_code) {
            in_indented_code = true;
            out.push_str(line);
            prev_blank = false;
            continue;
        }
        in_indented_code = false;

        if !indented {
            in_list = RE_LIST_ITEM.is_match(line);
        }
        prev_blank = false;

        if trimmed.starts_with("```") {
            fence = Some("```");
            out.push_str(line);
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            out.push_str(line);
            continue;
        }
        out.push_str(&protect_line(line));
    }

    out
}

/// Even-indexed backtick segments are prose; odd ones are code spans.
fn protect_line(line: &str) -> String {
    if !line.contains("==") {
        return line.to_string();
    }
    line.split('`')
        .enumerate()
        .map(|(i, segment)| {
            if i % 2 == 0 {
                RE_HIGHLIGHT
                    .replace_all(segment, |caps: &regex::Captures<'_>| {
                        format!("{HIGHLIGHT_OPEN}{}{HIGHLIGHT_CLOSE}", &caps[1])
                    })
                    .into_owned()
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("`")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(s: &str) -> String {
        MarkdownPreprocessor.preprocess(s)
    }

    #[test]
    fn crlf_and_bom_are_normalised() {
        assert_eq!(run("\u{FEFF}# A\r\nB\rC"), "# A\nB\nC");
    }

    #[test]
    fn highlight_is_protected() {
        let out = run("this is ==very== important");
        assert_eq!(out, format!("this is {HIGHLIGHT_OPEN}very{HIGHLIGHT_CLOSE} important"));
    }

    #[test]
    fn multiple_highlights_on_one_line() {
        let out = run("==a== and ==b c==");
        assert_eq!(out.matches(HIGHLIGHT_OPEN).count(), 2);
        assert_eq!(out.matches(HIGHLIGHT_CLOSE).count(), 2);
    }

    #[test]
    fn inline_code_is_untouched() {
        let out = run("compare `a ==b== c` with ==d==");
        assert!(out.contains("`a ==b== c`"));
        assert!(out.contains(&format!("{HIGHLIGHT_OPEN}d{HIGHLIGHT_CLOSE}")));
    }

    #[test]
    fn fenced_code_is_untouched() {
        let src = "```\nx ==y==\n```\n==z==\n";
        let out = run(src);
        assert!(out.contains("x ==y==\n"));
        assert!(out.contains(&format!("{HIGHLIGHT_OPEN}z{HIGHLIGHT_CLOSE}")));
    }

    #[test]
    fn indented_code_is_untouched() {
        let out = run("Intro\n\n    let x = ==y==;\n    z\n\n==w==\n");
        assert!(out.contains("    let x = ==y==;\n"), "{out:?}");
        assert!(out.contains(&format!("{HIGHLIGHT_OPEN}w{HIGHLIGHT_CLOSE}")));
    }

    #[test]
    fn indented_list_content_is_still_prose() {
        let out = run("- item\n\n    more ==text== here\n");
        assert!(out.contains(&format!("{HIGHLIGHT_OPEN}text{HIGHLIGHT_CLOSE}")), "{out:?}");
    }

    #[test]
    fn paragraph_continuation_is_not_code() {
        let out = run("first line\n    ==kept== as prose\n");
        assert!(out.contains(HIGHLIGHT_OPEN), "{out:?}");
    }

    #[test]
    fn equality_operators_are_not_highlights() {
        assert_eq!(run("a == b"), "a == b");
        assert_eq!(run("===="), "====");
    }
}
