//! Conversion request and result types.
//!
//! Every structured block on [`ConversionInput`] is optional: `None` means
//! "omit this feature", never "use defaults". Zero-valued fields *inside* a
//! present block fall back to the documented defaults below (for example a
//! TOC block with `min_depth: 0` behaves as `min_depth: 2`).
//!
//! All types are `serde` (de)serialisable so a CLI or service can load the
//! metadata blocks from a JSON document next to the markdown source.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Constraint constants ─────────────────────────────────────────────────

/// Accepted page sizes (case-insensitive).
pub const PAGE_SIZES: [&str; 3] = ["letter", "a4", "legal"];
pub const DEFAULT_PAGE_SIZE: &str = "letter";

/// Accepted orientations (case-insensitive).
pub const ORIENTATIONS: [&str; 2] = ["portrait", "landscape"];
pub const DEFAULT_ORIENTATION: &str = "portrait";

/// Margin bounds in inches; both ends inclusive.
pub const MIN_MARGIN: f64 = 0.25;
pub const MAX_MARGIN: f64 = 3.0;
pub const DEFAULT_MARGIN: f64 = 0.5;

/// Accepted footer positions (case-insensitive); empty means right.
pub const FOOTER_POSITIONS: [&str; 4] = ["", "left", "center", "right"];

pub const DEFAULT_WATERMARK_COLOR: &str = "#888888";
pub const DEFAULT_WATERMARK_OPACITY: f64 = 0.1;
pub const DEFAULT_WATERMARK_ANGLE: f64 = -45.0;

/// Heading-depth bounds for the table of contents.
pub const MIN_TOC_DEPTH: u8 = 1;
pub const MAX_TOC_DEPTH: u8 = 6;
pub const DEFAULT_TOC_MIN_DEPTH: u8 = 2;
pub const DEFAULT_TOC_MAX_DEPTH: u8 = 3;
pub const DEFAULT_TOC_TITLE: &str = "Contents";

/// Orphan / widow line-count bounds for page breaking.
pub const MIN_ORPHANS: u32 = 1;
pub const MAX_ORPHANS: u32 = 5;
pub const DEFAULT_ORPHANS: u32 = 2;
pub const MIN_WIDOWS: u32 = 1;
pub const MAX_WIDOWS: u32 = 5;
pub const DEFAULT_WIDOWS: u32 = 2;

// ── Request ──────────────────────────────────────────────────────────────

/// One conversion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionInput {
    /// Markdown source. Required; whitespace-only counts as empty.
    pub markdown: String,
    /// Caller stylesheet, applied last so it overrides everything else.
    pub css: Option<String>,
    pub page: Option<PageLayout>,
    pub footer: Option<Footer>,
    pub watermark: Option<Watermark>,
    pub cover: Option<Cover>,
    pub toc: Option<TableOfContents>,
    pub signature: Option<Signature>,
    pub page_breaks: Option<PageBreaks>,
    /// Directory relative asset references are resolved against.
    pub source_dir: Option<PathBuf>,
    /// Stop after building the HTML document; never launch the renderer.
    pub html_only: bool,
}

impl ConversionInput {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            ..Self::default()
        }
    }
}

/// Paper size, orientation and uniform margin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    /// `letter`, `a4` or `legal`; empty means letter.
    pub size: String,
    /// `portrait` or `landscape`; empty means portrait.
    pub orientation: String,
    /// Inches; zero means 0.5.
    pub margin: f64,
}

impl PageLayout {
    pub fn size_or_default(&self) -> String {
        non_empty_lower(&self.size, DEFAULT_PAGE_SIZE)
    }

    pub fn orientation_or_default(&self) -> String {
        non_empty_lower(&self.orientation, DEFAULT_ORIENTATION)
    }

    pub fn margin_or_default(&self) -> f64 {
        if self.margin == 0.0 {
            DEFAULT_MARGIN
        } else {
            self.margin
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Footer {
    /// `left`, `center` or `right`; empty means right.
    pub position: String,
    pub show_page_number: bool,
    pub date: String,
    pub status: String,
    pub text: String,
    pub document_id: String,
}

impl Footer {
    pub fn position_or_default(&self) -> String {
        non_empty_lower(&self.position, "right")
    }
}

/// Diagonal text stamped behind every page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watermark {
    pub text: String,
    /// `#rgb` or `#rrggbb`; empty means #888888.
    pub color: String,
    /// 0–1; zero means 0.1.
    pub opacity: f64,
    /// Degrees, −90–90; zero means −45.
    pub angle: f64,
}

impl Watermark {
    pub fn color_or_default(&self) -> &str {
        if self.color.is_empty() {
            DEFAULT_WATERMARK_COLOR
        } else {
            &self.color
        }
    }

    pub fn opacity_or_default(&self) -> f64 {
        if self.opacity == 0.0 {
            DEFAULT_WATERMARK_OPACITY
        } else {
            self.opacity
        }
    }

    pub fn angle_or_default(&self) -> f64 {
        if self.angle == 0.0 {
            DEFAULT_WATERMARK_ANGLE
        } else {
            self.angle
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cover {
    pub title: String,
    pub subtitle: String,
    /// Empty, an `http(s)://` URL, or a local image path that must exist.
    pub logo: String,
    pub author: String,
    pub author_title: String,
    pub organization: String,
    pub date: String,
    pub version: String,
    pub client_name: String,
    pub project_name: String,
    pub document_type: String,
    pub document_id: String,
    pub description: String,
    pub department: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOfContents {
    /// Heading shown above the list; empty means "Contents".
    pub title: String,
    /// Shallowest heading level listed; zero means 2.
    pub min_depth: u8,
    /// Deepest heading level listed; zero means 3.
    pub max_depth: u8,
}

impl TableOfContents {
    pub fn min_depth_or_default(&self) -> u8 {
        if self.min_depth == 0 {
            DEFAULT_TOC_MIN_DEPTH
        } else {
            self.min_depth
        }
    }

    pub fn max_depth_or_default(&self) -> u8 {
        if self.max_depth == 0 {
            DEFAULT_TOC_MAX_DEPTH
        } else {
            self.max_depth
        }
    }

    pub fn title_or_default(&self) -> &str {
        if self.title.is_empty() {
            DEFAULT_TOC_TITLE
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageBreaks {
    pub before_h1: bool,
    pub before_h2: bool,
    pub before_h3: bool,
    /// Minimum lines kept at the bottom of a page; zero means 2.
    pub orphans: u32,
    /// Minimum lines carried to the top of a page; zero means 2.
    pub widows: u32,
}

impl PageBreaks {
    pub fn orphans_or_default(&self) -> u32 {
        if self.orphans == 0 {
            DEFAULT_ORPHANS
        } else {
            self.orphans
        }
    }

    pub fn widows_or_default(&self) -> u32 {
        if self.widows == 0 {
            DEFAULT_WIDOWS
        } else {
            self.widows
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signature {
    pub name: String,
    pub title: String,
    pub email: String,
    pub organization: String,
    pub phone: String,
    pub address: String,
    pub department: String,
    /// Empty, an `http(s)://` URL, or a local image path that must exist.
    pub image_path: String,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    pub label: String,
    pub url: String,
}

// ── Result ───────────────────────────────────────────────────────────────

/// Output of one conversion. Owned by the caller; nothing is shared after
/// return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// The complete HTML document; always populated.
    pub html: String,
    /// Rendered PDF bytes; empty when `html_only` was requested.
    #[serde(skip)]
    pub pdf: Vec<u8>,
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// True for `http://` and `https://` references.
pub fn is_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn non_empty_lower(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.trim().to_ascii_lowercase()
    }
}
