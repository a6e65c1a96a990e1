//! Error types for the mdpress library.
//!
//! Errors are split by who can act on them:
//!
//! * [`ValidationError`] — the caller sent a malformed request. Detected
//!   before any stage runs; the first violated constraint wins.
//! * [`ConvertError`] — a single conversion failed. Wraps validation,
//!   cancellation, collaborator (stage) failures, renderer failures and
//!   panics caught at the `convert` boundary.
//! * [`PoolError`] — the instance pool could not lend or shut down.
//!
//! Stage failures keep their cause reachable through
//! [`std::error::Error::source`] and are tagged with a [`Stage`], so callers
//! can ask "was this a rendering failure?" without parsing messages.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::context::ContextError;

/// Identifies the pipeline step a [`ConvertError::Stage`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Preprocess,
    Fragment,
    Rewrite,
    Style,
    Cover,
    Toc,
    Signature,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preprocess => "preprocessing",
            Stage::Fragment => "markdown conversion",
            Stage::Rewrite => "asset path rewrite",
            Stage::Style => "style injection",
            Stage::Cover => "cover injection",
            Stage::Toc => "table of contents injection",
            Stage::Signature => "signature injection",
            Stage::Render => "PDF rendering",
        };
        f.write_str(name)
    }
}

/// A request violated one of the documented input constraints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    // ── Source ────────────────────────────────────────────────────────────
    #[error("markdown source is empty")]
    EmptySource,

    // ── Page layout ───────────────────────────────────────────────────────
    #[error("invalid page size '{0}': expected letter, a4 or legal")]
    InvalidPageSize(String),

    #[error("invalid orientation '{0}': expected portrait or landscape")]
    InvalidOrientation(String),

    #[error("margin {value} is out of range: must be between {min} and {max} inches")]
    MarginOutOfRange { value: f64, min: f64, max: f64 },

    // ── Footer ────────────────────────────────────────────────────────────
    #[error("invalid footer position '{0}': expected left, center or right")]
    InvalidFooterPosition(String),

    // ── Watermark ─────────────────────────────────────────────────────────
    #[error("watermark text is empty")]
    EmptyWatermarkText,

    #[error("invalid watermark color '{0}': expected #rgb or #rrggbb")]
    InvalidWatermarkColor(String),

    #[error("watermark opacity {0} is out of range: must be between 0 and 1")]
    WatermarkOpacityOutOfRange(f64),

    #[error("watermark angle {0} is out of range: must be between -90 and 90 degrees")]
    WatermarkAngleOutOfRange(f64),

    // ── Cover ─────────────────────────────────────────────────────────────
    #[error("cover logo not found: '{path}'")]
    LogoNotFound { path: PathBuf },

    // ── Table of contents ─────────────────────────────────────────────────
    #[error("toc min depth {0} is out of range: must be between 1 and 6")]
    TocMinDepthOutOfRange(u8),

    #[error("toc max depth {0} is out of range: must be between 1 and 6")]
    TocMaxDepthOutOfRange(u8),

    #[error("toc min depth {min} is greater than max depth {max}")]
    TocDepthOrder { min: u8, max: u8 },

    // ── Page breaks ───────────────────────────────────────────────────────
    #[error("orphans {0} is out of range: must be between 1 and 5")]
    OrphansOutOfRange(u32),

    #[error("widows {0} is out of range: must be between 1 and 5")]
    WidowsOutOfRange(u32),

    // ── Signature ─────────────────────────────────────────────────────────
    #[error("signature image not found: '{path}'")]
    SignatureImageNotFound { path: PathBuf },
}

/// Failure reported by a stage collaborator.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StageError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Failure inside a [`crate::pipeline::Renderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    BrowserNotFound(#[from] chrome_locate::LocateError),

    #[error("failed to launch browser '{path}': {message}")]
    Launch { path: PathBuf, message: String },

    #[error("browser {op} failed: {message}")]
    Browser { op: &'static str, message: String },

    #[error("browser produced no PDF output")]
    EmptyOutput,

    #[error("rendering timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("rendering interrupted: {0}")]
    Interrupted(#[from] ContextError),

    #[error("renderer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer has been closed")]
    Closed,
}

/// All errors returned by [`crate::convert::Converter::convert`].
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("conversion cancelled: {0}")]
    Cancelled(#[from] ContextError),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("PDF rendering failed: {0}")]
    Render(#[source] RenderError),

    #[error("failed to write output to '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Converter construction failed (unknown style, unreadable stylesheet).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A stage panicked; caught at the `convert` boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn stage(stage: Stage, source: StageError) -> Self {
        ConvertError::Stage { stage, source }
    }

    /// The stage this error originated in, when it came from one.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            ConvertError::Stage { stage, .. } => Some(*stage),
            ConvertError::Render(_) => Some(Stage::Render),
            _ => None,
        }
    }

    /// True for deadline and explicit cancellation, including a renderer
    /// interrupted by its context. Callers may retry these.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ConvertError::Cancelled(_) | ConvertError::Render(RenderError::Interrupted(_))
        )
    }
}

impl From<RenderError> for ConvertError {
    fn from(e: RenderError) -> Self {
        ConvertError::Render(e)
    }
}

/// Errors returned by [`crate::pool::Pool`].
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,

    /// An earlier construction failed; the pool does not retry.
    #[error("pool cannot create new instances: {cause}")]
    Unavailable { cause: String },

    #[error("{} of {total} instances failed to close: {}", failures.len(), failures.join("; "))]
    Shutdown { total: usize, failures: Vec<String> },
}

/// Per-document failure inside [`crate::batch::convert_batch`].
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("could not acquire a converter: {0}")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn stage_error_display_names_stage() {
        let e = ConvertError::stage(Stage::Fragment, StageError::new("bad table"));
        let msg = e.to_string();
        assert!(msg.contains("markdown conversion"), "got: {msg}");
        assert!(msg.contains("bad table"), "got: {msg}");
        assert_eq!(e.failed_stage(), Some(Stage::Fragment));
    }

    #[test]
    fn stage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let e = StageError::with_source("reading logo", io);
        assert!(e.source().unwrap().to_string().contains("disk gone"));
    }

    #[test]
    fn render_error_is_render_stage() {
        let e = ConvertError::from(RenderError::EmptyOutput);
        assert_eq!(e.failed_stage(), Some(Stage::Render));
        assert!(!e.is_cancellation());
    }

    #[test]
    fn interrupted_render_counts_as_cancellation() {
        let e = ConvertError::from(RenderError::Interrupted(ContextError::DeadlineExceeded));
        assert!(e.is_cancellation());
        assert!(ConvertError::Cancelled(ContextError::Cancelled).is_cancellation());
    }

    #[test]
    fn margin_display() {
        let e = ValidationError::MarginOutOfRange {
            value: 5.0,
            min: 0.25,
            max: 3.0,
        };
        assert!(e.to_string().contains("0.25"));
        assert!(e.to_string().contains('5'));
    }

    #[test]
    fn shutdown_display_counts_failures() {
        let e = PoolError::Shutdown {
            total: 4,
            failures: vec!["a".into(), "b".into()],
        };
        assert!(e.to_string().starts_with("2 of 4"), "got: {e}");
    }
}
