//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each stage is a trait with a single operation so that production wiring
//! and tests can swap any one of them independently. The submodules hold the
//! production implementations.
//!
//! ## Data Flow
//!
//! ```text
//! markdown ──▶ preprocess ──▶ fragment ──▶ rewrite ──▶ style ──▶ cover ──▶ toc ──▶ signature ──▶ render
//!              (markers)      (comrak)     (paths,     (4 layers)                                (Chromium)
//!                                           <mark>)
//! ```
//!
//! 1. [`preprocess`] — normalise the source and protect `==highlight==`
//!    markers from the markdown parser
//! 2. [`fragment`]   — markdown → complete HTML document
//! 3. [`rewrite`]    — relative asset references → `file://` URLs, and
//!    highlight sentinels → `<mark>`
//! 4. [`style`]      — compose the four style layers and embed them
//! 5. [`cover`], [`toc`], [`signature`] — template blocks
//! 6. [`render`]     — print the document to PDF with headless Chromium;
//!    the only stage with process I/O

pub mod cover;
pub mod fragment;
pub mod html;
pub mod preprocess;
pub mod render;
pub mod rewrite;
pub mod signature;
pub mod style;
pub mod toc;

use crate::context::Context;
use crate::error::{RenderError, StageError};
use crate::input::{Cover, Footer, PageLayout, Signature, TableOfContents};
use async_trait::async_trait;

/// Rewrites raw markdown before parsing.
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, markdown: &str) -> String;
}

/// Turns markdown into a complete HTML document.
pub trait FragmentConverter: Send + Sync {
    fn to_html(&self, markdown: &str) -> Result<String, StageError>;
}

/// Embeds a composed style sheet into a document.
pub trait StyleInjector: Send + Sync {
    fn inject_style(&self, html: &str, css: &str) -> Result<String, StageError>;
}

/// Inserts the cover page. Called with `None` when no cover was requested.
pub trait CoverInjector: Send + Sync {
    fn inject_cover(&self, html: &str, cover: Option<&Cover>) -> Result<String, StageError>;
}

/// Inserts the table of contents. Called with `None` when none was requested.
pub trait TocInjector: Send + Sync {
    fn inject_toc(&self, html: &str, toc: Option<&TableOfContents>) -> Result<String, StageError>;
}

/// Appends the signature block. Called with `None` when none was requested.
pub trait SignatureInjector: Send + Sync {
    fn inject_signature(
        &self,
        html: &str,
        signature: Option<&Signature>,
    ) -> Result<String, StageError>;
}

/// Page-level options handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub page: Option<PageLayout>,
    pub footer: Option<Footer>,
}

/// Prints a finished HTML document to PDF.
///
/// Implementations own an external process and must honour `ctx` during
/// their blocking work; the orchestrator does not poll while `render` runs.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        ctx: &Context,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError>;

    /// Release the external process. Called exactly once, at pool shutdown.
    async fn close(&self) -> Result<(), RenderError>;
}
