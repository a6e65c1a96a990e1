//! # mdpress
//!
//! Convert Markdown documents to styled HTML and PDF with a pooled
//! headless-Chromium renderer.
//!
//! ## Why this crate?
//!
//! Turning a Markdown report into a print-ready PDF needs more than a
//! Markdown parser: a cover page, a table of contents, a signature block,
//! page size and margins, footers, watermarks, and a stylesheet that a
//! caller can override. Printing through a real browser engine gets CSS
//! paged media right, but browsers are expensive. This crate sequences the
//! document stages and lends browser-backed converters out of a bounded,
//! lazily filled pool.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Validate    first violated constraint wins
//!  ├─ 2. Preprocess  normalise source, protect ==highlights==
//!  ├─ 3. Fragment    comrak → HTML document; anchor relative assets
//!  ├─ 4. Highlights  sentinels → <mark>
//!  ├─ 5. Style       page breaks < watermark < base style < user CSS
//!  ├─ 6. Cover       template block (optional)
//!  ├─ 7. TOC         slug anchors + nested list, cover excluded (optional)
//!  ├─ 8. Signature   template block (optional)
//!  └─ 9. Render      pooled headless Chromium over DevTools (skipped for html_only)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdpress::{Context, ConversionInput, Converter, ConverterConfig, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Converter::pool(ConverterConfig::default(), PoolConfig::default());
//!
//!     let converter = pool.acquire().await?;
//!     let input = ConversionInput::new("# Report\n\nAll systems nominal.");
//!     let result = converter.convert(&Context::background(), &input).await?;
//!     converter.release();
//!
//!     mdpress::write_output("report.pdf", &result.pdf).await?;
//!     pool.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdpress` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdpress = { version = "0.3", default-features = false }
//! ```
//!
//! ## Browser discovery
//!
//! The renderer looks for Chromium or Chrome in this order: an explicit
//! path from [`ConverterConfig::chrome_path`], `MDPRESS_CHROME_PATH`,
//! well-known install locations, then `PATH`. See the `chrome-locate` crate.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assets;
pub mod batch;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{collect_batch, convert_batch, BatchItem, BatchOutcome, BatchStream};
pub use config::{ConverterConfig, ConverterConfigBuilder, PoolConfig};
pub use context::{CancelHandle, Context, ContextError};
pub use convert::{write_output, Converter};
pub use error::{
    BatchError, ConvertError, PoolError, RenderError, Stage, StageError, ValidationError,
};
pub use input::{
    ConversionInput, ConversionResult, Cover, Footer, Link, PageBreaks, PageLayout, Signature,
    TableOfContents, Watermark,
};
pub use pipeline::RenderOptions;
pub use pool::{resolve_pool_size, Lease, Pool, PoolResource};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use validate::validate_input;
