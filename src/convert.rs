//! The conversion pipeline orchestrator.
//!
//! [`Converter::convert`] validates a request, runs the stages in their fixed
//! order, and (unless `html_only` is set) hands the finished document to the
//! renderer. A `Converter` is built once and reused; in a [`Pool`] each
//! instance owns its own renderer.
//!
//! ## Panic boundary
//!
//! The whole staged sequence runs inside one `catch_unwind`. Stages do not
//! guard themselves: a panic anywhere surfaces to the caller as
//! [`ConvertError::Internal`] instead of tearing down the task.

use crate::assets;
use crate::config::{ConverterConfig, PoolConfig};
use crate::context::Context;
use crate::error::{ConvertError, RenderError, Stage};
use crate::input::{ConversionInput, ConversionResult};
use crate::pipeline::cover::TemplateCoverInjector;
use crate::pipeline::fragment::ComrakConverter;
use crate::pipeline::preprocess::MarkdownPreprocessor;
use crate::pipeline::render::ChromeRenderer;
use crate::pipeline::rewrite::{finalize_highlights, rewrite_asset_paths};
use crate::pipeline::signature::TemplateSignatureInjector;
use crate::pipeline::style::{HeadStyleInjector, StyleLayers};
use crate::pipeline::toc::HeadingTocInjector;
use crate::pipeline::{
    CoverInjector, FragmentConverter, Preprocessor, RenderOptions, Renderer, SignatureInjector,
    StyleInjector, TocInjector,
};
use crate::pool::{Pool, PoolResource};
use crate::validate::validate_input;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// One fully wired pipeline.
pub struct Converter {
    preprocessor: Arc<dyn Preprocessor>,
    fragment_converter: Arc<dyn FragmentConverter>,
    style_injector: Arc<dyn StyleInjector>,
    cover_injector: Arc<dyn CoverInjector>,
    toc_injector: Arc<dyn TocInjector>,
    signature_injector: Arc<dyn SignatureInjector>,
    renderer: Arc<dyn Renderer>,
    base_css: String,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("base_css_bytes", &self.base_css.len())
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Wire a converter from `config`, filling unset slots with the
    /// production stages.
    ///
    /// # Errors
    /// [`ConvertError::Config`] when the configured style is neither a
    /// built-in name nor a readable CSS file.
    pub fn new(config: &ConverterConfig) -> Result<Self, ConvertError> {
        let base_css = if config.no_style {
            String::new()
        } else {
            assets::resolve_style(&config.style)?
        };

        let renderer: Arc<dyn Renderer> = match &config.renderer {
            Some(r) => Arc::clone(r),
            None => Arc::new(
                ChromeRenderer::new(
                    config.chrome_path.clone(),
                    Duration::from_secs(config.render_timeout_secs),
                )
                .with_extra_args(config.chrome_args.clone()),
            ),
        };

        debug!(
            style = %config.style,
            no_style = config.no_style,
            base_css_bytes = base_css.len(),
            "Converter created"
        );

        Ok(Self {
            preprocessor: config
                .preprocessor
                .clone()
                .unwrap_or_else(|| Arc::new(MarkdownPreprocessor)),
            fragment_converter: config
                .fragment_converter
                .clone()
                .unwrap_or_else(|| Arc::new(ComrakConverter::new())),
            style_injector: config
                .style_injector
                .clone()
                .unwrap_or_else(|| Arc::new(HeadStyleInjector)),
            cover_injector: config
                .cover_injector
                .clone()
                .unwrap_or_else(|| Arc::new(TemplateCoverInjector)),
            toc_injector: config
                .toc_injector
                .clone()
                .unwrap_or_else(|| Arc::new(HeadingTocInjector)),
            signature_injector: config
                .signature_injector
                .clone()
                .unwrap_or_else(|| Arc::new(TemplateSignatureInjector)),
            renderer,
            base_css,
        })
    }

    /// A pool whose instances are built from `config` on demand.
    pub fn pool(config: ConverterConfig, pool: PoolConfig) -> Pool<Converter> {
        let size = pool.size();
        info!(size, requested = pool.workers, "Creating converter pool");
        Pool::new(size, move || {
            let config = config.clone();
            async move { Converter::new(&config) }
        })
    }

    /// The base style layer this converter applies.
    pub fn base_css(&self) -> &str {
        &self.base_css
    }

    /// Convert one document.
    ///
    /// # Errors
    /// - [`ConvertError::Validation`]: first violated input constraint; no
    ///   stage has run.
    /// - [`ConvertError::Cancelled`]: `ctx` was done at a checkpoint.
    /// - [`ConvertError::Stage`] / [`ConvertError::Render`]: a stage failed.
    /// - [`ConvertError::Internal`]: a stage panicked.
    pub async fn convert(
        &self,
        ctx: &Context,
        input: &ConversionInput,
    ) -> Result<ConversionResult, ConvertError> {
        let started_at = Instant::now();

        let outcome = AssertUnwindSafe(self.run(ctx, input)).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(error = %message, "Conversion stage panicked");
                Err(ConvertError::Internal(message))
            }
        };

        match &result {
            Ok(out) => info!(
                html_bytes = out.html.len(),
                pdf_bytes = out.pdf.len(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Conversion complete"
            ),
            Err(e) => debug!(
                error = %e,
                stage = ?e.failed_stage(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Conversion failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        ctx: &Context,
        input: &ConversionInput,
    ) -> Result<ConversionResult, ConvertError> {
        // ── Step 1: Validate ─────────────────────────────────────────────
        validate_input(input)?;

        // ── Step 2: Preprocess ───────────────────────────────────────────
        ctx.check()?;
        let markdown = self.preprocessor.preprocess(&input.markdown);
        ctx.check()?;

        // ── Step 3: Markdown → HTML, anchor relative assets ──────────────
        let mut html = self
            .fragment_converter
            .to_html(&markdown)
            .map_err(|e| ConvertError::stage(Stage::Fragment, e))?;
        if let Some(dir) = &input.source_dir {
            html = rewrite_asset_paths(&html, dir)
                .map_err(|e| ConvertError::stage(Stage::Rewrite, e))?;
        }

        // ── Step 4: Highlights ───────────────────────────────────────────
        html = finalize_highlights(&html);

        // ── Step 5: Style ────────────────────────────────────────────────
        let css = StyleLayers::for_input(input, &self.base_css).compose();
        html = self
            .style_injector
            .inject_style(&html, &css)
            .map_err(|e| ConvertError::stage(Stage::Style, e))?;
        ctx.check()?;

        // ── Step 6–8: Template blocks ────────────────────────────────────
        html = self
            .cover_injector
            .inject_cover(&html, input.cover.as_ref())
            .map_err(|e| ConvertError::stage(Stage::Cover, e))?;
        html = self
            .toc_injector
            .inject_toc(&html, input.toc.as_ref())
            .map_err(|e| ConvertError::stage(Stage::Toc, e))?;
        html = self
            .signature_injector
            .inject_signature(&html, input.signature.as_ref())
            .map_err(|e| ConvertError::stage(Stage::Signature, e))?;

        // ── Step 9: HTML only ────────────────────────────────────────────
        if input.html_only {
            debug!(html_bytes = html.len(), "Skipping render (html_only)");
            return Ok(ConversionResult {
                html,
                pdf: Vec::new(),
            });
        }

        // ── Step 10: Render ──────────────────────────────────────────────
        ctx.check()?;
        let options = RenderOptions {
            page: input.page.clone(),
            footer: input.footer.clone(),
        };
        let pdf = self.renderer.render(ctx, &html, &options).await?;

        Ok(ConversionResult { html, pdf })
    }

    /// Synchronous wrapper around [`convert`](Self::convert).
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn convert_sync(&self, input: &ConversionInput) -> Result<ConversionResult, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.convert(&Context::background(), input))
    }
}

#[async_trait]
impl PoolResource for Converter {
    type CloseError = RenderError;

    async fn close(&self) -> Result<(), RenderError> {
        self.renderer.close().await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("stage panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("stage panicked: {s}")
    } else {
        "stage panicked".to_string()
    }
}

/// Write `bytes` to `path` atomically (temp file + rename), creating parent
/// directories as needed. A reader never sees a partial file.
pub async fn write_output(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), ConvertError> {
    let path = path.as_ref();
    let write_err = |source| ConvertError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    debug!(path = %path.display(), bytes = bytes.len(), "Output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;

    struct PanickingToc;

    impl TocInjector for PanickingToc {
        fn inject_toc(
            &self,
            _html: &str,
            _toc: Option<&crate::input::TableOfContents>,
        ) -> Result<String, StageError> {
            panic!("toc exploded")
        }
    }

    struct FailingFragment;

    impl FragmentConverter for FailingFragment {
        fn to_html(&self, _markdown: &str) -> Result<String, StageError> {
            Err(StageError::new("parser gave up"))
        }
    }

    fn html_only(markdown: &str) -> ConversionInput {
        ConversionInput {
            html_only: true,
            ..ConversionInput::new(markdown)
        }
    }

    #[tokio::test]
    async fn hello_world_html_only() {
        let converter = Converter::new(&ConverterConfig::default()).unwrap();
        let out = converter
            .convert(&Context::background(), &html_only("# Hello\n\nWorld"))
            .await
            .unwrap();
        assert!(out.html.contains("<h1>Hello</h1>"), "{}", out.html);
        assert!(out.html.contains("<p>World</p>"));
        assert!(out.pdf.is_empty());
    }

    #[tokio::test]
    async fn panic_becomes_internal_error() {
        let config = ConverterConfig::builder()
            .toc_injector(Arc::new(PanickingToc))
            .build()
            .unwrap();
        let converter = Converter::new(&config).unwrap();
        let err = converter
            .convert(&Context::background(), &html_only("# x"))
            .await
            .unwrap_err();
        match err {
            ConvertError::Internal(msg) => assert!(msg.contains("toc exploded"), "{msg}"),
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stage_errors_are_tagged() {
        let config = ConverterConfig::builder()
            .fragment_converter(Arc::new(FailingFragment))
            .build()
            .unwrap();
        let converter = Converter::new(&config).unwrap();
        let err = converter
            .convert(&Context::background(), &html_only("# x"))
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(Stage::Fragment));
        assert!(err.to_string().contains("parser gave up"));
    }

    #[tokio::test]
    async fn highlights_are_finalised() {
        let converter = Converter::new(&ConverterConfig::default()).unwrap();
        let out = converter
            .convert(&Context::background(), &html_only("a ==key== point"))
            .await
            .unwrap();
        assert!(out.html.contains("<mark>key</mark>"), "{}", out.html);
    }

    #[tokio::test]
    async fn no_style_leaves_base_layer_empty() {
        let config = ConverterConfig::builder().no_style(true).build().unwrap();
        let converter = Converter::new(&config).unwrap();
        assert_eq!(converter.base_css(), "");
        let out = converter
            .convert(&Context::background(), &html_only("text"))
            .await
            .unwrap();
        assert!(!out.html.contains("<style>"));
    }

    #[test]
    fn unknown_style_fails_construction() {
        let config = ConverterConfig::builder()
            .style("no-such-style")
            .build()
            .unwrap();
        assert!(matches!(
            Converter::new(&config),
            Err(ConvertError::Config(_))
        ));
    }

    #[tokio::test]
    async fn write_output_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.html");
        write_output(&path, b"<html></html>").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<html></html>");
        assert!(!dir.path().join("nested").join("out.html.tmp").exists());
    }
}
