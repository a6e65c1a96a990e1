//! Converter integration tests with fake collaborators.
//!
//! No browser is launched: every test either sets `html_only` or injects a
//! fake renderer that records how often it was called.

use async_trait::async_trait;
use mdpress::pipeline::style::HeadStyleInjector;
use mdpress::pipeline::cover::TemplateCoverInjector;
use mdpress::pipeline::{CoverInjector, Preprocessor, Renderer, StyleInjector};
use mdpress::{
    CancelHandle, Context, ConversionInput, ConvertError, Converter, ConverterConfig, Cover,
    PageBreaks, RenderError, RenderOptions, Stage, StageError, TableOfContents, ValidationError,
    Watermark,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingRenderer {
    renders: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Renderer for CountingRenderer {
    async fn render(
        &self,
        _ctx: &Context,
        _html: &str,
        _options: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(RenderError::EmptyOutput)
        } else {
            Ok(b"%PDF-1.7 fake".to_vec())
        }
    }

    async fn close(&self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Delegates to the production injector and keeps every sheet it was given.
#[derive(Default)]
struct RecordingStyle {
    sheets: Mutex<Vec<String>>,
}

impl StyleInjector for RecordingStyle {
    fn inject_style(&self, html: &str, css: &str) -> Result<String, StageError> {
        self.sheets.lock().unwrap().push(css.to_string());
        HeadStyleInjector.inject_style(html, css)
    }
}

struct PanickingPreprocessor;

impl Preprocessor for PanickingPreprocessor {
    fn preprocess(&self, _markdown: &str) -> String {
        panic!("preprocessor exploded");
    }
}

/// Cancels the caller's context while preprocessing, like a user hitting
/// Ctrl-C mid-conversion.
struct CancellingPreprocessor {
    cancel: CancelHandle,
}

impl Preprocessor for CancellingPreprocessor {
    fn preprocess(&self, markdown: &str) -> String {
        self.cancel.cancel();
        markdown.to_string()
    }
}

/// Cancels the caller's context during style injection.
struct CancellingStyle {
    cancel: CancelHandle,
}

impl StyleInjector for CancellingStyle {
    fn inject_style(&self, html: &str, css: &str) -> Result<String, StageError> {
        self.cancel.cancel();
        HeadStyleInjector.inject_style(html, css)
    }
}

#[derive(Default)]
struct CountingCover {
    calls: AtomicUsize,
}

impl CoverInjector for CountingCover {
    fn inject_cover(&self, html: &str, cover: Option<&Cover>) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TemplateCoverInjector.inject_cover(html, cover)
    }
}

fn converter(renderer: &Arc<CountingRenderer>) -> Converter {
    let renderer: Arc<dyn Renderer> = renderer.clone();
    let config = ConverterConfig::builder().renderer(renderer).build().unwrap();
    Converter::new(&config).unwrap()
}

fn html_only(markdown: &str) -> ConversionInput {
    ConversionInput {
        html_only: true,
        ..ConversionInput::new(markdown)
    }
}

fn toc_section(html: &str) -> &str {
    let start = html.find("<nav class=\"toc\">").expect("toc nav present");
    let end = start + html[start..].find("</nav>").expect("toc nav closed");
    &html[start..end]
}

// ── Orchestration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn hello_world_html_only() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let out = c
        .convert(&Context::background(), &html_only("# Hello\n\nWorld"))
        .await
        .unwrap();

    assert!(out.html.contains("<h1>Hello</h1>"), "html: {}", out.html);
    assert!(out.html.contains("<p>World</p>"), "html: {}", out.html);
    assert!(out.pdf.is_empty());
}

#[tokio::test]
async fn html_only_never_calls_renderer() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let input = ConversionInput {
        cover: Some(Cover {
            title: "Report".into(),
            ..Cover::default()
        }),
        toc: Some(TableOfContents::default()),
        ..html_only("# Report\n\n## One\n\ntext")
    };
    let out = c.convert(&Context::background(), &input).await.unwrap();

    assert!(!out.html.is_empty());
    assert!(out.pdf.is_empty());
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn render_output_is_returned() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let out = c
        .convert(&Context::background(), &ConversionInput::new("# Doc"))
        .await
        .unwrap();

    assert_eq!(out.pdf, b"%PDF-1.7 fake");
    assert!(out.html.contains("<h1>Doc</h1>"));
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn style_layers_follow_cascade_order() {
    let renderer = Arc::new(CountingRenderer::default());
    let style = Arc::new(RecordingStyle::default());
    let config = ConverterConfig::builder()
        .renderer(renderer.clone())
        .style_injector(style.clone())
        .build()
        .unwrap();
    let c = Converter::new(&config).unwrap();

    let input = ConversionInput {
        css: Some(".user-rule { color: teal; }".into()),
        watermark: Some(Watermark {
            text: "DRAFT".into(),
            ..Watermark::default()
        }),
        page_breaks: Some(PageBreaks {
            before_h2: true,
            ..PageBreaks::default()
        }),
        ..html_only("# Title\n\n## Part")
    };
    let out = c.convert(&Context::background(), &input).await.unwrap();

    let sheets = style.sheets.lock().unwrap();
    assert_eq!(sheets.len(), 1);
    let css = &sheets[0];

    let page_breaks = css.find("page-break-before").expect("page-break layer");
    let watermark = css.find("DRAFT").expect("watermark layer");
    let base = css.find(c.base_css().trim()).expect("base layer");
    let user = css.find(".user-rule").expect("user layer");
    assert!(page_breaks < watermark, "page breaks must precede watermark");
    assert!(watermark < base, "watermark must precede base style");
    assert!(base < user, "base style must precede user css");

    assert!(out.html.contains(".user-rule { color: teal; }"));
}

#[tokio::test]
async fn relative_assets_are_anchored_to_source_dir() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let markdown = "![a](img/a.png)\n\n![b](b.png)\n\n![c](/srv/static/c.png)\n\n![d](https://example.com/d.png)\n";
    let input = ConversionInput {
        source_dir: Some(dir.path().to_path_buf()),
        ..html_only(markdown)
    };
    let out = c.convert(&Context::background(), &input).await.unwrap();

    assert!(!out.html.contains("src=\"img/a.png\""), "html: {}", out.html);
    assert!(!out.html.contains("src=\"b.png\""), "html: {}", out.html);
    assert_eq!(out.html.matches("src=\"file://").count(), 2, "html: {}", out.html);
    assert!(out.html.contains("img/a.png\""));
    assert!(out.html.contains("src=\"/srv/static/c.png\""));
    assert!(out.html.contains("src=\"https://example.com/d.png\""));
}

#[tokio::test]
async fn without_source_dir_assets_are_untouched() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let out = c
        .convert(
            &Context::background(),
            &html_only("![a](img/a.png)\n\n![c](/srv/static/c.png)\n"),
        )
        .await
        .unwrap();

    assert!(out.html.contains("src=\"img/a.png\""));
    assert!(out.html.contains("src=\"/srv/static/c.png\""));
    assert!(!out.html.contains("file://"));
}

#[tokio::test]
async fn cancelled_context_skips_renderer() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);
    let (ctx, cancel) = Context::with_cancel();
    cancel.cancel();

    let err = c
        .convert(&ctx, &ConversionInput::new("# Doc"))
        .await
        .unwrap_err();

    assert!(err.is_cancellation(), "got: {err}");
    assert!(matches!(err, ConvertError::Cancelled(_)));
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_during_preprocess_stops_before_later_stages() {
    let renderer = Arc::new(CountingRenderer::default());
    let cover = Arc::new(CountingCover::default());
    let (ctx, cancel) = Context::with_cancel();
    let config = ConverterConfig::builder()
        .preprocessor(Arc::new(CancellingPreprocessor { cancel }))
        .cover_injector(cover.clone())
        .renderer(renderer.clone())
        .build()
        .unwrap();
    let c = Converter::new(&config).unwrap();

    let err = c
        .convert(&ctx, &ConversionInput::new("# Doc"))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Cancelled(_)), "got: {err}");
    assert_eq!(cover.calls.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_during_style_stops_before_templates() {
    let renderer = Arc::new(CountingRenderer::default());
    let cover = Arc::new(CountingCover::default());
    let (ctx, cancel) = Context::with_cancel();
    let config = ConverterConfig::builder()
        .style_injector(Arc::new(CancellingStyle { cancel }))
        .cover_injector(cover.clone())
        .renderer(renderer.clone())
        .build()
        .unwrap();
    let c = Converter::new(&config).unwrap();

    let input = ConversionInput {
        cover: Some(Cover {
            title: "Report".into(),
            ..Cover::default()
        }),
        ..ConversionInput::new("# Doc")
    };
    let err = c.convert(&ctx, &input).await.unwrap_err();

    assert!(matches!(err, ConvertError::Cancelled(_)), "got: {err}");
    assert_eq!(cover.calls.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn orphans_error_wins_over_widows() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let input = ConversionInput {
        page_breaks: Some(PageBreaks {
            orphans: 9,
            widows: 9,
            ..PageBreaks::default()
        }),
        ..ConversionInput::new("text")
    };
    let err = c.convert(&Context::background(), &input).await.unwrap_err();

    assert!(
        matches!(
            err,
            ConvertError::Validation(ValidationError::OrphansOutOfRange(9))
        ),
        "got: {err:?}"
    );
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_source_is_rejected_before_any_stage() {
    let renderer = Arc::new(CountingRenderer::default());
    let config = ConverterConfig::builder()
        .renderer(renderer.clone())
        .preprocessor(Arc::new(PanickingPreprocessor))
        .build()
        .unwrap();
    let c = Converter::new(&config).unwrap();

    let err = c
        .convert(&Context::background(), &ConversionInput::new("  \n\t"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Validation(ValidationError::EmptySource)
    ));
}

#[tokio::test]
async fn toc_lists_depth_two_and_three_in_order() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let input = ConversionInput {
        toc: Some(TableOfContents {
            min_depth: 2,
            max_depth: 3,
            ..TableOfContents::default()
        }),
        ..html_only("# Title\n\n## Alpha\n\ntext\n\n## Beta\n\ntext\n\n### Gamma\n\ntext\n")
    };
    let out = c.convert(&Context::background(), &input).await.unwrap();
    let toc = toc_section(&out.html);

    assert!(!toc.contains("Title"), "toc: {toc}");
    let alpha = toc.find("Alpha").expect("Alpha listed");
    let beta = toc.find("Beta").expect("Beta listed");
    let gamma = toc.find("Gamma").expect("Gamma listed");
    assert!(alpha < beta && beta < gamma, "toc: {toc}");
    assert_eq!(toc.matches("<a href=").count(), 3, "toc: {toc}");
}

#[tokio::test]
async fn repeated_conversions_are_identical() {
    let renderer = Arc::new(CountingRenderer::default());
    let c = converter(&renderer);

    let input = ConversionInput {
        css: Some("p { margin: 0; }".into()),
        watermark: Some(Watermark {
            text: "CONFIDENTIAL".into(),
            ..Watermark::default()
        }),
        cover: Some(Cover {
            title: "Quarterly".into(),
            author: "Ops".into(),
            ..Cover::default()
        }),
        toc: Some(TableOfContents::default()),
        ..html_only("# Quarterly\n\n## Revenue\n\n==up== 4%\n\n## Costs\n\nflat\n")
    };

    let first = c.convert(&Context::background(), &input).await.unwrap();
    let second = c.convert(&Context::background(), &input).await.unwrap();
    assert_eq!(first.html, second.html);
    assert!(first.html.contains("<mark>up</mark>"));
}

// ── Failure tagging ──────────────────────────────────────────────────────────

#[tokio::test]
async fn panicking_stage_becomes_internal_error() {
    let renderer = Arc::new(CountingRenderer::default());
    let config = ConverterConfig::builder()
        .renderer(renderer.clone())
        .preprocessor(Arc::new(PanickingPreprocessor))
        .build()
        .unwrap();
    let c = Converter::new(&config).unwrap();

    let err = c
        .convert(&Context::background(), &ConversionInput::new("# Doc"))
        .await
        .unwrap_err();

    match err {
        ConvertError::Internal(msg) => assert!(msg.contains("preprocessor exploded"), "{msg}"),
        other => panic!("expected Internal, got {other:?}"),
    }
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn renderer_failure_is_tagged_render() {
    let renderer = Arc::new(CountingRenderer {
        fail: true,
        ..CountingRenderer::default()
    });
    let c = converter(&renderer);

    let err = c
        .convert(&Context::background(), &ConversionInput::new("# Doc"))
        .await
        .unwrap_err();

    assert_eq!(err.failed_stage(), Some(Stage::Render));
    assert!(matches!(err, ConvertError::Render(RenderError::EmptyOutput)));
    assert!(!err.is_cancellation());
}
