//! PDF rendering through headless Chromium.
//!
//! ## Instance state
//!
//! A [`ChromeRenderer`] owns one browser process, launched lazily on the
//! first render through the DevTools protocol and kept alive between
//! renders. Each document is printed in a fresh tab; [`Renderer::close`]
//! kills the process and removes its private profile directory.
//!
//! ## Cancellation
//!
//! The DevTools client is blocking, so every browser call runs on the
//! blocking pool and is raced against `ctx.done()` and the render deadline.
//! A render abandoned mid-flight leaves the browser in an unknown state: it
//! is killed, and the next render launches a new one.
//!
//! Work is serialised behind an async mutex; the pool guarantees a single
//! caller anyway, the lock just keeps the type honest on its own.

use super::html::insert_after_head_open;
use super::style::escape_css_string;
use super::{RenderOptions, Renderer};
use crate::context::Context;
use crate::error::RenderError;
use crate::input::PageLayout;
use async_trait::async_trait;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Used when the caller's context carries no deadline.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the DevTools connection may sit idle between renders. Pooled
/// instances can wait a long time for their next document.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A running browser and the profile directory it was started with.
/// Field order matters: the process dies before its profile is removed.
struct Instance {
    browser: Browser,
    profile: TempDir,
}

#[derive(Default)]
struct RendererState {
    instance: Option<Instance>,
    closed: bool,
}

/// Time budget for one render.
#[derive(Debug, Clone, Copy)]
struct Budget {
    deadline: Instant,
    limit: Duration,
}

/// One headless-Chromium process with its own profile directory.
pub struct ChromeRenderer {
    explicit_path: Option<PathBuf>,
    default_timeout: Duration,
    extra_args: Vec<String>,
    state: Mutex<RendererState>,
}

impl std::fmt::Debug for ChromeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeRenderer")
            .field("explicit_path", &self.explicit_path)
            .field("default_timeout", &self.default_timeout)
            .field("extra_args", &self.extra_args)
            .finish()
    }
}

impl Default for ChromeRenderer {
    fn default() -> Self {
        Self::new(None, DEFAULT_RENDER_TIMEOUT)
    }
}

impl ChromeRenderer {
    /// `chrome_path` pins the executable; `None` discovers it on first use.
    pub fn new(chrome_path: Option<PathBuf>, default_timeout: Duration) -> Self {
        Self {
            explicit_path: chrome_path,
            default_timeout,
            extra_args: Vec::new(),
            state: Mutex::new(RendererState::default()),
        }
    }

    /// Additional command-line flags for the browser process
    /// (for example `--no-sandbox` inside containers).
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Deadline-derived limit when the context has one, the default otherwise.
    fn budget(&self, ctx: &Context) -> Budget {
        let limit = ctx.remaining().unwrap_or(self.default_timeout);
        Budget {
            deadline: Instant::now() + limit,
            limit,
        }
    }

    async fn launch(&self, ctx: &Context, budget: Budget) -> Result<Instance, RenderError> {
        let path = chrome_locate::locate_chrome(self.explicit_path.as_deref())?;
        let root = chrome_locate::profile_root();
        std::fs::create_dir_all(&root)?;
        let profile = tempfile::Builder::new()
            .prefix("profile-")
            .tempdir_in(&root)?;

        let settings = LaunchSettings {
            path: path.clone(),
            user_data_dir: profile.path().to_path_buf(),
            args: self.extra_args.clone(),
        };
        let started_at = std::time::Instant::now();
        let browser = run_blocking(ctx, budget, "launch", move || settings.launch())
            .await
            .map_err(|e| match e {
                RenderError::Browser { message, .. } => RenderError::Launch {
                    path: path.clone(),
                    message,
                },
                other => other,
            })?;

        info!(
            browser = %path.display(),
            profile = %profile.path().display(),
            pid = browser.get_process_id().unwrap_or_default(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Browser launched"
        );
        Ok(Instance { browser, profile })
    }

    async fn print(
        &self,
        ctx: &Context,
        budget: Budget,
        state: &mut RendererState,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError> {
        if state.instance.is_none() {
            state.instance = Some(self.launch(ctx, budget).await?);
        }
        let Some(instance) = state.instance.as_ref() else {
            return Err(RenderError::Closed);
        };

        let print_css = format!("<style>\n{}</style>\n", print_stylesheet(options));
        let document = insert_after_head_open(html, &print_css);

        let mut input_file = tempfile::Builder::new()
            .prefix("doc-")
            .suffix(".html")
            .tempfile_in(instance.profile.path())?;
        input_file.write_all(document.as_bytes())?;
        input_file.flush()?;

        let url = Url::from_file_path(input_file.path())
            .map(String::from)
            .map_err(|()| {
                RenderError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "temp file path is not absolute",
                ))
            })?;

        debug!(
            op = "render::print",
            limit_ms = budget.limit.as_millis() as u64,
            html_bytes = document.len(),
            "Printing document"
        );

        let browser = instance.browser.clone();
        let tab = run_blocking(ctx, budget, "new_tab", move || browser.new_tab()).await?;
        let print_options = pdf_options(options);
        let pdf = run_blocking(ctx, budget, "print", move || {
            print_document(&tab, &url, print_options)
        })
        .await?;

        if pdf.is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(pdf)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(
        &self,
        ctx: &Context,
        html: &str,
        options: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError> {
        ctx.check()?;
        let budget = self.budget(ctx);
        let started_at = std::time::Instant::now();

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(RenderError::Closed);
        }

        let result = self.print(ctx, budget, &mut state, html, options).await;
        match &result {
            Ok(pdf) => info!(
                op = "render::print",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                pdf_bytes = pdf.len(),
                "PDF rendered"
            ),
            Err(e @ (RenderError::Interrupted(_) | RenderError::Timeout { .. })) => {
                if state.instance.take().is_some() {
                    warn!(
                        op = "render::print",
                        error = %e,
                        elapsed_ms = started_at.elapsed().as_millis() as u64,
                        "Render abandoned; browser killed"
                    );
                }
            }
            Err(e) => warn!(op = "render::print", error = %e, "Render failed"),
        }
        result
    }

    async fn close(&self) -> Result<(), RenderError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        if let Some(Instance { browser, profile }) = state.instance.take() {
            debug!(
                pid = browser.get_process_id().unwrap_or_default(),
                profile = %profile.path().display(),
                "Closing browser"
            );
            drop(browser);
            profile.close()?;
        }
        Ok(())
    }
}

/// Owned launch parameters; the blocking launch cannot borrow from the renderer.
struct LaunchSettings {
    path: PathBuf,
    user_data_dir: PathBuf,
    args: Vec<String>,
}

impl LaunchSettings {
    fn launch(self) -> Result<Browser, String> {
        let args: Vec<&OsStr> = self.args.iter().map(OsStr::new).collect();
        let options = LaunchOptions::default_builder()
            .path(Some(self.path))
            .headless(true)
            .user_data_dir(Some(self.user_data_dir))
            .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
            .args(args)
            .build()
            .map_err(describe)?;
        Browser::new(options).map_err(describe)
    }
}

/// Load `url` in `tab`, print it and close the tab.
fn print_document(tab: &Tab, url: &str, options: PrintToPdfOptions) -> Result<Vec<u8>, String> {
    tab.navigate_to(url).map_err(describe)?;
    tab.wait_until_navigated().map_err(describe)?;
    let pdf = tab.print_to_pdf(Some(options)).map_err(describe);
    if let Err(e) = tab.close(false) {
        debug!(error = %describe(e), "Tab did not close cleanly");
    }
    pdf
}

fn describe(e: impl Display) -> String {
    format!("{e:#}")
}

/// Run one blocking browser call, giving up when `ctx` is done or the
/// budget runs out. An abandoned call keeps running until the browser dies.
async fn run_blocking<T, E, F>(
    ctx: &Context,
    budget: Budget,
    op: &'static str,
    work: F,
) -> Result<T, RenderError>
where
    T: Send + 'static,
    E: Display + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    tokio::select! {
        biased;
        err = ctx.done() => {
            warn!(op, error = %err, "Browser call interrupted");
            Err(RenderError::Interrupted(err))
        }
        res = tokio::time::timeout_at(budget.deadline, task) => match res {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(RenderError::Browser {
                op,
                message: describe(e),
            }),
            Ok(Err(join)) => Err(RenderError::Browser {
                op,
                message: join.to_string(),
            }),
            Err(_) => {
                warn!(op, limit_ms = budget.limit.as_millis() as u64, "Browser call timed out");
                Err(RenderError::Timeout {
                    millis: budget.limit.as_millis() as u64,
                })
            }
        },
    }
}

/// Paper size in inches, portrait.
fn paper_inches(layout: &PageLayout) -> (f64, f64) {
    match layout.size_or_default().as_str() {
        "a4" => (8.27, 11.69),
        "legal" => (8.5, 14.0),
        _ => (8.5, 11.0),
    }
}

/// DevTools print parameters matching [`print_stylesheet`]; the `@page`
/// rules still win where the browser honours them.
pub fn pdf_options(options: &RenderOptions) -> PrintToPdfOptions {
    let default_layout = PageLayout::default();
    let page = options.page.as_ref().unwrap_or(&default_layout);
    let (width, height) = paper_inches(page);
    let margin = page.margin_or_default();
    PrintToPdfOptions {
        landscape: Some(page.orientation_or_default() == "landscape"),
        display_header_footer: Some(false),
        print_background: Some(true),
        paper_width: Some(width),
        paper_height: Some(height),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }
}

// ── Print stylesheet ─────────────────────────────────────────────────────

/// `@page` rules for the layout and footer, placed ahead of every other
/// sheet so document CSS can still override them.
pub fn print_stylesheet(options: &RenderOptions) -> String {
    let default_layout = PageLayout::default();
    let page = options.page.as_ref().unwrap_or(&default_layout);

    let size = match page.size_or_default().as_str() {
        "a4" => "A4",
        "legal" => "legal",
        _ => "letter",
    };
    let orientation = page.orientation_or_default();
    let margin = page.margin_or_default();

    let mut css = format!(
        "html {{ -webkit-print-color-adjust: exact; print-color-adjust: exact; }}\n\
         @page {{\n  size: {size} {orientation};\n  margin: {margin}in;\n"
    );

    if let Some(content) = options.footer.as_ref().and_then(footer_content) {
        let position = match options
            .footer
            .as_ref()
            .map(|f| f.position_or_default())
            .as_deref()
        {
            Some("left") => "bottom-left",
            Some("center") => "bottom-center",
            _ => "bottom-right",
        };
        css.push_str(&format!(
            "  @{position} {{\n    content: {content};\n    \
             font-size: 8pt;\n    color: #666666;\n  }}\n"
        ));
    }

    css.push_str("}\n");
    css
}

/// CSS `content` value for the footer, `None` when nothing would be shown.
fn footer_content(footer: &crate::input::Footer) -> Option<String> {
    let texts: Vec<String> = [
        &footer.text,
        &footer.document_id,
        &footer.status,
        &footer.date,
    ]
    .into_iter()
    .filter(|s| !s.trim().is_empty())
    .map(|s| css_string(s.trim()))
    .collect();

    let mut parts = texts.join(" \" | \" ");
    if footer.show_page_number {
        if !parts.is_empty() {
            parts.push_str(" \" | \" ");
        }
        parts.push_str("\"Page \" counter(page) \" of \" counter(pages)");
    }
    (!parts.is_empty()).then_some(parts)
}

fn css_string(s: &str) -> String {
    format!("\"{}\"", escape_css_string(s))
}
