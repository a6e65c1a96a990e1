//! Configuration types for converters and pools.
//!
//! A [`Converter`](crate::convert::Converter) is assembled from a
//! [`ConverterConfig`], built via [`ConverterConfigBuilder`]. Every pipeline
//! stage has an override slot; unset slots get the production
//! implementation. There is no package-level default pipeline: callers that
//! want the defaults say so with `ConverterConfig::default()`.
//!
//! # Design choice: builder over constructor
//! Seven collaborator slots plus browser settings make a positional
//! constructor unreadable. The builder lets tests swap exactly the stage
//! they care about.

use crate::assets::DEFAULT_STYLE;
use crate::error::ConvertError;
use crate::pipeline::{
    CoverInjector, FragmentConverter, Preprocessor, Renderer, SignatureInjector, StyleInjector,
    TocInjector,
};
use crate::pool::resolve_pool_size;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one [`Converter`](crate::convert::Converter).
///
/// # Example
/// ```rust
/// use mdpress::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .style("technical")
///     .render_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.style, "technical");
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Built-in style name or path to a `.css` file. Default: `"default"`.
    pub style: String,

    /// Leave the base style layer empty. The caller's own CSS (if any) is
    /// still applied. Default: false.
    pub no_style: bool,

    /// Browser executable. If None, discovered on first render.
    pub chrome_path: Option<PathBuf>,

    /// Extra flags for every browser run. Default: empty.
    pub chrome_args: Vec<String>,

    /// Render time limit when the caller's context has no deadline. Default: 30.
    pub render_timeout_secs: u64,

    pub preprocessor: Option<Arc<dyn Preprocessor>>,
    pub fragment_converter: Option<Arc<dyn FragmentConverter>>,
    pub style_injector: Option<Arc<dyn StyleInjector>>,
    pub cover_injector: Option<Arc<dyn CoverInjector>>,
    pub toc_injector: Option<Arc<dyn TocInjector>>,
    pub signature_injector: Option<Arc<dyn SignatureInjector>>,
    /// Shared by every converter built from this config. Leave unset in
    /// pools so each instance launches its own browser.
    pub renderer: Option<Arc<dyn Renderer>>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            style: DEFAULT_STYLE.to_string(),
            no_style: false,
            chrome_path: None,
            chrome_args: Vec::new(),
            render_timeout_secs: 30,
            preprocessor: None,
            fragment_converter: None,
            style_injector: None,
            cover_injector: None,
            toc_injector: None,
            signature_injector: None,
            renderer: None,
        }
    }
}

fn slot<T: ?Sized>(value: &Option<Arc<T>>) -> &'static str {
    if value.is_some() {
        "<override>"
    } else {
        "<default>"
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("style", &self.style)
            .field("no_style", &self.no_style)
            .field("chrome_path", &self.chrome_path)
            .field("chrome_args", &self.chrome_args)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("preprocessor", &slot(&self.preprocessor))
            .field("fragment_converter", &slot(&self.fragment_converter))
            .field("style_injector", &slot(&self.style_injector))
            .field("cover_injector", &slot(&self.cover_injector))
            .field("toc_injector", &slot(&self.toc_injector))
            .field("signature_injector", &slot(&self.signature_injector))
            .field("renderer", &slot(&self.renderer))
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn style(mut self, name_or_path: impl Into<String>) -> Self {
        self.config.style = name_or_path.into();
        self
    }

    pub fn no_style(mut self, v: bool) -> Self {
        self.config.no_style = v;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn chrome_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.chrome_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn preprocessor(mut self, stage: Arc<dyn Preprocessor>) -> Self {
        self.config.preprocessor = Some(stage);
        self
    }

    pub fn fragment_converter(mut self, stage: Arc<dyn FragmentConverter>) -> Self {
        self.config.fragment_converter = Some(stage);
        self
    }

    pub fn style_injector(mut self, stage: Arc<dyn StyleInjector>) -> Self {
        self.config.style_injector = Some(stage);
        self
    }

    pub fn cover_injector(mut self, stage: Arc<dyn CoverInjector>) -> Self {
        self.config.cover_injector = Some(stage);
        self
    }

    pub fn toc_injector(mut self, stage: Arc<dyn TocInjector>) -> Self {
        self.config.toc_injector = Some(stage);
        self
    }

    pub fn signature_injector(mut self, stage: Arc<dyn SignatureInjector>) -> Self {
        self.config.signature_injector = Some(stage);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The style itself is resolved by `Converter::new`, so an unknown name
    /// surfaces there rather than here.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.render_timeout_secs == 0 {
            return Err(ConvertError::Config(
                "render timeout must be ≥ 1 second".into(),
            ));
        }
        if !c.no_style && c.style.trim().is_empty() {
            return Err(ConvertError::Config(
                "style must name a built-in style or a CSS file (or set no_style)".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Pool sizing ──────────────────────────────────────────────────────────

/// Sizing request for a [`Pool`](crate::pool::Pool).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Requested instance count; zero derives it from available parallelism.
    pub workers: usize,
}

impl PoolConfig {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// The capacity a pool built from this config will have.
    pub fn size(&self) -> usize {
        resolve_pool_size(self.workers)
    }
}
