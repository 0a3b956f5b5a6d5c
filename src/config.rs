//! Configuration types for PDF-to-ebook conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The output store is deliberately *not*
//! part of the config: it is passed to every entry point as an explicit
//! [`crate::store::OutputStore`] handle.

use crate::error::Pdf2EbookError;
use crate::pipeline::ocr::OcrBackend;
use crate::pipeline::render::DocumentRenderer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one PDF-to-ebook conversion.
///
/// # Example
/// ```rust
/// use pdf2ebook::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .format(OutputFormat::Epub)
///     .auto_cover(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Target format. Default: EPUB.
    pub format: OutputFormat,

    /// User-supplied cover image. Takes precedence over `auto_cover`.
    pub manual_cover: Option<PathBuf>,

    /// Promote the first inline image of the draft to the cover. Default: false.
    ///
    /// The image is removed from the body. Ignored when `manual_cover` is set.
    pub auto_cover: bool,

    /// Output file stem. Default: the input file stem.
    pub base_name: Option<String>,

    /// Ebook title metadata. Default: the output file stem.
    pub title: Option<String>,

    /// How OCR pages are joined in the draft. Default: a blank line.
    pub page_separator: PageSeparator,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for the OCR request in seconds. Default: 300.
    ///
    /// OCR of a few hundred scanned pages routinely takes minutes.
    pub ocr_timeout_secs: u64,

    /// Timeout for the conversion tool in seconds. Default: 300.
    pub render_timeout_secs: u64,

    /// OCR model name passed to the default backend. Default: `mistral-ocr-latest`.
    pub ocr_model: Option<String>,

    /// API key for the default OCR backend. If None, read from `MISTRAL_API_KEY`.
    pub api_key: Option<String>,

    /// Pre-constructed OCR backend. Takes precedence over `api_key`.
    pub ocr: Option<Arc<dyn OcrBackend>>,

    /// Pre-constructed renderer. Default: [`crate::pipeline::render::PandocRenderer`].
    pub renderer: Option<Arc<dyn DocumentRenderer>>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            manual_cover: None,
            auto_cover: false,
            base_name: None,
            title: None,
            page_separator: PageSeparator::default(),
            download_timeout_secs: 120,
            ocr_timeout_secs: 300,
            render_timeout_secs: 300,
            ocr_model: None,
            api_key: None,
            ocr: None,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("format", &self.format)
            .field("manual_cover", &self.manual_cover)
            .field("auto_cover", &self.auto_cover)
            .field("base_name", &self.base_name)
            .field("title", &self.title)
            .field("page_separator", &self.page_separator)
            .field("ocr_model", &self.ocr_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("ocr", &self.ocr.as_ref().map(|o| o.name().to_string()))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn DocumentRenderer>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn manual_cover(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.manual_cover = Some(path.into());
        self
    }

    pub fn auto_cover(mut self, v: bool) -> Self {
        self.config.auto_cover = v;
        self
    }

    pub fn base_name(mut self, name: impl Into<String>) -> Self {
        self.config.base_name = Some(name.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn ocr(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.config.ocr = Some(backend);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2EbookError> {
        let c = &self.config;
        if c.download_timeout_secs == 0 || c.ocr_timeout_secs == 0 || c.render_timeout_secs == 0 {
            return Err(Pdf2EbookError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref name) = c.base_name {
            if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
                return Err(Pdf2EbookError::InvalidConfig(format!(
                    "Output name must be a plain file stem, got {name:?}"
                )));
            }
        }
        if let Some(ref cover) = c.manual_cover {
            if !cover.is_file() {
                return Err(Pdf2EbookError::InvalidConfig(format!(
                    "Cover image not found: {}",
                    cover.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The cleaned OCR draft itself.
    Markdown,
    /// EPUB 3 via pandoc. (default)
    #[default]
    Epub,
    /// Kindle MOBI via pandoc + calibre.
    Mobi,
}

impl OutputFormat {
    /// File extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => ".md",
            OutputFormat::Epub => ".epub",
            OutputFormat::Mobi => ".mobi",
        }
    }

    /// Whether the draft is already the final artifact.
    pub fn is_draft_format(self) -> bool {
        self == OutputFormat::Markdown
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Markdown => "Markdown",
            OutputFormat::Epub => "EPUB",
            OutputFormat::Mobi => "MOBI",
        })
    }
}

/// How to separate OCR pages in the assembled draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string for the given page number (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.format, OutputFormat::Epub);
        assert!(!c.auto_cover);
        assert!(c.manual_cover.is_none());
    }

    #[test]
    fn extensions() {
        assert_eq!(OutputFormat::Markdown.extension(), ".md");
        assert_eq!(OutputFormat::Epub.extension(), ".epub");
        assert_eq!(OutputFormat::Mobi.extension(), ".mobi");
        assert!(OutputFormat::Markdown.is_draft_format());
        assert!(!OutputFormat::Mobi.is_draft_format());
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ConversionConfig::builder().ocr_timeout_secs(0).build().is_err());
    }

    #[test]
    fn builder_rejects_path_like_base_name() {
        assert!(ConversionConfig::builder().base_name("../x").build().is_err());
        assert!(ConversionConfig::builder().base_name("  ").build().is_err());
        assert!(ConversionConfig::builder().base_name("book").build().is_ok());
    }

    #[test]
    fn builder_rejects_missing_cover() {
        let err = ConversionConfig::builder()
            .manual_cover("/definitely/not/a/cover.png")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Cover image not found"));
    }

    #[test]
    fn separator_render() {
        assert_eq!(PageSeparator::None.render(2), "\n\n");
        assert_eq!(PageSeparator::Comment.render(2), "\n\n<!-- page 2 -->\n\n");
        assert_eq!(PageSeparator::Custom("***".into()).render(3), "\n\n***\n\n");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ConversionConfig::builder().api_key("secret").build().unwrap();
        let s = format!("{c:?}");
        assert!(!s.contains("secret"));
    }
}
