//! Conversion entry points: the per-request state machine.
//!
//! One request moves through
//!
//! ```text
//! Drafting ──▶ CoverResolution ──▶ Rendering ──▶ Done
//!     └──────────────┴─────────────────┴───────▶ Failed
//! ```
//!
//! strictly in sequence on the calling task. Every error raised by input
//! resolution, OCR, file I/O or the renderer lands in `Failed`; the entry
//! points never return `Err` and instead report a [`ConversionOutcome`]
//! with a human-readable message.
//!
//! Intermediate files (the `temp_*.md` draft of an EPUB/MOBI job and an
//! auto-extracted cover) are removed on both the `Done` and `Failed` paths.

use crate::config::{ConversionConfig, OutputFormat, PageSeparator};
use crate::error::Pdf2EbookError;
use crate::output::{ConversionOutcome, ConversionStage};
use crate::pipeline::ocr::{MistralOcr, OcrBackend, OcrPage};
use crate::pipeline::render::{DocumentRenderer, PandocRenderer};
use crate::pipeline::{cover, input, postprocess, relink};
use crate::store::{timestamped, OutputStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Convert a PDF file or URL into the configured format.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `store`     — Output store receiving the artifact
/// * `config`    — Conversion configuration
///
/// Never fails: check [`ConversionOutcome::artifact`] / `stage`.
pub async fn convert(
    input_str: impl AsRef<str>,
    store: &OutputStore,
    config: &ConversionConfig,
) -> ConversionOutcome {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {} → {}", input_str, config.format);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(input_str);
    }

    let mut job = Job::new(store, config);
    let result = match input::resolve_input(input_str, config.download_timeout_secs).await {
        Ok(resolved) => job.run(&resolved.bytes, &resolved.base_name).await,
        Err(e) => Err(e),
    };
    job.finish(result)
}

/// Convert PDF bytes held in memory.
///
/// `base_name` is the output file stem (overridden by `config.base_name`).
pub async fn convert_from_bytes(
    bytes: &[u8],
    base_name: &str,
    store: &OutputStore,
    config: &ConversionConfig,
) -> ConversionOutcome {
    info!("Starting conversion: {} bytes in memory → {}", bytes.len(), config.format);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(base_name);
    }

    let mut job = Job::new(store, config);
    let result = match input::check_magic(bytes, Path::new(base_name)) {
        Ok(()) => job.run(bytes, base_name).await,
        Err(e) => Err(e),
    };
    job.finish(result)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    store: &OutputStore,
    config: &ConversionConfig,
) -> ConversionOutcome {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(convert(input_str, store, config)),
        Err(e) => {
            let job = Job::new(store, config);
            job.finish(Err(Pdf2EbookError::Internal(format!(
                "Failed to create tokio runtime: {e}"
            ))))
        }
    }
}

/// Relink a page's images, then strip its page-number lines.
pub fn clean_page<P: OcrPage>(page: &P) -> String {
    postprocess::strip_page_numbers(&relink::relink_page(page))
}

/// Assemble the draft from OCR pages in order.
pub fn draft_markdown<P: OcrPage>(pages: &[P], separator: &PageSeparator) -> String {
    join_pages(pages, separator, |_, _| {})
}

/// Clean and join `pages`, calling `on_page(page_num, cleaned)` per page.
fn join_pages<P, F>(pages: &[P], separator: &PageSeparator, mut on_page: F) -> String
where
    P: OcrPage,
    F: FnMut(usize, &str),
{
    let mut draft = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            draft.push_str(&separator.render(i + 1));
        }
        let cleaned = clean_page(page);
        on_page(i + 1, &cleaned);
        draft.push_str(&cleaned);
    }
    draft
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// State of one conversion request.
struct Job<'a> {
    store: &'a OutputStore,
    config: &'a ConversionConfig,
    stage: ConversionStage,
    start: Instant,
    pages: usize,
    /// `temp_*.md` draft of an EPUB/MOBI job.
    intermediate_draft: Option<PathBuf>,
    /// Auto-extracted cover file.
    extracted_cover: Option<PathBuf>,
    /// Markdown-mode draft, which only becomes the artifact on success.
    pending_artifact: Option<PathBuf>,
    /// Rendered EPUB/MOBI, which only becomes the artifact on success.
    pending_output: Option<PathBuf>,
}

impl<'a> Job<'a> {
    fn new(store: &'a OutputStore, config: &'a ConversionConfig) -> Self {
        let mut job = Self {
            store,
            config,
            stage: ConversionStage::Drafting,
            start: Instant::now(),
            pages: 0,
            intermediate_draft: None,
            extracted_cover: None,
            pending_artifact: None,
            pending_output: None,
        };
        job.enter(ConversionStage::Drafting);
        job
    }

    fn enter(&mut self, stage: ConversionStage) {
        debug_assert!(!self.stage.is_terminal(), "transition out of {}", self.stage);
        debug!("Stage: {} → {}", self.stage, stage);
        self.stage = stage;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(stage);
        }
    }

    async fn run(&mut self, pdf: &[u8], input_base: &str) -> Result<PathBuf, Pdf2EbookError> {
        let format = self.config.format;
        let base = self
            .config
            .base_name
            .clone()
            .unwrap_or_else(|| input_base.to_string());

        // ── Drafting ─────────────────────────────────────────────────────
        let ocr = resolve_ocr(self.config)?;
        let ocr_start = Instant::now();
        let pages = tokio::time::timeout(
            Duration::from_secs(self.config.ocr_timeout_secs),
            ocr.process(pdf),
        )
        .await
        .map_err(|_| Pdf2EbookError::OcrFailure {
            message: format!(
                "{} did not respond within {}s",
                ocr.name(),
                self.config.ocr_timeout_secs
            ),
        })??;
        info!(
            "OCR returned {} pages in {}ms",
            pages.len(),
            ocr_start.elapsed().as_millis()
        );
        if pages.is_empty() {
            return Err(Pdf2EbookError::OcrFailure {
                message: "the document produced no pages".into(),
            });
        }
        self.pages = pages.len();

        let draft = self.assemble(&pages);
        let draft_name = if format.is_draft_format() {
            self.store.next_available_name(&base, OutputFormat::Markdown.extension())
        } else {
            self.store
                .next_available_name(&timestamped("temp"), OutputFormat::Markdown.extension())
        };
        let draft_path = self.store.write_atomic(&draft_name, draft.as_bytes())?;
        if format.is_draft_format() {
            self.pending_artifact = Some(draft_path.clone());
        } else {
            self.intermediate_draft = Some(draft_path.clone());
        }
        debug!("Draft written to {}", draft_path.display());

        // ── Cover resolution ─────────────────────────────────────────────
        self.enter(ConversionStage::CoverResolution);
        let cover = self.resolve_cover(&draft_path, &draft_name)?;

        // ── Rendering ────────────────────────────────────────────────────
        self.enter(ConversionStage::Rendering);
        if format.is_draft_format() {
            return Ok(draft_path);
        }

        let renderer = resolve_renderer(self.config, &base);
        let output_name = self.store.next_available_name(&base, format.extension());
        let output_path = self.store.path_of(&output_name);
        let render_start = Instant::now();
        self.pending_output = Some(output_path.clone());

        tokio::time::timeout(
            Duration::from_secs(self.config.render_timeout_secs),
            renderer.render(&draft_path, &output_path, format, cover.as_deref()),
        )
        .await
        .map_err(|_| Pdf2EbookError::ConversionFailed {
            tool: "renderer".into(),
            detail: format!("timed out after {}s", self.config.render_timeout_secs),
        })??;

        if !output_path.is_file() {
            return Err(Pdf2EbookError::ConversionFailed {
                tool: "renderer".into(),
                detail: format!("no output written to {}", output_path.display()),
            });
        }
        info!(
            "Rendered {} in {}ms",
            output_path.display(),
            render_start.elapsed().as_millis()
        );
        Ok(output_path)
    }

    /// Relink and clean every page, reporting progress per page.
    fn assemble<P: OcrPage>(&self, pages: &[P]) -> String {
        let total = pages.len();
        join_pages(pages, &self.config.page_separator, |page_num, cleaned| {
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_page_drafted(page_num, total, cleaned.len());
            }
        })
    }

    /// Pick the cover: manual wins, then auto-extraction, else none.
    fn resolve_cover(
        &mut self,
        draft_path: &Path,
        draft_name: &str,
    ) -> Result<Option<PathBuf>, Pdf2EbookError> {
        if let Some(ref manual) = self.config.manual_cover {
            if self.config.format.is_draft_format() {
                debug!("Manual cover ignored for Markdown output");
                return Ok(None);
            }
            debug!("Using manual cover {}", manual.display());
            return Ok(Some(manual.clone()));
        }
        if !self.config.auto_cover {
            return Ok(None);
        }

        let content = std::fs::read_to_string(draft_path)
            .map_err(|e| Pdf2EbookError::io("read", draft_path, e))?;
        let (asset, remaining) = cover::extract_first_image(&content, self.store);
        let Some(asset) = asset else {
            info!("No inline image found; continuing without a cover");
            return Ok(None);
        };

        self.extracted_cover = Some(asset.path.clone());
        self.store.write_atomic(draft_name, remaining.as_bytes())?;
        Ok(Some(asset.path))
    }

    fn finish(mut self, result: Result<PathBuf, Pdf2EbookError>) -> ConversionOutcome {
        let duration_ms = self.start.elapsed().as_millis() as u64;

        match result {
            Ok(artifact) => {
                // A Markdown draft keeps its extracted cover: the image was cut
                // out of the text and would otherwise be lost.
                let kept_cover = if self.config.format.is_draft_format() {
                    self.extracted_cover.take()
                } else {
                    None
                };
                self.pending_artifact = None;
                self.pending_output = None;
                self.cleanup();
                self.enter(ConversionStage::Done);

                let name = artifact
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let message = if self.config.format.is_draft_format() {
                    format!("Conversion completed: {name}")
                } else {
                    format!("Conversion to {} completed: {name}", self.config.format)
                };
                info!("{} ({}ms)", message, duration_ms);

                self.report(ConversionOutcome {
                    artifact: Some(artifact),
                    message,
                    stage: ConversionStage::Done,
                    cover: kept_cover,
                    pages: self.pages,
                    duration_ms,
                })
            }
            Err(e) => {
                error!("Conversion failed while {}: {}", self.stage, e);
                self.cleanup();
                self.enter(ConversionStage::Failed);

                self.report(ConversionOutcome {
                    artifact: None,
                    message: format!("Error: {e}"),
                    stage: ConversionStage::Failed,
                    cover: None,
                    pages: self.pages,
                    duration_ms,
                })
            }
        }
    }

    fn report(&self, outcome: ConversionOutcome) -> ConversionOutcome {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(&outcome);
        }
        outcome
    }

    /// Best-effort removal of everything this job created but does not return.
    fn cleanup(&mut self) {
        let leftovers = [
            self.intermediate_draft.take(),
            self.extracted_cover.take(),
            self.pending_artifact.take(),
            self.pending_output.take(),
        ];
        for path in leftovers.into_iter().flatten() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Resolve the OCR backend: injected backend first, then Mistral with the
/// configured key, then Mistral from `MISTRAL_API_KEY`.
fn resolve_ocr(config: &ConversionConfig) -> Result<Arc<dyn OcrBackend>, Pdf2EbookError> {
    if let Some(ref backend) = config.ocr {
        return Ok(Arc::clone(backend));
    }

    let backend = match config.api_key {
        Some(ref key) => MistralOcr::new(key.clone(), config.ocr_timeout_secs)?,
        None => MistralOcr::from_env(config.ocr_timeout_secs)?,
    };
    let backend = match config.ocr_model {
        Some(ref model) => backend.with_model(model.clone()),
        None => backend,
    };
    Ok(Arc::new(backend))
}

/// Resolve the renderer: injected renderer, else pandoc titled after the book.
fn resolve_renderer(config: &ConversionConfig, base: &str) -> Arc<dyn DocumentRenderer> {
    if let Some(ref renderer) = config.renderer {
        return Arc::clone(renderer);
    }
    let title = config.title.clone().unwrap_or_else(|| base.to_string());
    Arc::new(PandocRenderer::new().title(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::{EmbeddedImage, ImageData, Page};

    #[test]
    fn two_page_draft_is_relinked_and_stripped() {
        let pages = vec![
            Page::new("# Chapter 1\n![img-0.jpeg](img-0.jpeg)\nText.\nPage 1 of 2\n").with_image(
                EmbeddedImage::new(
                    "img-0.jpeg",
                    ImageData::Encoded("data:image/jpeg;base64,AAAA".into()),
                ),
            ),
            Page::new("More text.\n3"),
        ];
        let draft = draft_markdown(&pages, &PageSeparator::None);

        assert!(draft.contains("![img-0.jpeg](data:image/jpeg;base64,AAAA)"));
        assert!(!draft.lines().any(|l| l.trim() == "Page 1 of 2"));
        assert!(!draft.lines().any(|l| l.trim() == "3"));
        assert_eq!(
            draft,
            "# Chapter 1\n![img-0.jpeg](data:image/jpeg;base64,AAAA)\nText.\n\n\nMore text.\n"
        );
    }

    #[test]
    fn separator_between_pages_only() {
        let pages = vec![Page::new("a"), Page::new("b"), Page::new("c")];
        assert_eq!(
            draft_markdown(&pages, &PageSeparator::Comment),
            "a\n\n<!-- page 2 -->\n\nb\n\n<!-- page 3 -->\n\nc"
        );
    }

    #[test]
    fn resolve_ocr_prefers_injected_backend() {
        struct Fake;
        #[async_trait::async_trait]
        impl OcrBackend for Fake {
            fn name(&self) -> &str {
                "fake"
            }
            async fn process(&self, _pdf: &[u8]) -> Result<Vec<Page>, Pdf2EbookError> {
                Ok(vec![])
            }
        }
        let config = ConversionConfig::builder()
            .ocr(Arc::new(Fake))
            .build()
            .unwrap();
        assert_eq!(resolve_ocr(&config).unwrap().name(), "fake");
    }

    #[test]
    fn resolve_ocr_with_explicit_key() {
        let config = ConversionConfig::builder()
            .api_key("k")
            .ocr_model("mistral-ocr-2505")
            .build()
            .unwrap();
        assert_eq!(resolve_ocr(&config).unwrap().name(), "mistral");
    }
}
