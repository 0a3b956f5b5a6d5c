//! # pdf2ebook
//!
//! Convert scanned or digital PDF documents into Markdown, EPUB or MOBI
//! using a cloud OCR service.
//!
//! The OCR service returns one Markdown page per PDF page, with images
//! referenced by placeholder ids and delivered separately as base64. This
//! crate stitches those pages into a single self-contained document: images
//! are inlined as data URIs, stray page-number lines are removed, and the
//! result is either kept as Markdown or handed to pandoc for an ebook.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. OCR      one request to the OCR service (Mistral by default)
//!  ├─ 3. Relink   image placeholders → data:image/...;base64 URIs
//!  ├─ 4. Clean    drop page-number lines, join pages
//!  ├─ 5. Cover    manual file, or first inline image when enabled
//!  └─ 6. Render   pandoc → EPUB, then calibre → MOBI if asked
//! ```
//!
//! Every artifact lands in an [`OutputStore`] directory, named after the
//! input and never overwriting an existing file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2ebook::{convert, ConversionConfig, OutputFormat, OutputStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OCR key read from MISTRAL_API_KEY
//!     let store = OutputStore::open("outputs")?;
//!     let config = ConversionConfig::builder()
//!         .format(OutputFormat::Epub)
//!         .auto_cover(true)
//!         .build()?;
//!
//!     let outcome = convert("scan.pdf", &store, &config).await;
//!     println!("{}", outcome.message);
//!     if let Some(path) = outcome.artifact {
//!         println!("→ {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2ebook` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2ebook = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Output   | Needs |
//! |----------|-------|
//! | Markdown | nothing beyond the OCR key |
//! | EPUB     | `pandoc` on `PATH` |
//! | MOBI     | `pandoc` and calibre's `ebook-convert` on `PATH` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OutputFormat, PageSeparator};
pub use convert::{clean_page, convert, convert_from_bytes, convert_sync, draft_markdown};
pub use error::Pdf2EbookError;
pub use output::{ConversionOutcome, ConversionStage};
pub use pipeline::cover::{extract_first_image, CoverAsset};
pub use pipeline::ocr::{EmbeddedImage, ImageData, MistralOcr, OcrBackend, OcrPage, Page, PageImage};
pub use pipeline::postprocess::strip_page_numbers;
pub use pipeline::relink::relink_page;
pub use pipeline::render::{DocumentRenderer, PandocRenderer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{OutputStore, StoredFile};
