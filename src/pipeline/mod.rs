//! Pipeline stages for PDF-to-ebook conversion.
//!
//! Each submodule implements one transformation step and is testable on its
//! own. The two stages that talk to the outside world ([`ocr`] and
//! [`render`]) sit behind traits so tests and hosts can swap them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ relink ──▶ postprocess ──▶ cover ──▶ render
//! (URL/path) (API)  (data URIs) (page numbers)  (1st image) (pandoc)
//! ```
//!
//! 1. [`input`]  — read a local PDF or download one, check the `%PDF` magic
//! 2. [`ocr`]    — send the document to an OCR service; the only stage with
//!    network I/O after the download
//! 3. [`relink`] — replace image placeholders with inline base64 data URIs
//! 4. [`postprocess`] — drop lines that are only page numbers
//! 5. [`cover`]  — optionally promote the first inline image to a cover file
//! 6. [`render`] — run pandoc (and calibre for MOBI) over the draft

pub mod cover;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod relink;
pub mod render;
