//! Error types for the pdf2ebook library.
//!
//! A single enum, [`Pdf2EbookError`], covers every failure the pipeline can
//! surface. Most of them never reach the caller of
//! [`crate::convert::convert`]: the orchestrator turns them into the
//! `message` of a failed [`crate::output::ConversionOutcome`]. The store, the
//! backends and the individual stages return them as `Err(Pdf2EbookError)`
//! so library users can match on the failure class.
//!
//! Two stages never propagate their own errors at all: the image relinker and
//! the cover extractor log a `DecodeFailure`/`IoFailure` and fall back to
//! leaving the text unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2ebook library.
#[derive(Debug, Error)]
pub enum Pdf2EbookError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// No OCR backend could be constructed (missing API key etc.).
    #[error("OCR backend is not configured.\n{hint}")]
    OcrNotConfigured { hint: String },

    /// The OCR backend returned an error or a response we could not parse.
    #[error("OCR failed: {message}")]
    OcrFailure { message: String },

    // ── Conversion backend errors ─────────────────────────────────────────
    /// The external conversion tool is not installed or not on `PATH`.
    #[error("'{tool}' is not available: {hint}")]
    BackendUnavailable { tool: String, hint: String },

    /// The conversion tool ran but did not produce the output.
    #[error("'{tool}' failed: {detail}")]
    ConversionFailed { tool: String, detail: String },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// An embedded image payload is not valid base64.
    #[error("Could not decode image data: {detail}")]
    DecodeFailure { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading, writing or deleting a file in the pipeline failed.
    #[error("Failed to {action} '{path}': {source}")]
    IoFailure {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output store errors ───────────────────────────────────────────────
    /// A store entry name that would escape the store directory.
    #[error("Invalid file name '{name}': names must not contain path separators")]
    InvalidName { name: String },

    /// Only Markdown files can be shown as text.
    #[error("Cannot preview '{name}' in text format")]
    PreviewUnsupported { name: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2EbookError {
    /// Build an [`Pdf2EbookError::IoFailure`] for `path`.
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2EbookError::IoFailure {
            action,
            path: path.into(),
            source,
        }
    }
}
