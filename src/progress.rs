//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as a conversion moves through its stages.
//!
//! Callbacks keep the library ignorant of how the host reports progress: a
//! terminal spinner, a log line, a web socket. OCR and rendering are long
//! blocking calls, so the stage events are what a user actually waits on.
//!
//! # Example
//!
//! ```rust
//! use pdf2ebook::{ConversionProgressCallback, ConversionConfig, ConversionStage};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl ConversionProgressCallback for StageLogger {
//!     fn on_stage(&self, stage: ConversionStage) {
//!         eprintln!("now {stage}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(StageLogger) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ConversionOutcome, ConversionStage};
use std::sync::Arc;

/// Called by the orchestrator as a conversion progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the input is resolved.
    fn on_conversion_start(&self, source: &str) {
        let _ = source;
    }

    /// Called on every state transition, including the terminal one.
    fn on_stage(&self, stage: ConversionStage) {
        let _ = stage;
    }

    /// Called after a page has been relinked, cleaned and appended.
    ///
    /// # Arguments
    /// * `page_num`     — 1-indexed page number
    /// * `total_pages`  — pages returned by OCR
    /// * `markdown_len` — byte length of the cleaned page
    fn on_page_drafted(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
        let _ = (page_num, total_pages, markdown_len);
    }

    /// Called once with the final outcome, success or failure.
    fn on_conversion_complete(&self, outcome: &ConversionOutcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<ConversionStage>>,
        pages: Mutex<Vec<(usize, usize)>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_stage(&self, stage: ConversionStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_page_drafted(&self, page_num: usize, total_pages: usize, _markdown_len: usize) {
            self.pages.lock().unwrap().push((page_num, total_pages));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start("doc.pdf");
        cb.on_stage(ConversionStage::Drafting);
        cb.on_page_drafted(1, 5, 42);
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_stage(ConversionStage::Drafting);
        rec.on_page_drafted(1, 2, 10);
        rec.on_page_drafted(2, 2, 10);
        rec.on_stage(ConversionStage::Done);

        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![ConversionStage::Drafting, ConversionStage::Done]
        );
        assert_eq!(*rec.pages.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage(ConversionStage::Rendering);
    }
}
