//! Result types returned by the conversion entry points.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Stage of the per-request conversion state machine.
///
/// `Drafting → CoverResolution → Rendering → Done`; `Failed` is reachable
/// from every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStage {
    Drafting,
    CoverResolution,
    Rendering,
    Done,
    Failed,
}

impl ConversionStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConversionStage::Done | ConversionStage::Failed)
    }
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionStage::Drafting => "drafting",
            ConversionStage::CoverResolution => "resolving cover",
            ConversionStage::Rendering => "rendering",
            ConversionStage::Done => "done",
            ConversionStage::Failed => "failed",
        })
    }
}

/// What a conversion request produced.
///
/// Always returned, never an error: a failed conversion has `artifact: None`
/// and a message describing why, so a front-end can always show a status.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    /// The final file in the output store, if the conversion succeeded.
    pub artifact: Option<PathBuf>,
    /// Human-readable status line.
    pub message: String,
    /// `Done` or `Failed`.
    pub stage: ConversionStage,
    /// Auto-extracted cover kept next to a Markdown artifact.
    pub cover: Option<PathBuf>,
    /// Number of OCR pages in the draft (0 if OCR never completed).
    pub pages: usize,
    /// Wall-clock time of the whole request.
    pub duration_ms: u64,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        self.stage == ConversionStage::Done && self.artifact.is_some()
    }

    /// The `(artifact-or-none, message)` pair.
    pub fn into_pair(self) -> (Option<PathBuf>, String) {
        (self.artifact, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_stages() {
        assert!(ConversionStage::Done.is_terminal());
        assert!(ConversionStage::Failed.is_terminal());
        assert!(!ConversionStage::Rendering.is_terminal());
    }

    #[test]
    fn outcome_serialises() {
        let outcome = ConversionOutcome {
            artifact: Some(PathBuf::from("outputs/book.epub")),
            message: "Conversion to EPUB completed: book.epub".into(),
            stage: ConversionStage::Done,
            cover: None,
            pages: 3,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["stage"], "done");
        assert_eq!(json["pages"], 3);
        assert!(outcome.is_success());
        let (artifact, message) = outcome.into_pair();
        assert!(artifact.is_some());
        assert!(message.contains("book.epub"));
    }
}
