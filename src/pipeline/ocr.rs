//! OCR records and the OCR backend seam.
//!
//! The relinker only needs two capabilities from a page (its markdown and
//! its embedded images) and two from an image (its id and its data), so those
//! are expressed as the [`OcrPage`] / [`PageImage`] traits. Any provider's
//! response type can implement them; [`Page`] and [`EmbeddedImage`] are the
//! concrete records returned by [`OcrBackend`].
//!
//! [`MistralOcr`] is the default backend. It posts the whole PDF as a base64
//! data URI to the Mistral OCR endpoint and asks for images inline, which is
//! what makes the document self-contained after relinking.

use crate::error::Pdf2EbookError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default Mistral OCR endpoint.
pub const MISTRAL_OCR_URL: &str = "https://api.mistral.ai/v1/ocr";

/// Default Mistral OCR model.
pub const MISTRAL_OCR_MODEL: &str = "mistral-ocr-latest";

// ── Capability traits ────────────────────────────────────────────────────

/// A single page of OCR output.
pub trait OcrPage {
    type Image: PageImage;

    /// Markdown text of the page, with image placeholders.
    fn markdown(&self) -> &str;

    /// Images referenced by placeholders in [`OcrPage::markdown`].
    fn images(&self) -> &[Self::Image];
}

/// An image embedded in an OCR page.
pub trait PageImage {
    /// Opaque id used by the placeholder token.
    fn id(&self) -> &str;

    /// Image payload, if the backend returned one.
    fn data(&self) -> Option<&ImageData>;
}

// ── Concrete records ─────────────────────────────────────────────────────

/// Image payload as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageData {
    /// Text form: either bare base64 or a complete `data:` URI.
    Encoded(String),
    /// Raw image bytes.
    Raw(Vec<u8>),
}

impl ImageData {
    pub fn is_empty(&self) -> bool {
        match self {
            ImageData::Encoded(s) => s.trim().is_empty(),
            ImageData::Raw(b) => b.is_empty(),
        }
    }
}

/// One image of a [`Page`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub id: String,
    #[serde(default, rename = "image_base64")]
    pub data: Option<ImageData>,
}

impl EmbeddedImage {
    pub fn new(id: impl Into<String>, data: ImageData) -> Self {
        Self {
            id: id.into(),
            data: Some(data),
        }
    }
}

impl PageImage for EmbeddedImage {
    fn id(&self) -> &str {
        &self.id
    }

    fn data(&self) -> Option<&ImageData> {
        self.data.as_ref()
    }
}

/// One page of OCR output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub index: usize,
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<EmbeddedImage>,
}

impl Page {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: EmbeddedImage) -> Self {
        self.images.push(image);
        self
    }
}

impl OcrPage for Page {
    type Image = EmbeddedImage;

    fn markdown(&self) -> &str {
        &self.markdown
    }

    fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }
}

// ── Backend seam ─────────────────────────────────────────────────────────

/// Turns PDF bytes into ordered OCR pages.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Run OCR on the whole document. Pages are returned in document order.
    async fn process(&self, pdf: &[u8]) -> Result<Vec<Page>, Pdf2EbookError>;
}

// ── Mistral OCR ──────────────────────────────────────────────────────────

/// OCR backend for the Mistral OCR API.
#[derive(Debug, Clone)]
pub struct MistralOcr {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: OcrDocument,
    include_image_base64: bool,
    table_format: &'a str,
}

#[derive(Serialize)]
struct OcrDocument {
    #[serde(rename = "type")]
    kind: &'static str,
    document_url: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    pages: Vec<Page>,
}

impl MistralOcr {
    /// Create a backend with an explicit API key.
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, Pdf2EbookError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Pdf2EbookError::OcrNotConfigured {
                hint: "The Mistral API key is empty.".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Pdf2EbookError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            endpoint: MISTRAL_OCR_URL.to_string(),
            model: MISTRAL_OCR_MODEL.to_string(),
            timeout_secs,
        })
    }

    /// Create a backend from `MISTRAL_API_KEY`.
    pub fn from_env(timeout_secs: u64) -> Result<Self, Pdf2EbookError> {
        match std::env::var("MISTRAL_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Self::new(key, timeout_secs),
            _ => Err(Pdf2EbookError::OcrNotConfigured {
                hint: "Set MISTRAL_API_KEY or pass --api-key.".into(),
            }),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, pdf: &[u8]) -> OcrRequest<'_> {
        OcrRequest {
            model: &self.model,
            document: OcrDocument {
                kind: "document_url",
                document_url: format!("data:application/pdf;base64,{}", STANDARD.encode(pdf)),
            },
            include_image_base64: true,
            table_format: "html",
        }
    }
}

#[async_trait]
impl OcrBackend for MistralOcr {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn process(&self, pdf: &[u8]) -> Result<Vec<Page>, Pdf2EbookError> {
        info!("Sending {} bytes to {} ({})", pdf.len(), self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(pdf))
            .send()
            .await
            .map_err(|e| Pdf2EbookError::OcrFailure {
                message: if e.is_timeout() {
                    format!("request timed out after {}s", self.timeout_secs)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Pdf2EbookError::OcrFailure {
                message: format!("HTTP {status}: {}", body.trim()),
            });
        }

        let body = response.text().await.map_err(|e| Pdf2EbookError::OcrFailure {
            message: e.to_string(),
        })?;
        let pages = parse_response(&body)?;
        debug!("OCR returned {} pages", pages.len());
        Ok(pages)
    }
}

/// Parse a Mistral OCR JSON response into pages sorted by index.
pub fn parse_response(body: &str) -> Result<Vec<Page>, Pdf2EbookError> {
    let mut parsed: OcrResponse =
        serde_json::from_str(body).map_err(|e| Pdf2EbookError::OcrFailure {
            message: format!("malformed response: {e}"),
        })?;
    parsed.pages.sort_by_key(|p| p.index);
    Ok(parsed.pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mistral_response() {
        let body = r#"{
            "pages": [
                {"index": 1, "markdown": "second", "images": [], "dimensions": null},
                {"index": 0, "markdown": "![img-0.jpeg](img-0.jpeg)",
                 "images": [{"id": "img-0.jpeg", "top_left_x": 0,
                             "image_base64": "data:image/jpeg;base64,AAAA"}]}
            ],
            "model": "mistral-ocr-latest"
        }"#;
        let pages = parse_response(body).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].markdown, "![img-0.jpeg](img-0.jpeg)");
        assert_eq!(pages[0].images[0].id(), "img-0.jpeg");
        assert_eq!(
            pages[0].images[0].data(),
            Some(&ImageData::Encoded("data:image/jpeg;base64,AAAA".into()))
        );
        assert_eq!(pages[1].markdown, "second");
    }

    #[test]
    fn parse_image_without_payload() {
        let body = r#"{"pages": [{"index": 0, "markdown": "x",
            "images": [{"id": "img-0.jpeg", "image_base64": null}]}]}"#;
        let pages = parse_response(body).unwrap();
        assert!(pages[0].images[0].data().is_none());
    }

    #[test]
    fn malformed_response_is_ocr_failure() {
        let err = parse_response("{\"nope\": 1}").unwrap_err();
        assert!(matches!(err, Pdf2EbookError::OcrFailure { .. }));
    }

    #[test]
    fn request_body_embeds_pdf_as_data_uri() {
        let ocr = MistralOcr::new("key", 10).unwrap();
        let json = serde_json::to_value(ocr.request_body(b"%PDF-1.7")).unwrap();
        assert_eq!(json["model"], MISTRAL_OCR_MODEL);
        assert_eq!(json["document"]["type"], "document_url");
        assert_eq!(json["include_image_base64"], true);
        let url = json["document"]["document_url"].as_str().unwrap();
        assert!(url.starts_with("data:application/pdf;base64,"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            MistralOcr::new("  ", 10),
            Err(Pdf2EbookError::OcrNotConfigured { .. })
        ));
    }

    #[test]
    fn empty_image_data() {
        assert!(ImageData::Encoded(String::new()).is_empty());
        assert!(ImageData::Raw(Vec::new()).is_empty());
        assert!(!ImageData::Raw(vec![1]).is_empty());
    }
}
