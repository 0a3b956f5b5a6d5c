//! Image relinking: replace OCR image placeholders with inline data URIs.
//!
//! OCR backends emit `![img-0.jpeg](img-0.jpeg)` and ship the image bytes
//! separately. Inlining them as `data:` URIs makes the draft self-contained,
//! so the converter needs nothing but the one Markdown file.
//!
//! An image that cannot be inlined (no payload, undecodable payload) leaves
//! its placeholder untouched. Relinking never fails the page.

use crate::error::Pdf2EbookError;
use crate::pipeline::ocr::{ImageData, OcrPage, PageImage};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};
use regex::{NoExpand, Regex};
use tracing::{debug, warn};

/// Media type used when neither the bytes nor the id reveal one.
pub const FALLBACK_MEDIA_TYPE: &str = "image/jpeg";

/// Relink every image of `page` into its markdown.
pub fn relink_page<P: OcrPage>(page: &P) -> String {
    let mut markdown = page.markdown().to_string();

    for image in page.images() {
        match image_data_uri(image) {
            Ok(Some(uri)) => match placeholder_pattern(image.id()) {
                Ok(re) => {
                    markdown = re
                        .replace_all(&markdown, NoExpand(&format!("({uri})")))
                        .into_owned();
                }
                Err(e) => warn!("Image '{}': {}; placeholder kept", image.id(), e),
            },
            Ok(None) => debug!("Image '{}' has no data; placeholder kept", image.id()),
            Err(e) => warn!("Image '{}': {}; placeholder kept", image.id(), e),
        }
    }

    markdown
}

/// Regex matching `(<id>)` or `(<id>.<ext>)` with a 3–4 letter extension.
///
/// The id is an opaque token, so it is escaped rather than interpreted.
pub fn placeholder_pattern(id: &str) -> Result<Regex, Pdf2EbookError> {
    Regex::new(&format!(r"\({}(\.[a-z]{{3,4}})?\)", regex::escape(id)))
        .map_err(|e| Pdf2EbookError::Internal(format!("placeholder pattern: {e}")))
}

/// Build the inline `data:` URI for an image.
///
/// `Ok(None)` means there is nothing to inline.
pub fn image_data_uri<I: PageImage>(image: &I) -> Result<Option<String>, Pdf2EbookError> {
    let data = match image.data() {
        Some(data) if !data.is_empty() => data,
        _ => return Ok(None),
    };

    match data {
        ImageData::Encoded(text) => {
            let text = text.trim();
            if text.starts_with("data:") {
                return Ok(Some(text.to_string()));
            }
            let bytes = decode_lenient(text).map_err(|e| Pdf2EbookError::DecodeFailure {
                detail: format!("image '{}': {e}", image.id()),
            })?;
            let media_type = media_type_for(&bytes, image.id());
            // Re-encoded so the URI is always single-line standard base64.
            Ok(Some(format!(
                "data:{media_type};base64,{}",
                STANDARD.encode(&bytes)
            )))
        }
        ImageData::Raw(bytes) => {
            let media_type = media_type_for(bytes, image.id());
            Ok(Some(format!(
                "data:{media_type};base64,{}",
                STANDARD.encode(bytes)
            )))
        }
    }
}

/// Decode base64 that may be line-wrapped or use the URL-safe alphabet.
fn decode_lenient(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(&compact)
        .or_else(|e| URL_SAFE.decode(&compact).map_err(|_| e))
}

/// Best-effort media type: magic bytes, then the id's extension, then
/// [`FALLBACK_MEDIA_TYPE`].
fn media_type_for(bytes: &[u8], id: &str) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    id.rsplit_once('.')
        .and_then(|(_, ext)| image::ImageFormat::from_extension(ext))
        .map(|f| f.to_mime_type())
        .unwrap_or(FALLBACK_MEDIA_TYPE)
}
