//! Cover extraction: promote the first inline image of a draft to a cover file.
//!
//! Scanned books almost always open with the cover scan, which OCR returns as
//! the first embedded image. Pulling it out of the body and handing it to the
//! converter as `--epub-cover-image` gives the ebook a proper cover instead of
//! a full-page picture before chapter one.

use crate::error::Pdf2EbookError;
use crate::store::{timestamped, OutputStore};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static RE_INLINE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[.*?\]\((data:image/([a-zA-Z0-9.+-]+);base64,([^)]+))\)").unwrap()
});

/// An image designated as the ebook cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverAsset {
    pub path: PathBuf,
    /// Image encoding tag, e.g. `jpeg` or `png`.
    pub format: String,
}

impl CoverAsset {
    /// A user-supplied cover; the format is taken from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Extract the first inline base64 image of `markdown` as a cover file.
///
/// Returns the asset and the markdown with exactly that one image reference
/// removed. When there is no inline image, or decoding/writing fails, the
/// original text is returned unchanged and no file is left in the store.
pub fn extract_first_image(markdown: &str, store: &OutputStore) -> (Option<CoverAsset>, String) {
    match try_extract_first_image(markdown, store) {
        Ok(Some((asset, remaining))) => (Some(asset), remaining),
        Ok(None) => {
            debug!("No inline image found for cover extraction");
            (None, markdown.to_string())
        }
        Err(e) => {
            warn!("Failed to extract cover image: {}", e);
            (None, markdown.to_string())
        }
    }
}

/// Fallible core of [`extract_first_image`].
pub fn try_extract_first_image(
    markdown: &str,
    store: &OutputStore,
) -> Result<Option<(CoverAsset, String)>, Pdf2EbookError> {
    let Some(caps) = RE_INLINE_IMAGE.captures(markdown) else {
        return Ok(None);
    };
    let (Some(full), Some(format), Some(payload)) = (caps.get(0), caps.get(2), caps.get(3)) else {
        return Ok(None);
    };

    // Decode before touching the store so a bad payload leaves nothing behind.
    let bytes = STANDARD
        .decode(payload.as_str().trim())
        .map_err(|e| Pdf2EbookError::DecodeFailure {
            detail: format!("cover payload: {e}"),
        })?;

    let format = format.as_str().to_lowercase();
    let ext = format!(".{}", extension_for(&format));
    let name = store.next_available_name(&timestamped("cover"), &ext);
    let path = store.write_atomic(&name, &bytes)?;
    info!("Extracted cover image → {} ({} bytes)", path.display(), bytes.len());

    let mut remaining = String::with_capacity(markdown.len() - full.len());
    remaining.push_str(&markdown[..full.start()]);
    remaining.push_str(&markdown[full.end()..]);

    Ok(Some((CoverAsset { path, format }, remaining)))
}

/// File extension for an image subtype: the subtype itself when it is a
/// plain word (`png`, `jpeg`), else the image crate's extension (`x-icon` → `ico`).
fn extension_for(subtype: &str) -> String {
    if subtype.chars().all(|c| c.is_ascii_alphabetic()) {
        return subtype.to_string();
    }
    image::ImageFormat::from_mime_type(format!("image/{subtype}"))
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("img")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, OutputStore) {
        let dir = TempDir::new().unwrap();
        let store = OutputStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn entries(store: &OutputStore) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn extracts_first_image_only() {
        let (_dir, store) = store();
        let first = "![cover](data:image/png;base64,aGVsbG8=)";
        let second = "![fig](data:image/jpeg;base64,d29ybGQ=)";
        let md = format!("{first}\n# Title\n{second}\n");

        let (asset, remaining) = extract_first_image(&md, &store);
        let asset = asset.expect("cover extracted");

        assert_eq!(asset.format, "png");
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"hello");
        let name = asset.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cover_") && name.ends_with(".png"), "got {name}");

        assert!(!remaining.contains(first));
        assert!(remaining.contains(second));
        assert_eq!(remaining, format!("\n# Title\n{second}\n"));
    }

    #[test]
    fn removes_only_first_of_identical_references() {
        let (_dir, store) = store();
        let img = "![a](data:image/png;base64,aGVsbG8=)";
        let md = format!("{img} and {img}");
        let (asset, remaining) = extract_first_image(&md, &store);
        assert!(asset.is_some());
        assert_eq!(remaining, format!(" and {img}"));
    }

    #[test]
    fn no_image_returns_text_unchanged() {
        let (_dir, store) = store();
        let md = "# Title\n\n![remote](https://example.org/x.png)\nText";
        let (asset, remaining) = extract_first_image(md, &store);
        assert!(asset.is_none());
        assert_eq!(remaining, md);
        assert!(entries(&store).is_empty());
    }

    #[test]
    fn bad_payload_leaves_text_and_store_untouched() {
        let (_dir, store) = store();
        let md = "![a](data:image/png;base64,***not-base64***)\nbody";
        let (asset, remaining) = extract_first_image(md, &store);
        assert!(asset.is_none());
        assert_eq!(remaining, md);
        assert!(entries(&store).is_empty());
    }

    #[test]
    fn bad_payload_is_decode_failure() {
        let (_dir, store) = store();
        let err = try_extract_first_image("![a](data:image/png;base64,%%%)", &store).unwrap_err();
        assert!(matches!(err, Pdf2EbookError::DecodeFailure { .. }));
    }

    #[test]
    fn repeated_extraction_avoids_name_collisions() {
        let (_dir, store) = store();
        let md = "![a](data:image/png;base64,aGVsbG8=)";
        let (a, _) = extract_first_image(md, &store);
        let (b, _) = extract_first_image(md, &store);
        assert_ne!(a.unwrap().path, b.unwrap().path);
        assert_eq!(entries(&store).len(), 2);
    }

    #[test]
    fn non_alphabetic_subtype_is_extracted() {
        let (_dir, store) = store();
        let md = "![ico](data:image/x-icon;base64,aGVsbG8=)\n![png](data:image/png;base64,d29ybGQ=)";
        let (asset, remaining) = extract_first_image(md, &store);
        let asset = asset.expect("icon extracted");
        assert_eq!(asset.format, "x-icon");
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"hello");
        assert!(asset.path.to_string_lossy().ends_with(".ico"));
        assert_eq!(remaining, "\n![png](data:image/png;base64,d29ybGQ=)");
    }

    #[test]
    fn manual_cover_format_from_extension() {
        let asset = CoverAsset::from_path("/tmp/My Cover.JPG");
        assert_eq!(asset.format, "jpg");
        assert_eq!(asset.path(), Path::new("/tmp/My Cover.JPG"));
    }
}
