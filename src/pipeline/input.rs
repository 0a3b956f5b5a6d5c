//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! The OCR backend takes the document as bytes, so both local files and
//! downloads end up in memory. We validate the PDF magic bytes (`%PDF`)
//! before returning so callers get a meaningful error instead of a rejected
//! OCR request. The base name (file stem) seeds the output file name.

use crate::error::Pdf2EbookError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A PDF ready for OCR.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// Raw PDF bytes.
    pub bytes: Vec<u8>,
    /// File stem used to name the output, e.g. `report` for `report.pdf`.
    pub base_name: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// If the input is a URL, download it. If the input is a local file,
/// validate it exists, is readable and starts with `%PDF`.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2EbookError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(Pdf2EbookError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        resolve_local(Path::new(input)).await
    }
}

/// Read a local file, validating existence and PDF magic bytes.
async fn resolve_local(path: &Path) -> Result<ResolvedInput, Pdf2EbookError> {
    let path = path.to_path_buf();

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Pdf2EbookError::FileNotFound { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2EbookError::PermissionDenied { path });
        }
        Err(e) => return Err(Pdf2EbookError::io("read", path, e)),
    };

    check_magic(&bytes, &path)?;
    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());

    Ok(ResolvedInput {
        base_name: base_name_of(&path),
        bytes,
    })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2EbookError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2EbookError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2EbookError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2EbookError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2EbookError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2EbookError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let filename = extract_filename(url);
    check_magic(&bytes, Path::new(&filename))?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(ResolvedInput {
        base_name: base_name_of(Path::new(&filename)),
        bytes,
    })
}

/// Reject anything that does not start with `%PDF`.
pub fn check_magic(bytes: &[u8], path: &Path) -> Result<(), Pdf2EbookError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2EbookError::NotAPdf {
            path: PathBuf::from(path),
            magic,
        });
    }
    Ok(())
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(extract_filename("https://example.com/books/scan.pdf"), "scan.pdf");
        assert_eq!(extract_filename("https://example.com/download"), "downloaded.pdf");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name_of(Path::new("/a/b/My Book.pdf")), "My Book");
        assert_eq!(base_name_of(Path::new("/")), "document");
    }

    #[test]
    fn test_check_magic() {
        assert!(check_magic(b"%PDF-1.7\n", Path::new("a.pdf")).is_ok());
        assert!(matches!(
            check_magic(b"PK\x03\x04", Path::new("a.pdf")),
            Err(Pdf2EbookError::NotAPdf { magic, .. }) if &magic == b"PK\x03\x04"
        ));
        assert!(check_magic(b"%P", Path::new("a.pdf")).is_err());
    }

    #[tokio::test]
    async fn test_resolve_local() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("scan.pdf");
        std::fs::write(&pdf, b"%PDF-1.4 body").unwrap();

        let resolved = resolve_input(pdf.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.base_name, "scan");
        assert_eq!(resolved.bytes, b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let err = resolve_input("/definitely/not/a/real/file.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2EbookError::FileNotFound { .. }));
    }
}
