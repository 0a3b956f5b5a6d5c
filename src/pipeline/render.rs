//! Rendering: turn the finished Markdown draft into EPUB or MOBI.
//!
//! Rendering is delegated to external tools behind the [`DocumentRenderer`]
//! trait. [`PandocRenderer`] drives `pandoc` for EPUB; pandoc has no MOBI
//! writer, so MOBI goes through an intermediate EPUB in a temp directory and
//! calibre's `ebook-convert`.
//!
//! A book-length conversion can take tens of seconds. `tokio::process` keeps
//! the runtime free while the tool runs. Children are spawned with
//! `kill_on_drop`, so a caller that drops the render future on timeout also
//! stops the tool.

use crate::config::OutputFormat;
use crate::error::Pdf2EbookError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// Renders a Markdown file into an ebook format.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Write `output` in `format` from the Markdown file at `markdown`,
    /// using `cover` as the cover image when given.
    async fn render(
        &self,
        markdown: &Path,
        output: &Path,
        format: OutputFormat,
        cover: Option<&Path>,
    ) -> Result<(), Pdf2EbookError>;
}

/// `pandoc` (+ calibre `ebook-convert` for MOBI) renderer.
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    pandoc: PathBuf,
    ebook_convert: PathBuf,
    title: Option<String>,
}

impl Default for PandocRenderer {
    fn default() -> Self {
        Self {
            pandoc: PathBuf::from("pandoc"),
            ebook_convert: PathBuf::from("ebook-convert"),
            title: None,
        }
    }
}

impl PandocRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pandoc = path.into();
        self
    }

    pub fn ebook_convert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ebook_convert = path.into();
        self
    }

    /// Title written into the ebook metadata. Default: the output file stem.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn pandoc_args(&self, markdown: &Path, output: &Path, cover: Option<&Path>) -> Vec<String> {
        let title = self.title.clone().unwrap_or_else(|| {
            output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        });

        let mut args = vec![
            markdown.display().to_string(),
            "--from".to_string(),
            "markdown".to_string(),
            "--to".to_string(),
            "epub".to_string(),
            "--output".to_string(),
            output.display().to_string(),
            "--metadata".to_string(),
            format!("title={title}"),
        ];
        match cover {
            Some(c) if c.exists() => args.push(format!("--epub-cover-image={}", c.display())),
            Some(c) => debug!("Cover {} does not exist; rendering without it", c.display()),
            None => {}
        }
        args
    }

    async fn run(&self, program: &Path, args: &[String]) -> Result<(), Pdf2EbookError> {
        let tool = program.display().to_string();
        debug!("Running {} {:?}", tool, args);

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Pdf2EbookError::BackendUnavailable {
                    hint: install_hint(&tool).to_string(),
                    tool,
                })
            }
            Err(e) => {
                return Err(Pdf2EbookError::ConversionFailed {
                    tool,
                    detail: e.to_string(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Pdf2EbookError::ConversionFailed {
                tool,
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }

    async fn render_epub(
        &self,
        markdown: &Path,
        output: &Path,
        cover: Option<&Path>,
    ) -> Result<(), Pdf2EbookError> {
        let args = self.pandoc_args(markdown, output, cover);
        self.run(&self.pandoc, &args).await
    }
}

#[async_trait]
impl DocumentRenderer for PandocRenderer {
    async fn render(
        &self,
        markdown: &Path,
        output: &Path,
        format: OutputFormat,
        cover: Option<&Path>,
    ) -> Result<(), Pdf2EbookError> {
        match format {
            OutputFormat::Markdown => Err(Pdf2EbookError::Internal(
                "Markdown drafts are not rendered".into(),
            )),
            OutputFormat::Epub => {
                self.render_epub(markdown, output, cover).await?;
                info!("Rendered EPUB → {}", output.display());
                Ok(())
            }
            OutputFormat::Mobi => {
                let work = TempDir::new()
                    .map_err(|e| Pdf2EbookError::io("create temp dir", std::env::temp_dir(), e))?;
                let stem = output
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "book".to_string());
                let epub = work.path().join(format!("{stem}.epub"));

                self.render_epub(markdown, &epub, cover).await?;
                let args = vec![epub.display().to_string(), output.display().to_string()];
                self.run(&self.ebook_convert, &args).await?;
                info!("Rendered MOBI → {}", output.display());
                Ok(())
            }
        }
    }
}

fn install_hint(tool: &str) -> &'static str {
    if tool.contains("ebook-convert") {
        "MOBI output needs calibre's ebook-convert on PATH. Install calibre from https://calibre-ebook.com"
    } else {
        "Install pandoc from https://pandoc.org/installing.html and make sure it is on PATH"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pandoc_args_without_cover() {
        let r = PandocRenderer::new();
        let args = r.pandoc_args(Path::new("in.md"), Path::new("out/book.epub"), None);
        assert_eq!(args[0], "in.md");
        assert!(args.contains(&"out/book.epub".to_string()));
        assert!(args.contains(&"title=book".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--epub-cover-image")));
    }

    #[test]
    fn pandoc_args_skip_missing_cover() {
        let r = PandocRenderer::new();
        let args = r.pandoc_args(
            Path::new("in.md"),
            Path::new("out.epub"),
            Some(Path::new("/definitely/not/here.png")),
        );
        assert!(!args.iter().any(|a| a.starts_with("--epub-cover-image")));
    }

    #[test]
    fn pandoc_args_with_existing_cover_and_title() {
        let dir = TempDir::new().unwrap();
        let cover = dir.path().join("cover.png");
        std::fs::write(&cover, b"png").unwrap();
        let r = PandocRenderer::new().title("My Book");
        let args = r.pandoc_args(Path::new("in.md"), Path::new("out.epub"), Some(&cover));
        assert!(args.contains(&format!("--epub-cover-image={}", cover.display())));
        assert!(args.contains(&"title=My Book".to_string()));
    }

    #[tokio::test]
    async fn missing_tool_is_backend_unavailable() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("in.md");
        std::fs::write(&md, "# Hi").unwrap();
        let r = PandocRenderer::new().pandoc_path("/nonexistent/pandoc-binary");
        let err = r
            .render(&md, &dir.path().join("out.epub"), OutputFormat::Epub, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Pdf2EbookError::BackendUnavailable { .. }),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn markdown_is_not_rendered() {
        let r = PandocRenderer::new();
        let err = r
            .render(Path::new("a.md"), Path::new("b.md"), OutputFormat::Markdown, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2EbookError::Internal(_)));
    }
}
