//! CLI binary for pdf2ebook.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, runs the conversion and manages the output store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf2ebook::{
    convert, ConversionConfig, ConversionOutcome, ConversionProgressCallback, ConversionStage,
    OutputFormat, OutputStore, PageSeparator, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner that follows the conversion stage
/// and logs each drafted page above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, source: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {source}"))
        ));
        self.bar.set_message("reading input…");
    }

    fn on_stage(&self, stage: ConversionStage) {
        let (prefix, msg) = match stage {
            ConversionStage::Drafting => ("Drafting", "waiting for OCR…"),
            ConversionStage::CoverResolution => ("Cover", "resolving cover image…"),
            ConversionStage::Rendering => ("Rendering", "running converter…"),
            // on_conversion_complete clears the spinner.
            ConversionStage::Done | ConversionStage::Failed => return,
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }

    fn on_page_drafted(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{markdown_len:>6} bytes")),
        ));
    }

    fn on_conversion_complete(&self, outcome: &ConversionOutcome) {
        self.bar.finish_and_clear();
        let mark = if outcome.is_success() { green("✔") } else { red("✘") };
        eprintln!("{mark} {}", bold(&outcome.message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # EPUB with the first scanned page as cover
  pdf2ebook convert scan.pdf --auto-cover

  # Cleaned Markdown only (no pandoc needed)
  pdf2ebook convert scan.pdf -f markdown

  # MOBI with a custom cover and title
  pdf2ebook convert book.pdf -f mobi --cover cover.jpg --title "My Book"

  # Convert from URL
  pdf2ebook convert https://example.org/paper.pdf

  # Manage generated files
  pdf2ebook list
  pdf2ebook view paper.md
  pdf2ebook delete paper.epub

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY        OCR service API key (required for conversion)
  PDF2EBOOK_STORE        Output directory (default: outputs)
  PDF2EBOOK_MODEL        Override OCR model ID
  RUST_LOG               Override log filter

EXTERNAL TOOLS:
  EPUB needs pandoc on PATH; MOBI additionally needs calibre's ebook-convert.
"#;

/// Convert PDF files and URLs to Markdown, EPUB or MOBI using cloud OCR.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2ebook",
    version,
    about = "Convert PDF files and URLs to Markdown, EPUB or MOBI using cloud OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding generated files.
    #[arg(long, global = true, env = "PDF2EBOOK_STORE", default_value = "outputs")]
    store: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2EBOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2EBOOK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PDF into the store.
    Convert(ConvertArgs),
    /// List files in the store, newest name first.
    List {
        /// Output JSON instead of one line per file.
        #[arg(long)]
        json: bool,
    },
    /// Print a Markdown file from the store.
    View { name: String },
    /// Delete a file from the store.
    Delete { name: String },
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output format.
    #[arg(short, long, env = "PDF2EBOOK_FORMAT", value_enum, default_value = "epub")]
    format: FormatArg,

    /// Cover image file (EPUB/MOBI only).
    #[arg(long)]
    cover: Option<PathBuf>,

    /// Use the first image of the document as cover.
    #[arg(long, env = "PDF2EBOOK_AUTO_COVER")]
    auto_cover: bool,

    /// Output file stem; default is the input file name.
    #[arg(long)]
    name: Option<String>,

    /// Ebook title metadata; default is the output file stem.
    #[arg(long)]
    title: Option<String>,

    /// Page separator: none, hr, comment, or custom string.
    #[arg(long, env = "PDF2EBOOK_SEPARATOR", default_value = "none")]
    separator: String,

    /// OCR service API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OCR model ID.
    #[arg(long, env = "PDF2EBOOK_MODEL")]
    model: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2EBOOK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// OCR request timeout in seconds.
    #[arg(long, env = "PDF2EBOOK_OCR_TIMEOUT", default_value_t = 300)]
    ocr_timeout: u64,

    /// pandoc / ebook-convert timeout in seconds.
    #[arg(long, env = "PDF2EBOOK_RENDER_TIMEOUT", default_value_t = 300)]
    render_timeout: u64,

    /// Print the outcome as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2EBOOK_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Markdown,
    Epub,
    Mobi,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Epub => OutputFormat::Epub,
            FormatArg::Mobi => OutputFormat::Mobi,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters during a conversion;
    // library INFO logs would interleave with it.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = OutputStore::open(&cli.store)
        .with_context(|| format!("Failed to open output store {}", cli.store.display()))?;

    match cli.command {
        Command::Convert(ref args) => run_convert(args, &store, show_progress, cli.quiet).await,
        Command::List { json } => run_list(&store, json),
        Command::View { ref name } => {
            let text = store
                .view(name)
                .with_context(|| format!("Failed to view {name}"))?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
        Command::Delete { ref name } => {
            store
                .delete(name)
                .with_context(|| format!("Failed to delete {name}"))?;
            if !cli.quiet {
                eprintln!("{} Deleted {}", green("✔"), bold(name));
            }
            Ok(())
        }
    }
}

async fn run_convert(
    args: &ConvertArgs,
    store: &OutputStore,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(args, progress_cb)?;
    let outcome = convert(&args.input, store, &config).await;

    if args.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    } else if !show_progress && (!quiet || !outcome.is_success()) {
        // The callback already printed the status line when the spinner ran.
        eprintln!("{}", outcome.message);
    }

    if !outcome.is_success() {
        // The message already starts with "Error: "; skip anyhow's report.
        std::process::exit(1);
    }

    if !quiet && !args.json {
        if let Some(ref artifact) = outcome.artifact {
            eprintln!(
                "   {} pages  {}ms  →  {}",
                outcome.pages,
                outcome.duration_ms,
                bold(&artifact.display().to_string()),
            );
        }
        if let Some(ref cover) = outcome.cover {
            eprintln!("   cover  →  {}", dim(&cover.display().to_string()));
        }
    }
    Ok(())
}

fn run_list(store: &OutputStore, json: bool) -> Result<()> {
    let files = store.list().context("Failed to list output store")?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&files).context("Failed to serialise listing")?
        );
    } else if files.is_empty() {
        eprintln!("{}", dim("(no files)"));
    } else {
        for file in &files {
            println!("{file}");
        }
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(args: &ConvertArgs, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .format(args.format.into())
        .auto_cover(args.auto_cover)
        .page_separator(parse_separator(&args.separator))
        .download_timeout_secs(args.download_timeout)
        .ocr_timeout_secs(args.ocr_timeout)
        .render_timeout_secs(args.render_timeout);

    if let Some(ref cover) = args.cover {
        builder = builder.manual_cover(cover);
    }
    if let Some(ref name) = args.name {
        builder = builder.base_name(name);
    }
    if let Some(ref title) = args.title {
        builder = builder.title(title);
    }
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref model) = args.model {
        builder = builder.ocr_model(model);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
