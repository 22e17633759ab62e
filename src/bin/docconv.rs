//! CLI binary for edgequake-docconv.
//!
//! A thin shim over the library crate that maps CLI flags onto a
//! `ConversionForm` and `ConversionConfig`, runs one conversion and prints
//! the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docconv::{
    normalize, AttemptOutcome, CancelToken, ConversionAttempt, ConversionConfig, ConversionForm,
    ConversionObserver, ConversionStatus, ConvertError, Converter, FailureDescriptor, Format,
    HealthStatus, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner naming the strategy in flight and one log
/// line per finished attempt.
struct CliObserver {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Writing workspace…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl ConversionObserver for CliObserver {
    fn on_conversion_start(&self, _correlation_id: &str, source: Format, target: Format) {
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!("{source} → {target}"));
    }

    fn on_attempt_start(&self, index: usize, strategy: &str) {
        self.bar.set_message(format!("#{} {strategy}", index + 1));
    }

    fn on_attempt_complete(&self, attempt: &ConversionAttempt) {
        let elapsed = dim(&format!("{:.1}s", attempt.elapsed_ms as f64 / 1000.0));
        match attempt.outcome {
            AttemptOutcome::Success => self.bar.println(format!(
                "  {} {:<28} {}",
                green("✓"),
                attempt.strategy,
                elapsed
            )),
            AttemptOutcome::Bridged => self.bar.println(format!(
                "  {} {:<28} {}",
                dim("↪"),
                attempt.strategy,
                elapsed
            )),
            AttemptOutcome::Failure => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                let error = attempt.error.clone().unwrap_or_default();
                let msg = if error.chars().count() > 80 {
                    format!("{}\u{2026}", error.chars().take(79).collect::<String>())
                } else {
                    error
                };
                self.bar.println(format!(
                    "  {} {:<28} {}  {}",
                    red("✗"),
                    attempt.strategy,
                    red(&msg),
                    elapsed
                ));
            }
        }
    }

    fn on_conversion_complete(&self, success: bool, attempts: usize) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::SeqCst);
        if success && failed > 0 {
            eprintln!(
                "{}",
                dim(&format!("{failed} of {attempts} strategies failed before one succeeded"))
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Office document to PDF
  docconv report.docx --to pdf

  # Scanned PDF to text with OCR
  docconv scan.pdf --to txt --ocr

  # Second page of a PDF as a JPEG
  docconv slides.pdf --to jpg --pages 2 --quality 80

  # Encrypted PDF to Word
  docconv locked.pdf --to docx --password secret

  # File with an unhelpful extension
  docconv upload.bin --from pdf --to xlsx --json

  # Which engines are installed?
  docconv --status

FORMATS:
  Input   pdf docx xlsx pptx rtf txt html jpg jpeg png
  Output  pdf docx xls xlsx pptx rtf txt html jpg jpeg png

ENGINES (searched on PATH, override with DOCCONV_* variables):
  libreoffice / soffice   office documents
  pdftotext / pdftoppm    poppler text and raster
  gs                      ghostscript raster
  convert                 ImageMagick re-encode
  tesseract               OCR
  tabula                  optional table extraction
  qpdf                    removes encryption from password-protected PDFs
  libpdfium               in-process password check, text and raster
"#;

/// Convert documents between office, PDF, text and image formats.
#[derive(Parser, Debug)]
#[command(
    name = "docconv",
    version,
    about = "Convert documents between office, PDF, text and image formats",
    long_about = "Convert documents between office, PDF, text and image formats by trying a \
chain of external engines (LibreOffice, poppler, Ghostscript, ImageMagick, Tesseract) and \
in-process libraries until one produces the requested output.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file to convert.
    #[arg(required_unless_present = "status")]
    input: Option<PathBuf>,

    /// Output format (pdf, docx, xlsx, xls, pptx, rtf, txt, html, jpg, jpeg, png).
    #[arg(short, long, env = "DOCCONV_TO", required_unless_present = "status")]
    to: Option<String>,

    /// Source format, used when the file extension is not a supported input.
    #[arg(long, env = "DOCCONV_FROM")]
    from: Option<String>,

    /// Run OCR when a PDF has no text layer.
    #[arg(long, env = "DOCCONV_OCR")]
    ocr: bool,

    /// JPEG quality for image output (1–100).
    #[arg(long, env = "DOCCONV_QUALITY")]
    quality: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCCONV_PASSWORD")]
    password: Option<String>,

    /// Page range: 3, 2-5 or 4-.
    #[arg(long, env = "DOCCONV_PAGES")]
    pages: Option<String>,

    /// Directory converted files are written to.
    #[arg(short, long, env = "DOCCONV_OUTPUT_DIR", default_value = "conversions")]
    output_dir: PathBuf,

    /// Root for per-request scratch directories.
    #[arg(long, env = "DOCCONV_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Deadline for each external engine, in seconds.
    #[arg(long, env = "DOCCONV_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Fail instead of writing an empty spreadsheet when no table is found.
    #[arg(long, env = "DOCCONV_NO_PLACEHOLDER")]
    no_placeholder: bool,

    /// Tesseract language code.
    #[arg(long, env = "DOCCONV_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Directory or file of the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Output the result (or failure) as JSON on stdout.
    #[arg(long, env = "DOCCONV_JSON")]
    json: bool,

    /// Report which engines are installed, then exit.
    #[arg(long)]
    status: bool,

    /// Disable the spinner.
    #[arg(long, env = "DOCCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCCONV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports every attempt, so library INFO lines are
    // suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.status;
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

    let config = build_config(&cli)?;
    let mut converter = Converter::new(config);

    // ── Status mode ──────────────────────────────────────────────────────
    if cli.status {
        let report = converter.engine_report().await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            for engine in &report.engines {
                let detail = if engine.available {
                    engine.version.clone().unwrap_or_default()
                } else {
                    engine.error.clone().unwrap_or_default()
                };
                println!(
                    "{} {:<17} {:<12} {}",
                    if engine.available { green("✓") } else { red("✗") },
                    engine.role,
                    engine.binary,
                    dim(&detail)
                );
            }
            let status = match report.status {
                HealthStatus::Healthy => green("healthy"),
                HealthStatus::Degraded => yellow("degraded"),
            };
            println!("{} {}", bold("Status:"), status);
        }
        return Ok(());
    }

    // ── Build request ────────────────────────────────────────────────────
    let input = cli.input.as_ref().context("INPUT is required")?;
    let upload = UploadedFile::from_path(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let form = ConversionForm {
        input_format: cli.from.clone(),
        output_format: cli.to.clone(),
        ocr: Some(cli.ocr.to_string()),
        quality: cli.quality.clone(),
        password: cli.password.clone(),
        page_range: cli.pages.clone(),
    };
    let request = match normalize(upload, &form) {
        Ok(r) => r,
        Err(e) if cli.json => {
            print_failure(&FailureDescriptor::from(&e))?;
            std::process::exit(exit_code(&e));
        }
        Err(e) => {
            eprintln!("{} Invalid request: {}", red("✗"), e);
            std::process::exit(exit_code(&e));
        }
    };

    if show_progress {
        converter = converter.with_observer(CliObserver::new());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    // Ctrl-C cancels the request: the in-flight engine is killed and the
    // workspace released before exit.
    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match converter.convert_with_cancel(request, &cancel).await {
        Ok(result) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).context("Failed to serialise result")?
                );
            } else {
                if !cli.quiet {
                    let mark = match result.status {
                        ConversionStatus::Success => green("✔"),
                        ConversionStatus::Degraded => yellow("⚠"),
                    };
                    eprintln!(
                        "{}  {} → {}  via {}  →  {}",
                        mark,
                        result.source_format,
                        result.target_format,
                        result.strategy,
                        bold(&result.output_path.display().to_string()),
                    );
                    if result.status == ConversionStatus::Degraded {
                        eprintln!(
                            "   {}",
                            yellow("No engine could extract content; the output is a placeholder.")
                        );
                    }
                }
                println!("{}", result.output_path.display());
            }
            Ok(())
        }
        Err(e) if cli.json => {
            print_failure(&FailureDescriptor::from(&e))?;
            std::process::exit(exit_code(&e));
        }
        Err(e) => {
            if !cli.quiet {
                eprintln!("{} {}", red("✗"), e);
            }
            std::process::exit(exit_code(&e));
        }
    }
}

/// 2 when the request was rejected, 1 when the conversion itself failed.
fn exit_code(e: &ConvertError) -> i32 {
    if e.is_request_error() {
        2
    } else {
        1
    }
}

fn print_failure(failure: &FailureDescriptor) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(failure).context("Failed to serialise failure")?
    );
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .output_dir(&cli.output_dir)
        .tool_timeout_secs(cli.timeout)
        .spreadsheet_placeholder(!cli.no_placeholder)
        .ocr_language(&cli.ocr_lang);
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir);
    }
    if let Some(ref path) = cli.pdfium {
        builder = builder.pdfium_library_path(path);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Binary overrides, one variable per engine.
    let binaries = &mut config.binaries;
    for (var, slot) in [
        ("DOCCONV_LIBREOFFICE", &mut binaries.libreoffice),
        ("DOCCONV_SOFFICE", &mut binaries.soffice),
        ("DOCCONV_PDFTOTEXT", &mut binaries.pdftotext),
        ("DOCCONV_PDFTOPPM", &mut binaries.pdftoppm),
        ("DOCCONV_GHOSTSCRIPT", &mut binaries.ghostscript),
        ("DOCCONV_GHOSTSCRIPT_FALLBACK", &mut binaries.ghostscript_fallback),
        ("DOCCONV_IMAGEMAGICK", &mut binaries.imagemagick),
        ("DOCCONV_TESSERACT", &mut binaries.tesseract),
        ("DOCCONV_TABULA", &mut binaries.tabula),
        ("DOCCONV_QPDF", &mut binaries.qpdf),
    ] {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                *slot = value;
            }
        }
    }

    Ok(config)
}
