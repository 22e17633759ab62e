//! Downward collaborators: the engines strategies delegate to.
//!
//! Every engine sits behind a trait so the pipeline driver never depends on a
//! concrete binary or library. [`Engines::system`] wires the real
//! implementations; tests substitute scripted fakes.
//!
//! | Trait | Real implementation | Backs |
//! |---|---|---|
//! | [`CommandRunner`] | [`process::ProcessRunner`] | libreoffice, soffice, pdftotext, pdftoppm, gs, convert, tabula, qpdf |
//! | [`DocumentLibrary`] | [`pdfium::PdfiumLibrary`] | encryption probe, password check, text layer, rasterisation |
//! | [`OcrEngine`] | [`tesseract::TesseractEngine`] | OCR worker lifecycle |
//! | [`InProcessConverter`] | [`native::NativeConverter`] | text/html, same-format copy, image re-encode |

pub mod native;
pub mod pdfium;
pub mod process;
pub mod tesseract;

use crate::cancel::CancelToken;
use crate::config::ConversionConfig;
use crate::error::{AttemptError, LibraryError, ToolError};
use crate::format::{Format, PageRange};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

// ── Subprocesses ─────────────────────────────────────────────────────────

/// A fully specified external command.
///
/// Arguments are passed as a vector, never through a shell, so workspace
/// paths need no quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Arguments as UTF-8 strings (lossy), for logging and test assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Value following `flag`, e.g. the directory after `--outdir`.
    pub fn value_of(&self, flag: &str) -> Option<String> {
        let args = self.args_lossy();
        let pos = args.iter().position(|a| a == flag)?;
        args.get(pos + 1).cloned()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {}", a.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured output of a successful process run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs external command-line engines.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A non-zero exit is an error.
    async fn run(&self, invocation: &Invocation, cancel: &CancelToken)
        -> Result<ToolOutput, ToolError>;

    /// Run `program --version` and return the first non-empty output line.
    async fn probe(&self, program: &str) -> Result<String, ToolError> {
        let out = self
            .run(&Invocation::new(program).arg("--version"), &CancelToken::new())
            .await?;
        let text = if out.stdout.is_empty() {
            out.stderr.clone()
        } else {
            out.stdout_lossy()
        };
        Ok(text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("unknown version")
            .to_string())
    }
}

// ── Document structure library ────────────────────────────────────────────

/// What the structure library reports about a paginated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Opened only because a password was supplied.
    pub encrypted: bool,
}

/// In-process access to paginated documents.
///
/// `inspect(path, None)` on an encrypted document returns
/// [`LibraryError::PasswordRequired`]; that is how encryption is detected.
/// `inspect(path, Some(pw))` checks a password without writing anything.
/// Removing encryption is left to `qpdf`, which rewrites the file without
/// its security handler.
#[async_trait]
pub trait DocumentLibrary: Send + Sync {
    fn name(&self) -> &'static str;

    /// Check that the library can be loaded on this host.
    async fn probe(&self) -> Result<String, LibraryError> {
        Ok(self.name().to_string())
    }

    async fn inspect(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<DocumentInfo, LibraryError>;

    /// Text layer of the selected pages, pages separated by form feeds.
    async fn extract_text(
        &self,
        path: &Path,
        pages: Option<PageRange>,
    ) -> Result<String, LibraryError>;

    /// Render one 0-indexed page to `out` as PNG or JPEG.
    async fn rasterize(
        &self,
        path: &Path,
        page_index: usize,
        spec: RasterSpec,
        out: &Path,
    ) -> Result<(), LibraryError>;
}

/// Output parameters for a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSpec {
    pub format: Format,
    pub dpi: u32,
    pub quality: u8,
}

// ── OCR ───────────────────────────────────────────────────────────────────

/// Factory for OCR workers.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_worker(&self, language: &str) -> Result<Box<dyn OcrWorker>, AttemptError>;
}

/// A live OCR worker. Callers must call [`OcrWorker::terminate`] on every
/// path, including after a failed [`OcrWorker::recognize`].
#[async_trait]
pub trait OcrWorker: Send + Sync {
    async fn recognize(&self, image: &Path, cancel: &CancelToken) -> Result<String, AttemptError>;

    async fn terminate(self: Box<Self>);
}

// ── In-process conversion ─────────────────────────────────────────────────

/// Conversions performed without any external engine.
#[async_trait]
pub trait InProcessConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Convert `input` (of `source` format) into `out`. Pairs the converter
    /// cannot handle return [`AttemptError::Unsupported`].
    async fn convert(
        &self,
        input: &Path,
        source: Format,
        target: Format,
        quality: u8,
        out: &Path,
    ) -> Result<(), AttemptError>;
}

// ── Bundle ────────────────────────────────────────────────────────────────

/// The set of engines one [`crate::Converter`] uses.
#[derive(Clone)]
pub struct Engines {
    pub runner: Arc<dyn CommandRunner>,
    pub library: Arc<dyn DocumentLibrary>,
    pub ocr: Arc<dyn OcrEngine>,
    pub native: Arc<dyn InProcessConverter>,
}

impl Engines {
    /// Real engines: subprocesses under the configured timeout, pdfium,
    /// tesseract and the built-in converter.
    pub fn system(config: &ConversionConfig) -> Self {
        let runner: Arc<dyn CommandRunner> =
            Arc::new(process::ProcessRunner::new(config.tool_timeout_secs));
        Self {
            library: Arc::new(pdfium::PdfiumLibrary::new(
                config.pdfium_library_path.clone(),
            )),
            ocr: Arc::new(tesseract::TesseractEngine::new(
                runner.clone(),
                config.binaries.tesseract.clone(),
            )),
            native: Arc::new(native::NativeConverter),
            runner,
        }
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines")
            .field("library", &self.library.name())
            .field("ocr", &self.ocr.name())
            .field("native", &self.native.name())
            .finish_non_exhaustive()
    }
}
