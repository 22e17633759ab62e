//! Scripted engines shared by the integration tests.
//!
//! `ScriptedRunner` stands in for the external binaries: programs marked as
//! installed write the files the real tools would write, everything else is
//! `NotFound`. Every invocation is recorded.
//!
//! Encryption lives in the bytes, not the file name: a PDF is locked while it
//! contains [`ENCRYPT_MARKER`], and only the scripted `qpdf --decrypt`
//! removes it.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_docconv::engine::native::NativeConverter;
use edgequake_docconv::engine::{
    CommandRunner, DocumentInfo, DocumentLibrary, Invocation, OcrEngine, OcrWorker, RasterSpec,
    ToolOutput,
};
use edgequake_docconv::{
    AttemptError, AttemptOutcome, CancelToken, ConversionAttempt, ConversionConfig,
    ConversionObserver, Converter, Engines, LibraryError, PageRange, ToolError,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Security handler entry that marks a fixture PDF as encrypted.
pub const ENCRYPT_MARKER: &str = "/Encrypt";

/// A password-protected fixture PDF.
pub const ENCRYPTED_PDF: &[u8] = b"%PDF-1.7\n1 0 obj << /Encrypt 5 0 R >> endobj\n%%EOF\n";

fn is_encrypted(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes).contains(ENCRYPT_MARKER)
}

// ── Command runner ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedRunner {
    installed: HashSet<String>,
    /// What `pdftotext` writes to its output file.
    pdftotext_text: String,
    /// `qpdf` copies the file without removing its security handler.
    keep_encryption: bool,
    pub calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(mut self, program: &str) -> Self {
        self.installed.insert(program.to_string());
        self
    }

    pub fn pdftotext_text(mut self, text: &str) -> Self {
        self.pdftotext_text = text.to_string();
        self
    }

    pub fn qpdf_keeps_encryption(mut self) -> Self {
        self.keep_encryption = true;
        self
    }

    /// Invocations of `program`, `--version` probes excluded.
    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.program == program && inv.args_lossy() != ["--version"])
            .cloned()
            .collect()
    }

    /// Programs invoked so far, `--version` probes excluded.
    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.args_lossy() != ["--version"])
            .map(|inv| inv.program.clone())
            .collect()
    }

    fn office(&self, inv: &Invocation) -> std::io::Result<()> {
        let args = inv.args_lossy();
        let convert_to = inv.value_of("--convert-to").unwrap_or_default();
        let ext = convert_to.split(':').next().unwrap_or_default().to_string();
        let outdir = PathBuf::from(inv.value_of("--outdir").unwrap_or_default());
        let input = PathBuf::from(args.last().cloned().unwrap_or_default());
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(
            outdir.join(format!("{stem}.{ext}")),
            format!("{} converted by {}", input.display(), inv.program),
        )
    }

    /// `qpdf --decrypt --password=P in out`
    fn qpdf(&self, inv: &Invocation) -> std::io::Result<()> {
        let args = inv.args_lossy();
        let (input, out) = (&args[args.len() - 2], &args[args.len() - 1]);
        let bytes = std::fs::read(input)?;
        let written = if self.keep_encryption {
            bytes
        } else {
            String::from_utf8_lossy(&bytes)
                .replace(ENCRYPT_MARKER, "")
                .into_bytes()
        };
        std::fs::write(out, written)
    }

    /// `pdftoppm [...] -f F [-l L] [-singlefile] in prefix`: one image per
    /// page, `prefix.ext` in single-file mode, `prefix-N.ext` otherwise.
    fn pdftoppm(&self, inv: &Invocation) -> std::io::Result<()> {
        let args = inv.args_lossy();
        let prefix = args.last().cloned().unwrap_or_default();
        let ext = if args.iter().any(|a| a == "-jpeg") { "jpg" } else { "png" };
        if args.iter().any(|a| a == "-singlefile") {
            return std::fs::write(format!("{prefix}.{ext}"), b"raster");
        }
        let first: usize = inv.value_of("-f").and_then(|v| v.parse().ok()).unwrap_or(1);
        let last: usize = inv.value_of("-l").and_then(|v| v.parse().ok()).unwrap_or(first);
        for page in first..=last {
            std::fs::write(format!("{prefix}-{page}.{ext}"), b"raster")?;
        }
        Ok(())
    }

    /// Ghostscript writes to the path after `-sOutputFile=`.
    fn ghostscript(&self, inv: &Invocation) -> std::io::Result<()> {
        let args = inv.args_lossy();
        let out = args
            .iter()
            .find_map(|a| a.strip_prefix("-sOutputFile="))
            .unwrap_or_default();
        std::fs::write(out, b"raster")
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, inv: &Invocation, cancel: &CancelToken) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(inv.clone());
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                program: inv.program.clone(),
            });
        }
        if !self.installed.contains(&inv.program) {
            return Err(ToolError::NotFound {
                program: inv.program.clone(),
                detail: "No such file or directory (os error 2)".into(),
            });
        }
        if inv.args_lossy() == ["--version"] {
            return Ok(ToolOutput {
                stdout: format!("{} 7.6.4\n", inv.program).into_bytes(),
                stderr: String::new(),
            });
        }

        // Every engine but qpdf refuses a file that is still encrypted.
        if inv.program != "qpdf"
            && inv
                .args
                .iter()
                .any(|a| std::fs::read(a).is_ok_and(|bytes| is_encrypted(&bytes)))
        {
            return Err(ToolError::Exited {
                program: inv.program.clone(),
                code: Some(1),
                stderr: "Incorrect password".into(),
            });
        }

        let io = |e: std::io::Error| ToolError::Io {
            program: inv.program.clone(),
            source: e,
        };
        match inv.program.as_str() {
            "libreoffice" | "soffice" => self.office(inv).map_err(io)?,
            "qpdf" => self.qpdf(inv).map_err(io)?,
            "pdftoppm" => self.pdftoppm(inv).map_err(io)?,
            "gs" | "gswin64c" => self.ghostscript(inv).map_err(io)?,
            "pdftotext" => {
                let args = inv.args_lossy();
                let out = args.last().cloned().unwrap_or_default();
                std::fs::write(out, &self.pdftotext_text).map_err(io)?;
            }
            _ => {}
        }
        Ok(ToolOutput::default())
    }
}

// ── Document library ─────────────────────────────────────────────────────────

/// A PDF library with a fixed page count and text layer. A file is locked
/// while its bytes carry [`ENCRYPT_MARKER`] and a password is configured.
pub struct FakeLibrary {
    pub page_count: usize,
    pub password: Option<String>,
    pub text: String,
}

impl FakeLibrary {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            password: None,
            text: String::new(),
        }
    }

    pub fn encrypted(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }
}

#[async_trait]
impl DocumentLibrary for FakeLibrary {
    fn name(&self) -> &'static str {
        "fake-pdf"
    }

    async fn inspect(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<DocumentInfo, LibraryError> {
        let bytes = std::fs::read(path).map_err(|e| LibraryError::Failed(e.to_string()))?;
        let info = |encrypted: bool| DocumentInfo {
            page_count: self.page_count,
            encrypted,
        };
        if self.password.is_none() || !is_encrypted(&bytes) {
            return Ok(info(false));
        }
        match password {
            None => Err(LibraryError::PasswordRequired),
            Some(p) if Some(p) == self.password.as_deref() => Ok(info(true)),
            Some(_) => Err(LibraryError::WrongPassword),
        }
    }

    async fn extract_text(
        &self,
        _path: &Path,
        _pages: Option<PageRange>,
    ) -> Result<String, LibraryError> {
        Ok(self.text.clone())
    }

    async fn rasterize(
        &self,
        _path: &Path,
        page_index: usize,
        _spec: RasterSpec,
        out: &Path,
    ) -> Result<(), LibraryError> {
        std::fs::write(out, format!("page {}", page_index + 1))
            .map_err(|e| LibraryError::Failed(e.to_string()))
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeOcr {
    pub workers: Arc<AtomicUsize>,
    pub terminated: Arc<AtomicUsize>,
}

struct FakeWorker {
    terminated: Arc<AtomicUsize>,
}

#[async_trait]
impl OcrEngine for FakeOcr {
    fn name(&self) -> &'static str {
        "fake-ocr"
    }

    async fn create_worker(&self, _language: &str) -> Result<Box<dyn OcrWorker>, AttemptError> {
        self.workers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeWorker {
            terminated: self.terminated.clone(),
        }))
    }
}

#[async_trait]
impl OcrWorker for FakeWorker {
    async fn recognize(&self, image: &Path, _cancel: &CancelToken) -> Result<String, AttemptError> {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("Recognised text from {name}"))
    }

    async fn terminate(self: Box<Self>) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Observer ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CountingObserver {
    pub starts: AtomicUsize,
    pub attempts: AtomicUsize,
    pub failures: AtomicUsize,
    pub completions: AtomicUsize,
}

impl ConversionObserver for CountingObserver {
    fn on_attempt_start(&self, _index: usize, _strategy: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_complete(&self, attempt: &ConversionAttempt) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt.outcome == AttemptOutcome::Failure {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_conversion_complete(&self, _success: bool, _attempts: usize) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

/// Temporary work and output directories plus the config pointing at them.
pub struct Harness {
    pub root: tempfile::TempDir,
    pub config: ConversionConfig,
}

impl Harness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .work_dir(root.path().join("work"))
            .output_dir(root.path().join("out"))
            .tool_timeout_secs(5)
            .build()
            .unwrap();
        Self { root, config }
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    /// Entries left under the work directory.
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(self.work_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn converter(
        &self,
        runner: &Arc<ScriptedRunner>,
        library: &Arc<FakeLibrary>,
        ocr: &Arc<FakeOcr>,
    ) -> Converter {
        let engines = Engines {
            runner: runner.clone(),
            library: library.clone(),
            ocr: ocr.clone(),
            native: Arc::new(NativeConverter),
        };
        Converter::with_engines(self.config.clone(), engines)
    }
}
