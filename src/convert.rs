//! The conversion entry point.
//!
//! [`Converter`] owns the configuration, the engine bundle and an observer.
//! Each call to [`Converter::convert`] runs one request end to end:
//!
//! ```text
//! request
//!  │
//!  ├─ 1. Workspace   acquire {work_dir}/docconv-{id}-*, write the input
//!  ├─ 2. Decrypt     PDFs only: probe encryption, check the password, qpdf
//!  ├─ 3. Select      pure decision table → ordered strategy chain
//!  ├─ 4. Drive       attempts in order until one yields the target artifact
//!  ├─ 5. Promote     copy the winner to {output_dir}/{id}-output.{ext}
//!  └─ 6. Release     delete the workspace on every exit path
//! ```
//!
//! A `Converter` is cheap to clone and safe to share: concurrent requests
//! touch only their own workspace.

use crate::assemble::{build_result, promote, ConversionResult, ResultParts};
use crate::cancel::CancelToken;
use crate::config::ConversionConfig;
use crate::engine::{Engines, Invocation};
use crate::error::{ConvertError, LibraryError, ToolError};
use crate::format::Format;
use crate::observer::{NoopObserver, Observer};
use crate::pipeline::{run_chain, ChainOutcome};
use crate::request::{ConversionOptions, ConversionRequest, CorrelationId, UploadedFile};
use crate::strategy::{chain_names, select_chain, AttemptContext, ChainState};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runs conversion requests against a fixed configuration and engine set.
///
/// # Example
///
/// ```rust,no_run
/// use edgequake_docconv::{ConversionConfig, ConversionOptions, Converter, Format};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = Converter::new(ConversionConfig::default());
/// let result = converter
///     .convert_file("report.docx", Format::Pdf, ConversionOptions::default())
///     .await?;
/// println!("{} → {}", result.original_name, result.output_path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Converter {
    config: Arc<ConversionConfig>,
    engines: Engines,
    observer: Observer,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("engines", &self.engines)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// A converter using the real system engines.
    pub fn new(config: ConversionConfig) -> Self {
        let engines = Engines::system(&config);
        Self::with_engines(config, engines)
    }

    /// A converter using caller-supplied engines.
    pub fn with_engines(config: ConversionConfig, engines: Engines) -> Self {
        Self {
            config: Arc::new(config),
            engines,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the observer notified of every request and attempt.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert a validated request.
    ///
    /// # Errors
    /// Returns `Err(ConvertError)` only for fatal outcomes: decryption
    /// failure, chain exhaustion, promotion failure or workspace I/O. Failed
    /// attempts inside the chain are recorded on the result, never returned.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult, ConvertError> {
        self.convert_with_cancel(request, &CancelToken::new()).await
    }

    /// Like [`Converter::convert`], stopping early when `cancel` fires.
    /// The in-flight engine process is killed and the workspace released.
    pub async fn convert_with_cancel(
        &self,
        request: ConversionRequest,
        cancel: &CancelToken,
    ) -> Result<ConversionResult, ConvertError> {
        let span = info_span!("convert", correlation_id = %request.correlation_id);
        self.run(request, cancel).instrument(span).await
    }

    /// Convert a local file. The source format comes from its extension.
    pub async fn convert_file(
        &self,
        path: impl AsRef<Path>,
        target: Format,
        options: ConversionOptions,
    ) -> Result<ConversionResult, ConvertError> {
        let file = UploadedFile::from_path(path).await?;
        let request = ConversionRequest::new(file, None, target, options)?;
        self.convert(request).await
    }

    /// Synchronous wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn convert_sync(&self, request: ConversionRequest) -> Result<ConversionResult, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(request))
    }

    async fn run(
        &self,
        request: ConversionRequest,
        cancel: &CancelToken,
    ) -> Result<ConversionResult, ConvertError> {
        let start = Instant::now();
        let ConversionRequest {
            file,
            source,
            target,
            options,
            correlation_id,
        } = request;
        info!(
            "Converting '{}' ({} bytes): {} → {}",
            file.name,
            file.size(),
            source,
            target
        );

        let mut workspace = Workspace::acquire(
            &self.config.work_dir,
            &correlation_id,
            &file.name,
            source,
            &file.bytes,
        )
        .await?;
        drop(file.bytes);
        self.observer
            .on_conversion_start(correlation_id.as_str(), source, target);

        let job = Job {
            original_name: &file.name,
            source,
            target,
            options: &options,
            id: &correlation_id,
        };
        let outcome = self.run_in(&mut workspace, &job, cancel).await;
        workspace.release().await;

        let attempts = match &outcome {
            Ok(result) => result.attempts.len(),
            Err(ConvertError::ConversionFailed { attempts, .. }) => *attempts,
            Err(_) => 0,
        };
        self.observer
            .on_conversion_complete(outcome.is_ok(), attempts);

        match &outcome {
            Ok(result) => info!(
                "Conversion complete via {} ({:?}) in {}ms",
                result.strategy,
                result.status,
                start.elapsed().as_millis()
            ),
            Err(e) => warn!("Conversion failed: {}", e),
        }
        outcome
    }

    async fn run_in(
        &self,
        workspace: &mut Workspace,
        job: &Job<'_>,
        cancel: &CancelToken,
    ) -> Result<ConversionResult, ConvertError> {
        if job.source == Format::Pdf {
            self.unlock_pdf(workspace, job, cancel).await?;
        }
        if cancel.is_cancelled() {
            return Err(ConvertError::Cancelled);
        }

        let workspace: &Workspace = workspace;
        let chain = select_chain(job.source, job.target, job.options, &self.config);
        debug!("Selected chain: {}", chain_names(&chain).join(" → "));

        let ctx = AttemptContext {
            workspace,
            target: job.target,
            options: job.options,
            engines: &self.engines,
            config: &self.config,
            cancel,
        };
        let mut state = ChainState::new(workspace.input(), job.source);
        let run = run_chain(&ctx, &chain, &mut state, self.observer.as_ref()).await;

        match run.outcome {
            ChainOutcome::Produced(winner) => {
                if winner.degraded {
                    warn!(
                        "No engine produced real content; returning a {} placeholder",
                        job.target
                    );
                }
                let output_path =
                    promote(&winner.artifact, &self.config.output_dir, job.id, job.target)
                        .await?;
                Ok(build_result(
                    output_path,
                    ResultParts {
                        id: job.id,
                        original_name: job.original_name,
                        source: job.source,
                        target: job.target,
                        strategy: winner.strategy,
                        degraded: winner.degraded,
                        attempts: run.attempts,
                        file_url_base: &self.config.file_url_base,
                    },
                ))
            }
            ChainOutcome::Exhausted { last_error } => Err(ConvertError::ConversionFailed {
                file: job.original_name.to_string(),
                target: job.target.to_string(),
                attempts: run.attempts.len(),
                last_error,
            }),
            ChainOutcome::Cancelled => Err(ConvertError::Cancelled),
        }
    }

    /// Replace an encrypted PDF input with a decrypted copy.
    ///
    /// Unencrypted documents pass through untouched. When the structure
    /// library is unavailable the probe is skipped and the chain runs on the
    /// original bytes. The password is checked in-process, `qpdf` strips the
    /// security handler, and the copy is only swapped in once the library
    /// opens it without a password.
    async fn unlock_pdf(
        &self,
        workspace: &mut Workspace,
        job: &Job<'_>,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        let library = &self.engines.library;
        match library.inspect(workspace.input(), None).await {
            Ok(info) => {
                debug!("PDF is not encrypted ({} pages)", info.page_count);
                return Ok(());
            }
            Err(LibraryError::PasswordRequired | LibraryError::WrongPassword) => {}
            Err(e) => {
                warn!("Encryption probe skipped: {}", e);
                return Ok(());
            }
        }

        let failed = |reason: String| ConvertError::DecryptionFailed {
            file: job.original_name.to_string(),
            reason,
        };
        let Some(password) = job.options.password.as_deref() else {
            return Err(failed(
                "document is encrypted and no password was provided".into(),
            ));
        };
        match library.inspect(workspace.input(), Some(password)).await {
            Ok(_) => debug!("Password accepted"),
            Err(e @ (LibraryError::PasswordRequired | LibraryError::WrongPassword)) => {
                return Err(failed(e.to_string()));
            }
            Err(e) => warn!("Password check skipped: {}", e),
        }

        let out = workspace.path_for(&format!("{}-decrypted.pdf", workspace.input_stem()));
        let mut password_arg = std::ffi::OsString::from("--password=");
        password_arg.push(password);
        let inv = Invocation::new(&self.config.binaries.qpdf)
            .arg("--decrypt")
            .arg(password_arg)
            .arg(workspace.input())
            .arg(&out);
        if let Err(e) = self.engines.runner.run(&inv, cancel).await {
            let _ = tokio::fs::remove_file(&out).await;
            return Err(match e {
                ToolError::Cancelled { .. } => ConvertError::Cancelled,
                e => failed(e.to_string()),
            });
        }

        match library.inspect(&out, None).await {
            Ok(_) => {}
            Err(LibraryError::PasswordRequired | LibraryError::WrongPassword) => {
                let _ = tokio::fs::remove_file(&out).await;
                return Err(failed("decrypted copy is still encrypted".into()));
            }
            Err(e) => warn!("Could not verify decrypted copy: {}", e),
        }
        info!("Decrypted '{}'", job.original_name);
        workspace.replace_input(out).await;
        Ok(())
    }

    /// Probe every configured engine.
    ///
    /// The report is `healthy` when the office engine and the structure
    /// library are both usable; anything less is `degraded`.
    pub async fn engine_report(&self) -> EngineReport {
        let mut engines = Vec::new();
        for (role, binary) in self.config.binaries.all() {
            let status = match self.engines.runner.probe(binary).await {
                Ok(version) => EngineStatus::available(role, binary, version),
                Err(e) => EngineStatus::missing(role, binary, e.to_string()),
            };
            debug!(
                "Engine {} ({}): {}",
                role,
                binary,
                if status.available { "available" } else { "missing" }
            );
            engines.push(status);
        }

        let library = self.engines.library.name();
        engines.push(match self.engines.library.probe().await {
            Ok(version) => EngineStatus::available("document-library", library, version),
            Err(e) => EngineStatus::missing("document-library", library, e.to_string()),
        });

        let usable = |role: &str| engines.iter().any(|e| e.role == role && e.available);
        let status = if (usable("libreoffice") || usable("soffice")) && usable("document-library") {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        EngineReport { status, engines }
    }
}

/// The parts of a request the chain and assembler need after the upload
/// bytes are written.
struct Job<'a> {
    original_name: &'a str,
    source: Format,
    target: Format,
    options: &'a ConversionOptions,
    id: &'a CorrelationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Availability of every engine a converter can use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    pub status: HealthStatus,
    pub engines: Vec<EngineStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub role: String,
    pub binary: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineStatus {
    fn available(role: &str, binary: &str, version: String) -> Self {
        Self {
            role: role.to_string(),
            binary: binary.to_string(),
            available: true,
            version: Some(version),
            error: None,
        }
    }

    fn missing(role: &str, binary: &str, error: String) -> Self {
        Self {
            role: role.to_string(),
            binary: binary.to_string(),
            available: false,
            version: None,
            error: Some(error),
        }
    }
}
