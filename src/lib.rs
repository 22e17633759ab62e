//! # edgequake-docconv
//!
//! Convert office documents, PDFs, text and images between formats by
//! orchestrating external engines (LibreOffice, poppler, Ghostscript,
//! ImageMagick, Tesseract) and in-process libraries (pdfium, `image`).
//!
//! ## Why a strategy chain?
//!
//! No single engine handles every format pair, and every engine fails on
//! some inputs. Each format pair therefore maps to an ordered list of
//! strategies. The driver tries them in order and the first one that leaves
//! a non-empty file with the target extension in the request workspace wins.
//! A failed attempt is logged, recorded and its partial output discarded;
//! only exhaustion of the whole chain is an error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload + form fields
//!  │
//!  ├─ 1. Normalize  validate formats and options, assign a correlation id
//!  ├─ 2. Workspace  isolated scratch directory, normalised input name
//!  ├─ 3. Decrypt    encrypted PDFs only
//!  ├─ 4. Chain      raster │ text extraction │ pdf → office │ generic
//!  ├─ 5. Resolve    newest non-empty file with the target extension
//!  └─ 6. Assemble   atomic promotion to output storage + result descriptor
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docconv::{normalize, ConversionConfig, ConversionForm, Converter, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConversionConfig::default());
//!     let upload = UploadedFile::from_path("report.docx").await?;
//!     let form = ConversionForm {
//!         output_format: Some("pdf".into()),
//!         ..Default::default()
//!     };
//!     let result = converter.convert(normalize(upload, &form)?).await?;
//!     println!("{} ({:?})", result.file_url, result.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docconv` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docconv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod assemble;
pub mod cancel;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod format;
pub mod observer;
pub mod pipeline;
pub mod request;
pub mod strategy;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{ConversionResult, ConversionStatus, FailureDescriptor};
pub use cancel::CancelToken;
pub use config::{ConversionConfig, ConversionConfigBuilder, EngineBinaries};
pub use convert::{Converter, EngineReport, EngineStatus, HealthStatus};
pub use engine::Engines;
pub use error::{AttemptError, ConvertError, ErrorKind, LibraryError, ToolError};
pub use format::{Format, PageRange};
pub use observer::{ConversionObserver, NoopObserver, Observer};
pub use pipeline::{AttemptOutcome, ConversionAttempt};
pub use request::{
    normalize, ConversionForm, ConversionOptions, ConversionRequest, CorrelationId, UploadedFile,
};
