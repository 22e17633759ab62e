//! Configuration types for document conversion.
//!
//! All orchestration behaviour is controlled through [`ConversionConfig`],
//! built via its [`ConversionConfigBuilder`]. Per-request knobs (OCR,
//! quality, password, page range) live on the request instead; see
//! [`crate::request::ConversionOptions`].

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Rasterisation resolution used by every PDF → image strategy.
pub const RASTER_DPI: u32 = 300;

/// Configuration shared by every request a [`crate::Converter`] handles.
///
/// # Example
/// ```rust
/// use edgequake_docconv::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .output_dir("/srv/conversions")
///     .tool_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.tool_timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Root under which per-request workspaces are created.
    /// Default: `$TMPDIR/docconv`.
    pub work_dir: PathBuf,

    /// Durable storage for promoted artifacts. Default: `./conversions`.
    pub output_dir: PathBuf,

    /// Prefix of the retrieval reference returned in
    /// [`crate::ConversionResult::file_url`]; the output file name is appended.
    pub file_url_base: String,

    /// Deadline for every external process, in seconds. Default: 300.
    pub tool_timeout_secs: u64,

    /// Return an empty spreadsheet shell when every PDF → spreadsheet
    /// strategy fails, instead of `ConversionFailed`. Default: true.
    pub spreadsheet_placeholder: bool,

    /// Tesseract language code. Default: `eng`.
    pub ocr_language: String,

    /// Directory containing the pdfium shared library. `None` binds to the
    /// system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// External engine binary names or paths.
    pub binaries: EngineBinaries,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("docconv"),
            output_dir: PathBuf::from("conversions"),
            file_url_base: "/api/file?folder=conversions&filename=".to_string(),
            tool_timeout_secs: 300,
            spreadsheet_placeholder: true,
            ocr_language: "eng".to_string(),
            pdfium_library_path: None,
            binaries: EngineBinaries::default(),
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Names (or absolute paths) of the external engines.
///
/// An empty value is invalid; every engine must have a name to search `PATH` for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineBinaries {
    /// Office suite batch converter, primary name.
    pub libreoffice: String,
    /// Same office suite under its alternate binary name.
    pub soffice: String,
    pub pdftotext: String,
    pub pdftoppm: String,
    /// Platform ghostscript (`gswin64c` on Windows, `gs` elsewhere).
    pub ghostscript: String,
    /// General-purpose ghostscript name tried after the platform rasteriser.
    pub ghostscript_fallback: String,
    /// ImageMagick `convert`.
    pub imagemagick: String,
    pub tesseract: String,
    /// Optional table extractor, only used when installed.
    pub tabula: String,
    /// Removes PDF encryption once the password has been checked.
    pub qpdf: String,
}

impl Default for EngineBinaries {
    fn default() -> Self {
        Self {
            libreoffice: "libreoffice".into(),
            soffice: "soffice".into(),
            pdftotext: "pdftotext".into(),
            pdftoppm: "pdftoppm".into(),
            ghostscript: if cfg!(windows) { "gswin64c" } else { "gs" }.into(),
            ghostscript_fallback: "gs".into(),
            imagemagick: "convert".into(),
            tesseract: "tesseract".into(),
            tabula: "tabula".into(),
            qpdf: "qpdf".into(),
        }
    }
}

impl EngineBinaries {
    /// `(role, binary)` for every engine: validated by the builder, probed
    /// by the health report.
    pub fn all(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("libreoffice", self.libreoffice.as_str()),
            ("soffice", self.soffice.as_str()),
            ("pdftotext", self.pdftotext.as_str()),
            ("pdftoppm", self.pdftoppm.as_str()),
            ("ghostscript", self.ghostscript.as_str()),
            ("ghostscript-fallback", self.ghostscript_fallback.as_str()),
            ("imagemagick", self.imagemagick.as_str()),
            ("tesseract", self.tesseract.as_str()),
            ("tabula", self.tabula.as_str()),
            ("qpdf", self.qpdf.as_str()),
        ]
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn file_url_base(mut self, base: impl Into<String>) -> Self {
        self.config.file_url_base = base.into();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn spreadsheet_placeholder(mut self, v: bool) -> Self {
        self.config.spreadsheet_placeholder = v;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn binaries(mut self, binaries: EngineBinaries) -> Self {
        self.config.binaries = binaries;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.tool_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if let Some((role, _)) = c.binaries.all().into_iter().find(|(_, b)| b.trim().is_empty()) {
            return Err(ConvertError::InvalidConfig(format!(
                "Binary for '{role}' must not be empty"
            )));
        }
        if c.work_dir == c.output_dir {
            return Err(ConvertError::InvalidConfig(
                "work_dir and output_dir must differ".into(),
            ));
        }
        Ok(self.config)
    }
}
