//! Conversion strategies and the decision table that orders them.
//!
//! A [`Strategy`] is one engine-specific way of producing the target
//! artifact. Chains are plain `Vec<Box<dyn Strategy>>` values built by
//! [`select_chain`], a pure function of the format pair, the request options
//! and the configuration; [`crate::pipeline::run_chain`] drives them.
//!
//! ## Pathways
//!
//! | Source | Target | Pathway |
//! |---|---|---|
//! | any | jpg / jpeg / png | [`Pathway::Raster`] |
//! | pdf | txt | [`Pathway::TextExtraction`] |
//! | pdf | docx / rtf / xlsx / xls / pptx | [`Pathway::PdfToOffice`] |
//! | anything else | | [`Pathway::Generic`] |
//!
//! Decryption of an encrypted PDF happens before the table is consulted;
//! see [`crate::Converter`].

pub mod office;
pub mod placeholder;
pub mod raster;
pub mod text;

use crate::cancel::CancelToken;
use crate::config::ConversionConfig;
use crate::engine::Engines;
use crate::error::AttemptError;
use crate::format::{Format, FormatFamily};
use crate::pipeline::ConversionAttempt;
use crate::request::ConversionOptions;
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use office::{
    HtmlBridge, InProcess, OfficeBinary, OfficeConvert, PdfBridge, TableCsv, Tabula,
};
use placeholder::{SpreadsheetPlaceholder, TextPlaceholder};
use raster::{ByteCopy, Ghostscript, ImageMagickReencode, ImageReencode, PdfiumRaster, Pdftoppm};
use text::{Ocr, PdfiumText, Pdftotext};

// ── Strategy contract ─────────────────────────────────────────────────────

/// What a successful attempt left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The target artifact should now be in the workspace.
    Produced,
    /// An intermediate was retained in [`ChainState`] for later strategies.
    Bridged,
}

/// One engine-specific way of producing the target.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable identifier, recorded on every [`ConversionAttempt`].
    fn name(&self) -> &str;

    /// Engine role the strategy drives, e.g. `libreoffice` or `pdfium`.
    fn engine(&self) -> &str;

    /// A success from this strategy is reported as degraded.
    fn degraded(&self) -> bool {
        false
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError>;
}

impl fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything an attempt may read. Cheap to copy; retargeted for nested
/// bridge chains.
#[derive(Clone, Copy)]
pub struct AttemptContext<'a> {
    pub workspace: &'a Workspace,
    pub target: Format,
    pub options: &'a ConversionOptions,
    pub engines: &'a Engines,
    pub config: &'a ConversionConfig,
    pub cancel: &'a CancelToken,
}

impl<'a> AttemptContext<'a> {
    /// Same request, different target format.
    pub fn retarget(&self, target: Format) -> AttemptContext<'a> {
        AttemptContext { target, ..*self }
    }

    /// `{stem}-{tag}.{target}` inside the workspace.
    pub fn output_path(&self, stem: &str, tag: &str) -> PathBuf {
        self.workspace
            .path_for(&format!("{stem}-{tag}.{}", self.target.extension()))
    }

    /// First page a single-image rasteriser should render (1-indexed).
    pub fn raster_page(&self) -> usize {
        self.options
            .page_range
            .map(|r| r.first_page())
            .unwrap_or(1)
    }
}

/// Mutable state carried across the attempts of one chain.
#[derive(Debug, Clone)]
pub struct ChainState {
    /// The file strategies convert from.
    pub input: PathBuf,
    /// Format of `input`.
    pub source: Format,
    /// Bridge files kept for later strategies, newest last.
    pub intermediates: Vec<(PathBuf, Format)>,
    /// Attempts made by nested bridge chains, drained by the driver.
    pub nested_attempts: Vec<ConversionAttempt>,
}

impl ChainState {
    pub fn new(input: impl Into<PathBuf>, source: Format) -> Self {
        Self {
            input: input.into(),
            source,
            intermediates: Vec::new(),
            nested_attempts: Vec::new(),
        }
    }

    /// The input in `format`: the chain input if it already is one,
    /// otherwise the newest retained bridge of that format.
    pub fn input_as(&self, format: Format) -> Option<&Path> {
        if self.source == format {
            return Some(&self.input);
        }
        self.intermediates
            .iter()
            .rev()
            .find(|(_, f)| *f == format)
            .map(|(p, _)| p.as_path())
    }

    /// Like [`input_as`](Self::input_as), but an error when missing.
    pub fn require(&self, format: Format) -> Result<&Path, AttemptError> {
        self.input_as(format).ok_or_else(|| {
            AttemptError::Unsupported(format!(
                "needs a {format} input, have {}",
                self.source
            ))
        })
    }

    /// Stem of a path, used to name derived outputs.
    pub fn stem_of(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string())
    }

    /// Names the resolver must never pick.
    pub fn protected_names(&self) -> BTreeSet<String> {
        std::iter::once(&self.input)
            .chain(self.intermediates.iter().map(|(p, _)| p))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// Fail unless an engine actually wrote something to `path`.
pub(crate) async fn require_non_empty(path: &Path) -> Result<(), AttemptError> {
    match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() && m.len() > 0 => Ok(()),
        Ok(_) => Err(AttemptError::EmptyOutput),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AttemptError::ArtifactMissing {
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }),
        Err(e) => Err(e.into()),
    }
}

// ── Chain selection ───────────────────────────────────────────────────────

/// Which chain family a format pair uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pathway {
    Raster,
    TextExtraction,
    PdfToOffice,
    Generic,
}

pub fn pathway(source: Format, target: Format) -> Pathway {
    if target.is_image() {
        Pathway::Raster
    } else if source == Format::Pdf && target == Format::Txt {
        Pathway::TextExtraction
    } else if source == Format::Pdf && target.is_office() {
        Pathway::PdfToOffice
    } else {
        Pathway::Generic
    }
}

/// Build the ordered chain for a request.
pub fn select_chain(
    source: Format,
    target: Format,
    options: &ConversionOptions,
    config: &ConversionConfig,
) -> Vec<Box<dyn Strategy>> {
    match pathway(source, target) {
        Pathway::Raster => raster_chain(source),
        Pathway::TextExtraction => text_chain(options),
        Pathway::PdfToOffice => pdf_to_office_chain(source, target, config),
        Pathway::Generic => generic_chain(source, target),
    }
}

/// Names of a chain's strategies, in order.
pub fn chain_names(chain: &[Box<dyn Strategy>]) -> Vec<&str> {
    chain.iter().map(|s| s.name()).collect()
}

fn raster_chain(source: Format) -> Vec<Box<dyn Strategy>> {
    if source.is_image() {
        return vec![
            Box::new(ImageMagickReencode),
            Box::new(ImageReencode),
            Box::new(ByteCopy),
        ];
    }
    let mut chain: Vec<Box<dyn Strategy>> = Vec::new();
    if source != Format::Pdf {
        chain.push(Box::new(PdfBridge));
    }
    chain.extend(pdf_rasterizers());
    chain
}

/// Platform rasteriser first, general-purpose second, pdfium last.
fn pdf_rasterizers() -> Vec<Box<dyn Strategy>> {
    let mut chain: Vec<Box<dyn Strategy>> = if cfg!(windows) {
        vec![
            Box::new(Ghostscript { fallback: false }),
            Box::new(Ghostscript { fallback: true }),
        ]
    } else {
        vec![Box::new(Pdftoppm), Box::new(Ghostscript { fallback: true })]
    };
    chain.push(Box::new(PdfiumRaster));
    chain
}

fn text_chain(options: &ConversionOptions) -> Vec<Box<dyn Strategy>> {
    let last: Box<dyn Strategy> = if options.ocr {
        Box::new(Ocr)
    } else {
        Box::new(TextPlaceholder)
    };
    vec![Box::new(Pdftotext), Box::new(PdfiumText), last]
}

fn pdf_to_office_chain(
    source: Format,
    target: Format,
    config: &ConversionConfig,
) -> Vec<Box<dyn Strategy>> {
    if target.family() == FormatFamily::Spreadsheet {
        let mut chain: Vec<Box<dyn Strategy>> = vec![
            Box::new(TableCsv),
            Box::new(HtmlBridge),
            Box::new(OfficeConvert::plain(OfficeBinary::LibreOffice)),
            Box::new(OfficeConvert::with_filter(OfficeBinary::Soffice)),
            Box::new(InProcess),
            Box::new(Tabula),
        ];
        if config.spreadsheet_placeholder {
            chain.push(Box::new(SpreadsheetPlaceholder));
        }
        return chain;
    }

    let mut chain: Vec<Box<dyn Strategy>> = vec![
        Box::new(OfficeConvert::pdf_import(OfficeBinary::LibreOffice)),
        Box::new(OfficeConvert::pdf_import(OfficeBinary::Soffice)),
    ];
    chain.extend(generic_chain(source, target));
    chain
}

/// In-process first, then the office engine with its default filter, with
/// an explicit filter, and under its alternate binary name.
pub fn generic_chain(source: Format, target: Format) -> Vec<Box<dyn Strategy>> {
    let mut chain: Vec<Box<dyn Strategy>> = Vec::new();
    let word_to_slides = source.family() == FormatFamily::Word && target == Format::Pptx;
    if word_to_slides {
        chain.push(Box::new(OfficeConvert::with_filter(OfficeBinary::LibreOffice)));
        chain.push(Box::new(PdfBridge));
        chain.push(Box::new(OfficeConvert::pdf_import(OfficeBinary::LibreOffice)));
    }
    chain.push(Box::new(InProcess));
    chain.push(Box::new(OfficeConvert::plain(OfficeBinary::LibreOffice)));
    if !word_to_slides && target.export_filter(source).is_some() {
        chain.push(Box::new(OfficeConvert::with_filter(OfficeBinary::LibreOffice)));
    }
    chain.push(Box::new(OfficeConvert::plain(OfficeBinary::Soffice)));
    chain
}
