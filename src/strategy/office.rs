//! Office-engine strategies and the bridges built on them.
//!
//! Every office invocation has the same shape:
//!
//! ```text
//! BIN --headless [--infilter=F] --convert-to EXT[:FILTER] --outdir WORKSPACE INPUT
//! ```
//!
//! The engine names its output after the input stem; the driver finds it
//! with the artifact resolver.

use super::{generic_chain, AttemptContext, ChainState, Step, Strategy};
use crate::artifact;
use crate::engine::Invocation;
use crate::error::AttemptError;
use crate::format::Format;
use crate::observer::NoopObserver;
use crate::pipeline::{self, ChainOutcome};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Which name the office suite is invoked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeBinary {
    LibreOffice,
    Soffice,
}

impl OfficeBinary {
    pub fn role(self) -> &'static str {
        match self {
            OfficeBinary::LibreOffice => "libreoffice",
            OfficeBinary::Soffice => "soffice",
        }
    }

    fn program<'a>(self, ctx: &AttemptContext<'a>) -> &'a str {
        match self {
            OfficeBinary::LibreOffice => &ctx.config.binaries.libreoffice,
            OfficeBinary::Soffice => &ctx.config.binaries.soffice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfficeMode {
    /// Engine picks the export filter.
    Plain,
    /// Explicit export filter for the target.
    Filter,
    /// Open the PDF bridge with an import filter, then export.
    PdfImport,
}

/// Build a batch-conversion invocation.
pub fn office_invocation(
    program: &str,
    outdir: &Path,
    input: &Path,
    target: Format,
    filter: Option<&str>,
    infilter: Option<&str>,
) -> Invocation {
    let mut inv = Invocation::new(program).arg("--headless");
    if let Some(f) = infilter {
        inv = inv.arg(format!("--infilter={f}"));
    }
    let convert_to = match filter {
        Some(f) => format!("{}:{f}", target.extension()),
        None => target.extension().to_string(),
    };
    inv.arg("--convert-to")
        .arg(convert_to)
        .arg("--outdir")
        .arg(outdir)
        .arg(input)
}

/// One office batch conversion.
#[derive(Debug, Clone)]
pub struct OfficeConvert {
    binary: OfficeBinary,
    mode: OfficeMode,
    name: &'static str,
}

impl OfficeConvert {
    pub fn plain(binary: OfficeBinary) -> Self {
        Self {
            binary,
            mode: OfficeMode::Plain,
            name: binary.role(),
        }
    }

    pub fn with_filter(binary: OfficeBinary) -> Self {
        let name = match binary {
            OfficeBinary::LibreOffice => "libreoffice-filter",
            OfficeBinary::Soffice => "soffice-filter",
        };
        Self {
            binary,
            mode: OfficeMode::Filter,
            name,
        }
    }

    pub fn pdf_import(binary: OfficeBinary) -> Self {
        let name = match binary {
            OfficeBinary::LibreOffice => "libreoffice-pdf-import",
            OfficeBinary::Soffice => "soffice-pdf-import",
        };
        Self {
            binary,
            mode: OfficeMode::PdfImport,
            name,
        }
    }
}

#[async_trait]
impl Strategy for OfficeConvert {
    fn name(&self) -> &str {
        self.name
    }

    fn engine(&self) -> &str {
        self.binary.role()
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        ignore_page_range(ctx, self.name);
        let target = ctx.target;
        let (input, filter, infilter) = match self.mode {
            OfficeMode::Plain => (state.input.as_path(), None, None),
            OfficeMode::Filter => {
                let filter = target.export_filter(state.source).ok_or_else(|| {
                    AttemptError::Unsupported(format!("no named export filter for {target}"))
                })?;
                (state.input.as_path(), Some(filter), None)
            }
            OfficeMode::PdfImport => {
                let infilter = target.pdf_import_filter().ok_or_else(|| {
                    AttemptError::Unsupported(format!("no pdf import filter for {target}"))
                })?;
                (
                    state.require(Format::Pdf)?,
                    target.export_filter(Format::Pdf),
                    Some(infilter),
                )
            }
        };

        let inv = office_invocation(
            self.binary.program(ctx),
            ctx.workspace.root(),
            input,
            target,
            filter,
            infilter,
        );
        ctx.engines.runner.run(&inv, ctx.cancel).await?;
        Ok(Step::Produced)
    }
}

/// Convert the input to PDF with a nested generic chain and retain the PDF
/// for the strategies that follow.
#[derive(Debug, Clone, Copy)]
pub struct PdfBridge;

#[async_trait]
impl Strategy for PdfBridge {
    fn name(&self) -> &str {
        "pdf-bridge"
    }

    fn engine(&self) -> &str {
        "libreoffice"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let nested_ctx = ctx.retarget(Format::Pdf);
        let chain = generic_chain(state.source, Format::Pdf);
        let mut nested = ChainState::new(state.input.clone(), state.source);
        let run = pipeline::run_chain(&nested_ctx, &chain, &mut nested, &NoopObserver).await;

        state.nested_attempts.extend(
            run.attempts
                .into_iter()
                .map(|a| a.nested_under(self.name())),
        );

        match run.outcome {
            ChainOutcome::Produced(winner) => {
                info!("PDF bridge ready: {}", winner.artifact.file_name());
                state
                    .intermediates
                    .push((winner.artifact.path, Format::Pdf));
                Ok(Step::Bridged)
            }
            ChainOutcome::Cancelled => Err(AttemptError::Cancelled),
            ChainOutcome::Exhausted { last_error } => Err(AttemptError::BridgeFailed {
                format: Format::Pdf.to_string(),
                reason: last_error,
            }),
        }
    }
}

/// `pdftotext -table -csv`, then a spreadsheet import of the CSV.
#[derive(Debug, Clone, Copy)]
pub struct TableCsv;

#[async_trait]
impl Strategy for TableCsv {
    fn name(&self) -> &str {
        "table-csv"
    }

    fn engine(&self) -> &str {
        "pdftotext"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.require(Format::Pdf)?;
        let csv = ctx
            .workspace
            .path_for(&format!("{}-table.csv", ChainState::stem_of(input)));
        let extract = Invocation::new(&ctx.config.binaries.pdftotext)
            .args(["-table", "-csv"])
            .arg(input)
            .arg(&csv);
        ctx.engines.runner.run(&extract, ctx.cancel).await?;
        super::require_non_empty(&csv).await?;

        let import = office_invocation(
            &ctx.config.binaries.libreoffice,
            ctx.workspace.root(),
            &csv,
            ctx.target,
            ctx.target.export_filter(Format::Pdf),
            None,
        );
        ctx.engines.runner.run(&import, ctx.cancel).await?;
        Ok(Step::Produced)
    }
}

/// PDF → HTML with the office engine, then HTML → spreadsheet.
#[derive(Debug, Clone, Copy)]
pub struct HtmlBridge;

#[async_trait]
impl Strategy for HtmlBridge {
    fn name(&self) -> &str {
        "html-bridge"
    }

    fn engine(&self) -> &str {
        "libreoffice"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.require(Format::Pdf)?;
        let program = &ctx.config.binaries.libreoffice;
        let root = ctx.workspace.root();

        let mut before = ctx.workspace.snapshot().await?;
        before.extend(state.protected_names());
        let to_html = office_invocation(program, root, input, Format::Html, None, None);
        ctx.engines.runner.run(&to_html, ctx.cancel).await?;

        let html = artifact::resolve(root, Format::Html, &before)
            .await?
            .ok_or_else(|| AttemptError::ArtifactMissing {
                extension: Format::Html.to_string(),
            })?;
        debug!("HTML bridge produced {}", html.file_name());

        let to_sheet = office_invocation(
            program,
            root,
            &html.path,
            ctx.target,
            ctx.target.export_filter(Format::Html),
            None,
        );
        ctx.engines.runner.run(&to_sheet, ctx.cancel).await?;
        Ok(Step::Produced)
    }
}

/// Table extraction with tabula, when installed, then a CSV import.
#[derive(Debug, Clone, Copy)]
pub struct Tabula;

#[async_trait]
impl Strategy for Tabula {
    fn name(&self) -> &str {
        "tabula"
    }

    fn engine(&self) -> &str {
        "tabula"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let program = &ctx.config.binaries.tabula;
        if let Err(e) = ctx.engines.runner.probe(program).await {
            return Err(AttemptError::Unsupported(format!(
                "tabula not installed: {e}"
            )));
        }

        let input = state.require(Format::Pdf)?;
        let csv = ctx
            .workspace
            .path_for(&format!("{}-tabula.csv", ChainState::stem_of(input)));
        let extract = Invocation::new(program)
            .arg("-o")
            .arg(&csv)
            .args(["-p", "all"])
            .arg(input);
        ctx.engines.runner.run(&extract, ctx.cancel).await?;
        super::require_non_empty(&csv).await?;

        let import = office_invocation(
            &ctx.config.binaries.libreoffice,
            ctx.workspace.root(),
            &csv,
            ctx.target,
            None,
            None,
        );
        ctx.engines.runner.run(&import, ctx.cancel).await?;
        Ok(Step::Produced)
    }
}

/// The in-process converter.
#[derive(Debug, Clone, Copy)]
pub struct InProcess;

#[async_trait]
impl Strategy for InProcess {
    fn name(&self) -> &str {
        "in-process"
    }

    fn engine(&self) -> &str {
        "native"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        ignore_page_range(ctx, self.name());
        let out = ctx.output_path(&ChainState::stem_of(&state.input), "converted");
        ctx.engines
            .native
            .convert(
                &state.input,
                state.source,
                ctx.target,
                ctx.options.quality,
                &out,
            )
            .await?;
        Ok(Step::Produced)
    }
}

pub(crate) fn ignore_page_range(ctx: &AttemptContext<'_>, strategy: &str) {
    if let Some(range) = ctx.options.page_range {
        debug!("{} converts the whole document; ignoring page range {}", strategy, range);
    }
}
