//! Plain-text extraction from PDFs: text layer first, OCR when asked.
//!
//! A text layer that yields only whitespace and form feeds (the usual result
//! for scanned documents) counts as a failed extraction.

use super::{AttemptContext, ChainState, Step, Strategy};
use crate::config::RASTER_DPI;
use crate::engine::{Invocation, OcrWorker, RasterSpec};
use crate::error::{AttemptError, ToolError};
use crate::format::{Format, PageRange};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Page separator in multi-page text output.
pub const PAGE_BREAK: &str = "\x0c";

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c == '\x0c')
}

/// poppler `pdftotext [-f P -l Q] in out`.
#[derive(Debug, Clone, Copy)]
pub struct Pdftotext;

#[async_trait]
impl Strategy for Pdftotext {
    fn name(&self) -> &str {
        "pdftotext"
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
        let out = ctx.output_path(&ChainState::stem_of(input), "text");

        let mut inv = Invocation::new(&ctx.config.binaries.pdftotext);
        if let Some(range) = ctx.options.page_range {
            inv = inv.arg("-f").arg(range.start.to_string());
            if let Some(end) = range.end {
                inv = inv.arg("-l").arg(end.to_string());
            }
        }
        let inv = inv.arg(input).arg(&out);
        ctx.engines.runner.run(&inv, ctx.cancel).await?;

        let text = match tokio::fs::read(&out).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AttemptError::ArtifactMissing {
                    extension: Format::Txt.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if is_blank(&String::from_utf8_lossy(&text)) {
            debug!("pdftotext found no text layer");
            return Err(AttemptError::EmptyOutput);
        }
        Ok(Step::Produced)
    }
}

/// Text layer through the document library.
#[derive(Debug, Clone, Copy)]
pub struct PdfiumText;

#[async_trait]
impl Strategy for PdfiumText {
    fn name(&self) -> &str {
        "pdfium-text"
    }

    fn engine(&self) -> &str {
        "pdfium"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.require(Format::Pdf)?;
        let text = ctx
            .engines
            .library
            .extract_text(input, ctx.options.page_range)
            .await?;
        if is_blank(&text) {
            return Err(AttemptError::EmptyOutput);
        }
        let out = ctx.output_path(&ChainState::stem_of(input), "text");
        tokio::fs::write(&out, text).await?;
        Ok(Step::Produced)
    }
}

/// Rasterise each page, recognise it, join the pages with form feeds.
#[derive(Debug, Clone, Copy)]
pub struct Ocr;

#[async_trait]
impl Strategy for Ocr {
    fn name(&self) -> &str {
        "ocr"
    }

    fn engine(&self) -> &str {
        "tesseract"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.require(Format::Pdf)?.to_path_buf();
        let stem = ChainState::stem_of(&input);
        let pages_dir = ctx.workspace.path_for(&format!("{stem}-ocr-pages"));
        tokio::fs::create_dir_all(&pages_dir).await?;

        let result = async {
            let pages = rasterize_for_ocr(ctx, &input, &pages_dir).await?;
            info!("OCR: recognising {} page(s)", pages.len());

            let worker = ctx
                .engines
                .ocr
                .create_worker(&ctx.config.ocr_language)
                .await?;
            let recognized = recognize_all(worker.as_ref(), &pages, ctx).await;
            worker.terminate().await;
            let text = recognized?;

            if is_blank(&text) {
                return Err(AttemptError::EmptyOutput);
            }
            tokio::fs::write(ctx.output_path(&stem, "ocr"), text).await?;
            Ok::<_, AttemptError>(Step::Produced)
        }
        .await;

        if let Err(e) = tokio::fs::remove_dir_all(&pages_dir).await {
            warn!("Failed to remove OCR page images {}: {}", pages_dir.display(), e);
        }
        result
    }
}

async fn recognize_all(
    worker: &dyn OcrWorker,
    pages: &[PathBuf],
    ctx: &AttemptContext<'_>,
) -> Result<String, AttemptError> {
    let mut texts = Vec::with_capacity(pages.len());
    for page in pages {
        if ctx.cancel.is_cancelled() {
            return Err(AttemptError::Cancelled);
        }
        let text = worker.recognize(page, ctx.cancel).await?;
        debug!("OCR page {}: {} chars", page.display(), text.len());
        texts.push(text.trim_end().to_string());
    }
    Ok(texts.join(PAGE_BREAK))
}

/// PNG page images for OCR: `pdftoppm` first, the document library when the
/// CLI is unavailable.
async fn rasterize_for_ocr(
    ctx: &AttemptContext<'_>,
    input: &Path,
    dir: &Path,
) -> Result<Vec<PathBuf>, AttemptError> {
    let mut inv = Invocation::new(&ctx.config.binaries.pdftoppm)
        .arg("-png")
        .arg("-r")
        .arg(RASTER_DPI.to_string());
    if let Some(range) = ctx.options.page_range {
        inv = inv.arg("-f").arg(range.start.to_string());
        if let Some(end) = range.end {
            inv = inv.arg("-l").arg(end.to_string());
        }
    }
    let inv = inv.arg(input).arg(dir.join("page"));

    match ctx.engines.runner.run(&inv, ctx.cancel).await {
        Ok(_) => {
            let pages = list_pages(dir).await?;
            if !pages.is_empty() {
                return Ok(pages);
            }
            warn!("pdftoppm produced no page images, trying {}", ctx.engines.library.name());
        }
        Err(ToolError::Cancelled { .. }) => return Err(AttemptError::Cancelled),
        Err(e) => warn!("pdftoppm failed for OCR: {}", e),
    }

    let info = ctx.engines.library.inspect(input, None).await?;
    let range = ctx.options.page_range.unwrap_or(PageRange {
        start: 1,
        end: None,
    });
    let spec = RasterSpec {
        format: Format::Png,
        dpi: RASTER_DPI,
        quality: 100,
    };
    let mut pages = Vec::new();
    for idx in range.to_indices(info.page_count) {
        let out = dir.join(format!("page-{}.png", idx + 1));
        ctx.engines.library.rasterize(input, idx, spec, &out).await?;
        pages.push(out);
    }
    if pages.is_empty() {
        return Err(AttemptError::EmptyOutput);
    }
    Ok(pages)
}

/// Page images in page order. pdftoppm names them `page-N.png`, zero-padded
/// to the width of the page count.
async fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            pages.push(path);
        }
    }
    pages.sort_by_key(|p| page_number(p));
    Ok(pages)
}

fn page_number(path: &Path) -> (usize, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = stem
        .rsplit('-')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX);
    (n, stem)
}
