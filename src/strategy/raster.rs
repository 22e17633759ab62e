//! Raster output: image re-encoding and PDF page rasterisation.
//!
//! PDF rasterisers render a single page (the first page of the requested
//! range, page 1 by default) at [`RASTER_DPI`], mapping the request quality
//! onto JPEG quality.

use super::office::ignore_page_range;
use super::{AttemptContext, ChainState, Step, Strategy};
use crate::config::RASTER_DPI;
use crate::engine::{Invocation, RasterSpec};
use crate::error::AttemptError;
use crate::format::Format;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

fn page_output(ctx: &AttemptContext<'_>, input: &std::path::Path) -> (PathBuf, usize) {
    let page = ctx.raster_page();
    let out = ctx.output_path(&ChainState::stem_of(input), &format!("page{page}"));
    (out, page)
}

// ── Image sources ─────────────────────────────────────────────────────────

/// ImageMagick `convert in -quality Q out`.
#[derive(Debug, Clone, Copy)]
pub struct ImageMagickReencode;

#[async_trait]
impl Strategy for ImageMagickReencode {
    fn name(&self) -> &str {
        "imagemagick-reencode"
    }

    fn engine(&self) -> &str {
        "imagemagick"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        ignore_page_range(ctx, self.name());
        let out = ctx.output_path(&ChainState::stem_of(&state.input), "converted");
        let inv = Invocation::new(&ctx.config.binaries.imagemagick)
            .arg(&state.input)
            .arg("-quality")
            .arg(ctx.options.quality.to_string())
            .arg(&out);
        ctx.engines.runner.run(&inv, ctx.cancel).await?;
        Ok(Step::Produced)
    }
}

/// In-process re-encode through the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageReencode;

#[async_trait]
impl Strategy for ImageReencode {
    fn name(&self) -> &str {
        "image-reencode"
    }

    fn engine(&self) -> &str {
        "native"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.input.clone();
        let out = ctx.output_path(&ChainState::stem_of(&input), "reencoded");
        let target = ctx.target;
        let quality = ctx.options.quality;
        tokio::task::spawn_blocking(move || {
            crate::engine::native::reencode_image(&input, &out, target, quality)
        })
        .await
        .map_err(|e| AttemptError::Io(std::io::Error::other(format!("image task panicked: {e}"))))??;
        Ok(Step::Produced)
    }
}

/// Last resort: copy the source bytes unchanged under the target name.
#[derive(Debug, Clone, Copy)]
pub struct ByteCopy;

#[async_trait]
impl Strategy for ByteCopy {
    fn name(&self) -> &str {
        "byte-copy"
    }

    fn engine(&self) -> &str {
        "filesystem"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let out = ctx.output_path(&ChainState::stem_of(&state.input), "copy");
        tokio::fs::copy(&state.input, &out).await?;
        debug!("Copied source bytes to {}", out.display());
        Ok(Step::Produced)
    }
}

// ── PDF sources ───────────────────────────────────────────────────────────

/// poppler `pdftoppm`.
#[derive(Debug, Clone, Copy)]
pub struct Pdftoppm;

#[async_trait]
impl Strategy for Pdftoppm {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    fn engine(&self) -> &str {
        "pdftoppm"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.require(Format::Pdf)?;
        let (out, page) = page_output(ctx, input);
        // pdftoppm appends the extension itself.
        let prefix = out.with_extension("");

        let mut inv = Invocation::new(&ctx.config.binaries.pdftoppm);
        inv = if ctx.target.is_jpeg() {
            inv.arg("-jpeg")
        } else {
            inv.arg("-png")
        };
        inv = inv.arg("-r").arg(RASTER_DPI.to_string());
        if ctx.target.is_jpeg() {
            inv = inv
                .arg("-jpegopt")
                .arg(format!("quality={}", ctx.options.quality));
        }
        let page = page.to_string();
        let inv = inv
            .args(["-f", page.as_str(), "-l", page.as_str(), "-singlefile"])
            .arg(input)
            .arg(&prefix);
        ctx.engines.runner.run(&inv, ctx.cancel).await?;
        Ok(Step::Produced)
    }
}

/// Ghostscript. `fallback` selects the general-purpose binary name instead
/// of the platform one.
#[derive(Debug, Clone, Copy)]
pub struct Ghostscript {
    pub fallback: bool,
}

#[async_trait]
impl Strategy for Ghostscript {
    fn name(&self) -> &str {
        if self.fallback {
            "ghostscript"
        } else {
            "ghostscript-platform"
        }
    }

    fn engine(&self) -> &str {
        "ghostscript"
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.require(Format::Pdf)?;
        let (out, page) = page_output(ctx, input);
        let program = if self.fallback {
            &ctx.config.binaries.ghostscript_fallback
        } else {
            &ctx.config.binaries.ghostscript
        };
        let device = if ctx.target.is_jpeg() { "jpeg" } else { "png16m" };

        let mut inv = Invocation::new(program)
            .arg(format!("-sDEVICE={device}"))
            .args(["-dNOPAUSE", "-dBATCH", "-dSAFER"])
            .arg(format!("-r{RASTER_DPI}"));
        if ctx.target.is_jpeg() {
            inv = inv.arg(format!("-dJPEGQ={}", ctx.options.quality));
        }
        let mut output_flag = std::ffi::OsString::from("-sOutputFile=");
        output_flag.push(&out);
        let inv = inv
            .arg(format!("-dFirstPage={page}"))
            .arg(format!("-dLastPage={page}"))
            .arg(output_flag)
            .arg(input);
        ctx.engines.runner.run(&inv, ctx.cancel).await?;
        Ok(Step::Produced)
    }
}

/// In-process rendering through the document library.
#[derive(Debug, Clone, Copy)]
pub struct PdfiumRaster;

#[async_trait]
impl Strategy for PdfiumRaster {
    fn name(&self) -> &str {
        "pdfium-raster"
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
        let (out, page) = page_output(ctx, input);
        let index = page
            .checked_sub(1)
            .ok_or_else(|| AttemptError::Unsupported(format!("no page {page} to render")))?;
        let spec = RasterSpec {
            format: ctx.target,
            dpi: RASTER_DPI,
            quality: ctx.options.quality,
        };
        ctx.engines
            .library
            .rasterize(input, index, spec, &out)
            .await?;
        Ok(Step::Produced)
    }
}
