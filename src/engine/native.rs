//! Conversions that need no external engine.
//!
//! Covers the pairs that are cheap to do correctly in-process: identical
//! formats (copy), plain text ↔ HTML, and raster image re-encoding through
//! the `image` crate. Everything else is reported as unsupported so the
//! chain moves on to an office engine.

use super::InProcessConverter;
use crate::error::AttemptError;
use crate::format::Format;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

static SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap());
static BLOCK_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|table|pre)>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").unwrap());

/// Built-in [`InProcessConverter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConverter;

#[async_trait]
impl InProcessConverter for NativeConverter {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn convert(
        &self,
        input: &Path,
        source: Format,
        target: Format,
        quality: u8,
        out: &Path,
    ) -> Result<(), AttemptError> {
        if source == target || (source.is_jpeg() && target.is_jpeg()) {
            tokio::fs::copy(input, out).await?;
            return Ok(());
        }

        match (source, target) {
            (Format::Txt, Format::Html) => {
                let text = tokio::fs::read(input).await?;
                let title = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let html = text_to_html(&String::from_utf8_lossy(&text), &title);
                tokio::fs::write(out, html).await?;
                Ok(())
            }
            (Format::Html, Format::Txt) => {
                let html = tokio::fs::read(input).await?;
                let text = html_to_text(&String::from_utf8_lossy(&html));
                if text.trim().is_empty() {
                    return Err(AttemptError::EmptyOutput);
                }
                tokio::fs::write(out, text).await?;
                Ok(())
            }
            (s, t) if s.is_image() && t.is_image() => {
                let input = input.to_path_buf();
                let out = out.to_path_buf();
                tokio::task::spawn_blocking(move || reencode_image(&input, &out, t, quality))
                    .await
                    .map_err(|e| {
                        AttemptError::Io(std::io::Error::other(format!(
                            "image task panicked: {e}"
                        )))
                    })?
            }
            (s, t) => Err(AttemptError::Unsupported(format!(
                "no in-process conversion from {s} to {t}"
            ))),
        }
    }
}

/// Decode any supported raster and encode it as `target`.
pub fn reencode_image(
    input: &Path,
    out: &Path,
    target: Format,
    quality: u8,
) -> Result<(), AttemptError> {
    let img = image::open(input)
        .map_err(|e| AttemptError::Unsupported(format!("cannot decode image: {e}")))?;
    debug!(
        "Re-encoding {}x{} image as {} (quality {})",
        img.width(),
        img.height(),
        target,
        quality
    );
    let encode_err = |e: image::ImageError| AttemptError::Io(std::io::Error::other(e.to_string()));
    if target.is_jpeg() {
        let file = File::create(out)?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
        encoder.encode_image(&img.to_rgb8()).map_err(encode_err)?;
    } else if target == Format::Png {
        img.save_with_format(out, ImageFormat::Png)
            .map_err(encode_err)?;
    } else {
        return Err(AttemptError::Unsupported(format!("{target} is not an image")));
    }
    Ok(())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap plain text in a minimal standalone HTML document.
pub fn text_to_html(text: &str, title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<pre>{}</pre>\n</body>\n</html>\n",
        escape_html(title),
        escape_html(text)
    )
}

/// Strip markup, keeping block boundaries as line breaks.
pub fn html_to_text(html: &str) -> String {
    let s = SCRIPT_STYLE.replace_all(html, "");
    let s = BLOCK_BREAK.replace_all(&s, "\n");
    let s = TAG.replace_all(&s, "");
    let s = s
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    format!("{}\n", s.trim())
}
