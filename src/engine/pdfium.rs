//! In-process PDF access via pdfium: encryption probe, password check, text
//! layer and single-page rasterisation.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks for the duration of every call. Each operation binds a
//! fresh `Pdfium` inside `tokio::task::spawn_blocking` so tokio worker
//! threads never stall on rendering.

use super::{DocumentInfo, DocumentLibrary, RasterSpec};
use crate::error::LibraryError;
use crate::format::{Format, PageRange};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// pdfium-backed [`DocumentLibrary`].
#[derive(Debug, Clone, Default)]
pub struct PdfiumLibrary {
    /// Shared library file or the directory containing it. `None` binds to
    /// the system library.
    library_path: Option<PathBuf>,
}

impl PdfiumLibrary {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Load the pdfium bindings. Fails with [`LibraryError::Unavailable`]
    /// when the shared library cannot be found.
    pub fn bind(&self) -> Result<Pdfium, LibraryError> {
        let bindings = match &self.library_path {
            Some(p) if p.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
            }
            Some(p) => Pdfium::bind_to_library(p),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| LibraryError::Unavailable(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    async fn blocking<T, F>(&self, what: &'static str, f: F) -> Result<T, LibraryError>
    where
        T: Send + 'static,
        F: FnOnce(Pdfium) -> Result<T, LibraryError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this.bind()?))
            .await
            .map_err(|e| LibraryError::Failed(format!("{what} task panicked: {e}")))?
    }
}

/// Map a pdfium load error onto the password-aware [`LibraryError`] variants.
fn load_error(e: PdfiumError, password: Option<&str>) -> LibraryError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            LibraryError::WrongPassword
        } else {
            LibraryError::PasswordRequired
        }
    } else {
        LibraryError::Failed(err_str)
    }
}

fn open<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, LibraryError> {
    pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| load_error(e, password))
}

#[async_trait]
impl DocumentLibrary for PdfiumLibrary {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    async fn probe(&self) -> Result<String, LibraryError> {
        self.blocking("probe", |_pdfium| Ok("pdfium bindings loaded".to_string()))
            .await
    }

    async fn inspect(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<DocumentInfo, LibraryError> {
        let path = path.to_path_buf();
        let password = password.map(str::to_string);
        self.blocking("inspect", move |pdfium| {
            let document = open(&pdfium, &path, password.as_deref())?;
            let page_count = document.pages().len() as usize;
            debug!("PDF inspected: {} pages", page_count);
            Ok(DocumentInfo {
                page_count,
                encrypted: password.is_some(),
            })
        })
        .await
    }

    async fn extract_text(
        &self,
        path: &Path,
        pages: Option<PageRange>,
    ) -> Result<String, LibraryError> {
        let path = path.to_path_buf();
        self.blocking("text", move |pdfium| {
            let document = open(&pdfium, &path, None)?;
            let doc_pages = document.pages();
            let total = doc_pages.len() as usize;
            let indices = pages
                .unwrap_or(PageRange {
                    start: 1,
                    end: None,
                })
                .to_indices(total);

            let mut texts = Vec::with_capacity(indices.len());
            for idx in indices {
                let page = doc_pages
                    .get(idx as u16)
                    .map_err(|e| LibraryError::Failed(format!("page {}: {:?}", idx + 1, e)))?;
                let text = page
                    .text()
                    .map_err(|e| LibraryError::Failed(format!("page {}: {:?}", idx + 1, e)))?
                    .all();
                texts.push(text);
            }
            Ok(texts.join("\x0c"))
        })
        .await
    }

    async fn rasterize(
        &self,
        path: &Path,
        page_index: usize,
        spec: RasterSpec,
        out: &Path,
    ) -> Result<(), LibraryError> {
        let path = path.to_path_buf();
        let out = out.to_path_buf();
        self.blocking("rasterize", move |pdfium| {
            let document = open(&pdfium, &path, None)?;
            let pages = document.pages();
            let total = pages.len() as usize;
            if page_index >= total {
                warn!(
                    "Page {} out of range (total={})",
                    page_index + 1,
                    total
                );
                return Err(LibraryError::Failed(format!(
                    "page {} out of range, document has {} pages",
                    page_index + 1,
                    total
                )));
            }

            let render_config =
                PdfRenderConfig::new().scale_page_by_factor(spec.dpi as f32 / 72.0);
            let page = pages
                .get(page_index as u16)
                .map_err(|e| LibraryError::Failed(format!("{:?}", e)))?;
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| LibraryError::Failed(format!("{:?}", e)))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_index + 1,
                image.width(),
                image.height()
            );

            let encode_err = |e: image::ImageError| LibraryError::Failed(e.to_string());
            if spec.format.is_jpeg() {
                let file = File::create(&out).map_err(|e| LibraryError::Failed(e.to_string()))?;
                let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), spec.quality);
                encoder
                    .encode_image(&image.to_rgb8())
                    .map_err(encode_err)?;
            } else if spec.format == Format::Png {
                image
                    .save_with_format(&out, ImageFormat::Png)
                    .map_err(encode_err)?;
            } else {
                return Err(LibraryError::Failed(format!(
                    "cannot rasterise to {}",
                    spec.format
                )));
            }
            Ok(())
        })
        .await
    }
}
