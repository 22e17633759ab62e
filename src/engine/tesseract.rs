//! OCR through the `tesseract` command-line engine.
//!
//! Tesseract has no resident process, so a worker is a thin handle binding
//! the runner to a language. The lifecycle contract is still honoured:
//! `terminate` is the point where a pooled or daemon-backed engine would
//! release its resources.

use super::{CommandRunner, Invocation, OcrEngine, OcrWorker};
use crate::cancel::CancelToken;
use crate::error::AttemptError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// [`OcrEngine`] that shells out to tesseract.
pub struct TesseractEngine {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl TesseractEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn create_worker(&self, language: &str) -> Result<Box<dyn OcrWorker>, AttemptError> {
        debug!("OCR worker created ({}, lang={})", self.binary, language);
        Ok(Box::new(TesseractWorker {
            runner: self.runner.clone(),
            binary: self.binary.clone(),
            language: language.to_string(),
        }))
    }
}

struct TesseractWorker {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    language: String,
}

#[async_trait]
impl OcrWorker for TesseractWorker {
    async fn recognize(&self, image: &Path, cancel: &CancelToken) -> Result<String, AttemptError> {
        let invocation = Invocation::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", self.language.as_str()]);
        let output = self.runner.run(&invocation, cancel).await?;
        Ok(output.stdout_lossy())
    }

    async fn terminate(self: Box<Self>) {
        debug!("OCR worker terminated ({})", self.binary);
    }
}
