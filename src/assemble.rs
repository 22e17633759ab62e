//! Result assembly: promote the winning artifact and describe the outcome.
//!
//! Promotion copies the artifact out of the workspace into durable output
//! storage under `{correlation_id}-output.{ext}`. The copy goes to a `.tmp`
//! sibling first and is renamed into place, so readers never observe a
//! partial file.

use crate::artifact::Artifact;
use crate::error::{ConvertError, ErrorKind};
use crate::format::Format;
use crate::pipeline::ConversionAttempt;
use crate::request::CorrelationId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Whether the artifact carries real content or a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Degraded,
}

/// The response descriptor of a completed conversion. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub success: bool,
    pub status: ConversionStatus,
    /// Name of the promoted file inside the output directory.
    pub file_name: String,
    pub output_path: PathBuf,
    /// Retrieval reference: the configured URL base plus `file_name`.
    pub file_url: String,
    pub original_name: String,
    pub source_format: Format,
    pub target_format: Format,
    /// Strategy that produced the artifact.
    pub strategy: String,
    pub correlation_id: CorrelationId,
    pub attempts: Vec<ConversionAttempt>,
}

/// The single failure body returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub success: bool,
    pub kind: ErrorKind,
    pub error: String,
}

impl From<&ConvertError> for FailureDescriptor {
    fn from(e: &ConvertError) -> Self {
        Self {
            success: false,
            kind: e.kind(),
            error: e.to_string(),
        }
    }
}

/// Output file name for a request.
pub fn output_file_name(id: &CorrelationId, target: Format) -> String {
    format!("{id}-output.{}", target.extension())
}

/// Copy `artifact` into `output_dir` atomically. Returns the final path.
pub async fn promote(
    artifact: &Artifact,
    output_dir: &Path,
    id: &CorrelationId,
    target: Format,
) -> Result<PathBuf, ConvertError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let path = output_dir.join(output_file_name(id, target));
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    match tokio::fs::copy(&artifact.path, &tmp_path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !artifact.path.exists() => {
            return Err(ConvertError::ArtifactMissing {
                extension: target.to_string(),
                path: artifact.path.clone(),
            });
        }
        Err(e) => {
            return Err(ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })
        }
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(ConvertError::OutputWriteFailed { path, source: e });
    }

    info!("Promoted {} → {}", artifact.file_name(), path.display());
    Ok(path)
}

/// Everything [`build_result`] needs besides the promoted path.
#[derive(Debug)]
pub struct ResultParts<'a> {
    pub id: &'a CorrelationId,
    pub original_name: &'a str,
    pub source: Format,
    pub target: Format,
    pub strategy: String,
    pub degraded: bool,
    pub attempts: Vec<ConversionAttempt>,
    pub file_url_base: &'a str,
}

pub fn build_result(output_path: PathBuf, parts: ResultParts<'_>) -> ConversionResult {
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| output_file_name(parts.id, parts.target));
    ConversionResult {
        success: true,
        status: if parts.degraded {
            ConversionStatus::Degraded
        } else {
            ConversionStatus::Success
        },
        file_url: format!("{}{}", parts.file_url_base, file_name),
        file_name,
        output_path,
        original_name: parts.original_name.to_string(),
        source_format: parts.source,
        target_format: parts.target,
        strategy: parts.strategy,
        correlation_id: parts.id.clone(),
        attempts: parts.attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(path: PathBuf) -> Artifact {
        Artifact { path, size: 4 }
    }

    #[tokio::test]
    async fn promote_writes_named_output_without_tmp() {
        let ws = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let src = ws.path().join("a.pdf");
        std::fs::write(&src, b"%PDF").unwrap();
        let id = CorrelationId::generate();

        let path = promote(&artifact(src), &out.path().join("nested"), &id, Format::Pdf)
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("{id}-output.pdf")
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn vanished_artifact_is_missing() {
        let out = tempfile::tempdir().unwrap();
        let err = promote(
            &artifact(out.path().join("gone.xlsx")),
            out.path(),
            &CorrelationId::generate(),
            Format::Xlsx,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactMissing);
    }

    #[test]
    fn result_serialises_camel_case() {
        let id = CorrelationId::generate();
        let result = build_result(
            PathBuf::from(format!("/out/{id}-output.xlsx")),
            ResultParts {
                id: &id,
                original_name: "report.pdf",
                source: Format::Pdf,
                target: Format::Xlsx,
                strategy: "spreadsheet-placeholder".into(),
                degraded: true,
                attempts: Vec::new(),
                file_url_base: "/api/file?folder=conversions&filename=",
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["originalName"], "report.pdf");
        assert_eq!(json["targetFormat"], "xlsx");
        assert!(json["fileUrl"]
            .as_str()
            .unwrap()
            .ends_with(&format!("{id}-output.xlsx")));
    }

    #[test]
    fn failure_descriptor_from_error() {
        let e = ConvertError::InvalidFormat {
            field: "input format",
            value: "xyz".into(),
        };
        let d = FailureDescriptor::from(&e);
        assert!(!d.success);
        assert_eq!(d.kind, ErrorKind::InvalidFormat);
        assert!(d.error.contains("xyz"));
    }
}
