//! Request normalisation: turn an uploaded file plus loosely-typed form
//! fields into a validated [`ConversionRequest`].
//!
//! Normalisation performs no I/O. Every decision is a pure function of its
//! inputs, so the same upload and fields always produce the same
//! accept/reject outcome. The only non-deterministic output is the
//! [`CorrelationId`].

use crate::error::ConvertError;
use crate::format::{Format, PageRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default quality for lossy output when the field is absent.
pub const DEFAULT_QUALITY: u8 = 90;

/// The uploaded source document.
#[derive(Clone)]
pub struct UploadedFile {
    /// Client-supplied file name, e.g. `"Quarterly Report.pdf"`.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, keeping its file name as the original name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ConvertError::InvalidOption {
                field: "file",
                reason: format!("cannot read '{}': {e}", path.display()),
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Raw form fields as they arrive from an upload form or CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionForm {
    pub input_format: Option<String>,
    pub output_format: Option<String>,
    pub ocr: Option<String>,
    pub quality: Option<String>,
    pub password: Option<String>,
    pub page_range: Option<String>,
}

/// Validated per-request options.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub ocr: bool,
    /// 1–100; mapped to JPEG quality by image strategies.
    pub quality: u8,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub page_range: Option<PageRange>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            ocr: false,
            quality: DEFAULT_QUALITY,
            password: None,
            page_range: None,
        }
    }
}

impl fmt::Debug for ConversionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOptions")
            .field("ocr", &self.ocr)
            .field("quality", &self.quality)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("page_range", &self.page_range)
            .finish()
    }
}

/// Unique identifier namespacing every file and log line of one request.
///
/// Millisecond timestamp followed by a random UUID, so ids sort by creation
/// time and never collide across concurrent requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self(format!("{millis:013}-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file: UploadedFile,
    pub source: Format,
    pub target: Format,
    pub options: ConversionOptions,
    pub correlation_id: CorrelationId,
}

impl ConversionRequest {
    /// Build a request from already-typed parts, applying the same checks as
    /// [`normalize`].
    pub fn new(
        file: UploadedFile,
        source: Option<Format>,
        target: Format,
        options: ConversionOptions,
    ) -> Result<Self, ConvertError> {
        validate_file(&file)?;
        let source = resolve_source(&file.name, source.map(|f| f.to_string()).as_deref())?;
        if !target.is_supported_output() {
            return Err(ConvertError::InvalidFormat {
                field: "output format",
                value: target.to_string(),
            });
        }
        if let Some(range) = options.page_range {
            range
                .validate()
                .map_err(|reason| ConvertError::InvalidOption {
                    field: "pageRange",
                    reason,
                })?;
        }
        let options = ConversionOptions {
            quality: options.quality.clamp(1, 100),
            password: options.password.filter(|p| !p.is_empty()),
            ..options
        };
        Ok(Self {
            file,
            source,
            target,
            options,
            correlation_id: CorrelationId::generate(),
        })
    }
}

/// Validate an upload and its form fields.
///
/// The source format comes from the file extension when that extension is a
/// supported input; otherwise from `form.input_format`.
pub fn normalize(file: UploadedFile, form: &ConversionForm) -> Result<ConversionRequest, ConvertError> {
    validate_file(&file)?;
    let source = resolve_source(&file.name, form.input_format.as_deref())?;
    let target = resolve_target(form.output_format.as_deref())?;

    let options = ConversionOptions {
        ocr: parse_flag(form.ocr.as_deref()),
        quality: parse_quality(form.quality.as_deref())?,
        password: form.password.clone().filter(|p| !p.is_empty()),
        page_range: form
            .page_range
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<PageRange>()
                    .map_err(|reason| ConvertError::InvalidOption {
                        field: "pageRange",
                        reason,
                    })
            })
            .transpose()?,
    };

    Ok(ConversionRequest {
        file,
        source,
        target,
        options,
        correlation_id: CorrelationId::generate(),
    })
}

fn validate_file(file: &UploadedFile) -> Result<(), ConvertError> {
    if file.name.trim().is_empty() {
        return Err(ConvertError::InvalidOption {
            field: "file",
            reason: "file name is empty".into(),
        });
    }
    if file.bytes.is_empty() {
        return Err(ConvertError::InvalidOption {
            field: "file",
            reason: format!("'{}' is empty", file.name),
        });
    }
    Ok(())
}

fn resolve_source(file_name: &str, explicit: Option<&str>) -> Result<Format, ConvertError> {
    if let Some(format) = Format::from_filename(file_name).filter(|f| f.is_supported_input()) {
        return Ok(format);
    }
    let value = explicit.unwrap_or_default();
    value
        .parse::<Format>()
        .ok()
        .filter(|f| f.is_supported_input())
        .ok_or_else(|| ConvertError::InvalidFormat {
            field: "input format",
            value: if value.is_empty() {
                file_name.to_string()
            } else {
                value.to_string()
            },
        })
}

fn resolve_target(value: Option<&str>) -> Result<Format, ConvertError> {
    let value = value.unwrap_or_default();
    value
        .parse::<Format>()
        .ok()
        .filter(|f| f.is_supported_output())
        .ok_or_else(|| ConvertError::InvalidFormat {
            field: "output format",
            value: value.to_string(),
        })
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1")
    )
}

fn parse_quality(value: Option<&str>) -> Result<u8, ConvertError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(DEFAULT_QUALITY);
    };
    let q: i64 = raw.parse().map_err(|_| ConvertError::InvalidOption {
        field: "quality",
        reason: format!("'{raw}' is not an integer"),
    })?;
    Ok(q.clamp(1, 100) as u8)
}
