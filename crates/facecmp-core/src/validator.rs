//! Upload validation: size and declared content type only.
//!
//! Image bytes are never decoded here; a file that claims to be a PNG is
//! accepted as one.

use crate::error::PipelineError;
use crate::types::{ImagePayload, DEFAULT_SIMILARITY_THRESHOLD};
use bytes::Bytes;
use std::io::{Read, Seek, SeekFrom};

const BYTES_PER_MB: u64 = 1024 * 1024;
const DEFAULT_MAX_FILE_SIZE_MB: u64 = 5;
const DEFAULT_ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

/// Process-wide upload constraints, fixed at startup.
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    pub max_file_size_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl ValidationLimits {
    /// Limits with the default allow-list and a maximum of `max_mb` MiB.
    pub fn with_max_mb(max_mb: u64) -> Self {
        Self {
            max_file_size_bytes: max_mb.saturating_mul(BYTES_PER_MB),
            ..Self::default()
        }
    }

    /// The size limit in whole megabytes, as shown to callers.
    pub fn max_mb(&self) -> u64 {
        self.max_file_size_bytes / BYTES_PER_MB
    }

    fn allows(&self, content_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == content_type)
    }
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_MB * BYTES_PER_MB,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// An inbound upload as handed over by the HTTP layer.
pub struct UploadedFile<R> {
    pub filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub reader: R,
}

impl<R: Read + Seek> UploadedFile<R> {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, reader: R) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            reader,
        }
    }

    /// Total byte length. The read position is left at the start.
    fn measure_len(&mut self) -> std::io::Result<u64> {
        let len = self.reader.seek(SeekFrom::End(0));
        self.reader.seek(SeekFrom::Start(0))?;
        len
    }
}

/// Check an upload against `limits` and take its content.
///
/// Size is checked before content type. On success the whole stream is
/// read into the returned payload.
pub fn validate<R: Read + Seek>(
    file: &mut UploadedFile<R>,
    limits: &ValidationLimits,
) -> Result<ImagePayload, PipelineError> {
    let size = file
        .measure_len()
        .map_err(|e| PipelineError::Unexpected(format!("measuring {}: {e}", file.filename)))?;

    if size > limits.max_file_size_bytes {
        tracing::warn!(
            filename = %file.filename,
            size,
            limit = limits.max_file_size_bytes,
            "upload rejected: too large"
        );
        return Err(PipelineError::PayloadTooLarge {
            max_mb: limits.max_mb(),
        });
    }

    let content_type = match file.content_type.as_deref() {
        Some(ct) if limits.allows(ct) => ct.to_string(),
        other => {
            tracing::warn!(
                filename = %file.filename,
                content_type = ?other,
                "upload rejected: unsupported media type"
            );
            return Err(PipelineError::UnsupportedMediaType {
                content_type: other.map(str::to_string),
            });
        }
    };

    let mut buf = Vec::with_capacity(size as usize);
    file.reader
        .read_to_end(&mut buf)
        .map_err(|e| PipelineError::Unexpected(format!("reading {}: {e}", file.filename)))?;

    tracing::debug!(filename = %file.filename, size, %content_type, "upload validated");

    Ok(ImagePayload::new(
        file.filename.clone(),
        content_type,
        Bytes::from(buf),
    ))
}

/// Parse the optional `similarity_threshold` parameter.
///
/// Absent or blank means the default; anything that is not a finite number
/// is rejected.
pub fn parse_threshold(raw: Option<&str>) -> Result<f64, PipelineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_SIMILARITY_THRESHOLD);
    };
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PipelineError::InvalidRequest(format!(
            "similarity_threshold must be a finite number, got {raw:?}"
        ))),
    }
}
