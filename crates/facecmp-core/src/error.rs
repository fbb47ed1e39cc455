use thiserror::Error;

/// Detail returned for failures whose cause must not reach the caller.
pub const GENERIC_FAILURE_DETAIL: &str = "Image comparison failed";

/// Longest provider error summary echoed back to callers.
const MAX_SUMMARY_CHARS: usize = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("file too large (limit {max_mb}MB)")]
    PayloadTooLarge { max_mb: u64 },
    #[error("unsupported media type: {}", .content_type.as_deref().unwrap_or("<none>"))]
    UnsupportedMediaType { content_type: Option<String> },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("face comparison service failed: {0}")]
    ExternalServiceFailure(String),
    #[error("malformed provider response: missing {0}")]
    MalformedProviderResponse(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Coarse classification used when turning an error into a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller sent something we reject; never retried.
    ClientInput,
    /// The provider or the transport to it failed.
    ExternalService,
    Unexpected,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PayloadTooLarge { .. }
            | Self::UnsupportedMediaType { .. }
            | Self::InvalidRequest(_) => ErrorClass::ClientInput,
            Self::ExternalServiceFailure(_) | Self::MalformedProviderResponse(_) => {
                ErrorClass::ExternalService
            }
            Self::Unexpected(_) => ErrorClass::Unexpected,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PayloadTooLarge { .. } => 413,
            Self::UnsupportedMediaType { .. } => 415,
            Self::InvalidRequest(_) => 422,
            Self::ExternalServiceFailure(_)
            | Self::MalformedProviderResponse(_)
            | Self::Unexpected(_) => 500,
        }
    }

    /// Human-readable message safe to hand back to the caller.
    pub fn detail(&self) -> String {
        match self {
            Self::PayloadTooLarge { max_mb } => {
                format!("File too large. The maximum allowed size is {max_mb}MB.")
            }
            Self::UnsupportedMediaType { .. } => {
                "Only JPG, JPEG and PNG formats are allowed.".to_string()
            }
            Self::InvalidRequest(msg) => msg.clone(),
            Self::ExternalServiceFailure(msg) => {
                format!("Face comparison service error: {}", summarize(msg))
            }
            Self::MalformedProviderResponse(_) | Self::Unexpected(_) => {
                GENERIC_FAILURE_DETAIL.to_string()
            }
        }
    }
}

/// First line of `msg`, capped at [`MAX_SUMMARY_CHARS`] characters.
fn summarize(msg: &str) -> String {
    let line = msg.lines().next().unwrap_or("").trim();
    if line.chars().count() <= MAX_SUMMARY_CHARS {
        return line.to_string();
    }
    let mut out: String = line.chars().take(MAX_SUMMARY_CHARS).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PipelineError::PayloadTooLarge { max_mb: 5 }.status_code(), 413);
        assert_eq!(
            PipelineError::UnsupportedMediaType { content_type: None }.status_code(),
            415
        );
        assert_eq!(PipelineError::InvalidRequest("x".into()).status_code(), 422);
        assert_eq!(PipelineError::ExternalServiceFailure("x".into()).status_code(), 500);
        assert_eq!(PipelineError::MalformedProviderResponse("x".into()).status_code(), 500);
        assert_eq!(PipelineError::Unexpected("x".into()).status_code(), 500);
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(
            PipelineError::PayloadTooLarge { max_mb: 5 }.class(),
            ErrorClass::ClientInput
        );
        assert_eq!(
            PipelineError::ExternalServiceFailure("boom".into()).class(),
            ErrorClass::ExternalService
        );
        assert_eq!(PipelineError::Unexpected("boom".into()).class(), ErrorClass::Unexpected);
    }

    #[test]
    fn test_payload_too_large_detail_names_limit() {
        let detail = PipelineError::PayloadTooLarge { max_mb: 5 }.detail();
        assert_eq!(detail, "File too large. The maximum allowed size is 5MB.");
    }

    #[test]
    fn test_external_failure_detail_is_single_line() {
        let err = PipelineError::ExternalServiceFailure(
            "connection reset\n  at frame 1\n  at frame 2".into(),
        );
        let detail = err.detail();
        assert_eq!(detail, "Face comparison service error: connection reset");
        assert!(!detail.contains('\n'));
    }

    #[test]
    fn test_external_failure_detail_is_truncated() {
        let err = PipelineError::ExternalServiceFailure("x".repeat(1000));
        assert!(err.detail().chars().count() < 260);
    }

    #[test]
    fn test_unexpected_detail_hides_cause() {
        let err = PipelineError::Unexpected("secret internal state".into());
        assert_eq!(err.detail(), GENERIC_FAILURE_DETAIL);
        let err = PipelineError::MalformedProviderResponse("SourceImageFace".into());
        assert_eq!(err.detail(), GENERIC_FAILURE_DETAIL);
    }
}
