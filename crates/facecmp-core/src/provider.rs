//! The remote face-comparison capability.

use crate::types::{ComparisonRequest, RawProviderResult};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{code} (HTTP {status}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("undecodable provider response: {0}")]
    Decode(String),
}

/// Something that can compare the faces in two images.
///
/// Implementations own their transport, credentials and any retry policy.
/// They are shared across requests, so they must not hold per-request state.
#[async_trait]
pub trait FaceComparisonProvider: Send + Sync {
    async fn compare_faces(
        &self,
        request: ComparisonRequest,
    ) -> Result<RawProviderResult, ProviderError>;
}
