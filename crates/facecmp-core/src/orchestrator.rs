//! Comparison orchestrator: one bounded call to the provider per request.

use crate::error::PipelineError;
use crate::provider::FaceComparisonProvider;
use crate::types::{ComparisonRequest, ImagePayload, RawProviderResult};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues comparison calls against an injected provider.
///
/// Every failure, including a timeout or a panicking provider, comes back
/// as [`PipelineError::ExternalServiceFailure`].
#[derive(Clone)]
pub struct Comparer {
    provider: Arc<dyn FaceComparisonProvider>,
    timeout: Duration,
}

impl Comparer {
    pub fn new(provider: Arc<dyn FaceComparisonProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn compare(
        &self,
        source: ImagePayload,
        target: ImagePayload,
        threshold: f64,
    ) -> Result<RawProviderResult, PipelineError> {
        let request = ComparisonRequest {
            source,
            target,
            similarity_threshold: threshold,
        };
        let provider = Arc::clone(&self.provider);

        // Own task so a panic inside the provider is caught as a JoinError.
        let call = tokio::spawn(async move { provider.compare_faces(request).await });
        let abort = call.abort_handle();

        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(raw))) => return Ok(raw),
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(join_err)) if join_err.is_panic() => "provider call panicked".to_string(),
            Ok(Err(join_err)) => format!("provider call aborted: {join_err}"),
            Err(_) => {
                abort.abort();
                format!("provider call timed out after {}s", self.timeout.as_secs_f64())
            }
        };

        tracing::error!(error = %outcome, threshold, "face comparison provider failed");
        Err(PipelineError::ExternalServiceFailure(outcome))
    }
}
