//! Validate → compare → normalize, strictly in that order.

use crate::error::PipelineError;
use crate::normalizer::normalize;
use crate::orchestrator::Comparer;
use crate::types::ComparisonResult;
use crate::validator::{validate, UploadedFile, ValidationLimits};
use std::io::{Read, Seek};

/// The full per-request comparison flow.
///
/// Holds only read-only configuration and the shared provider handle, so
/// one instance serves every request.
#[derive(Clone)]
pub struct ComparisonPipeline {
    limits: ValidationLimits,
    comparer: Comparer,
}

impl ComparisonPipeline {
    pub fn new(limits: ValidationLimits, comparer: Comparer) -> Self {
        Self { limits, comparer }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Run one comparison. Both uploads are validated before the provider
    /// is contacted; any failure discards all work for the request.
    pub async fn run<S, T>(
        &self,
        mut source: UploadedFile<S>,
        mut target: UploadedFile<T>,
        threshold: f64,
    ) -> Result<ComparisonResult, PipelineError>
    where
        S: Read + Seek,
        T: Read + Seek,
    {
        if !threshold.is_finite() {
            return Err(PipelineError::InvalidRequest(
                "similarity_threshold must be a finite number".into(),
            ));
        }

        let source = validate(&mut source, &self.limits)?;
        let target = validate(&mut target, &self.limits)?;

        let source_name = source.filename.clone();
        let target_name = target.filename.clone();
        tracing::debug!(
            source = %source_name,
            source_bytes = source.len(),
            target = %target_name,
            target_bytes = target.len(),
            threshold,
            "comparing faces"
        );

        let raw = self.comparer.compare(source, target, threshold).await?;
        let result = normalize(raw, &source_name, &target_name, threshold)?;

        tracing::info!(
            source = %result.source_image,
            target = %result.target_image,
            similarity = result.similarity,
            matches = result.face_matches.len(),
            unmatched = result.unmatched_faces,
            request_id = %result.metadata.request_id,
            "face comparison complete"
        );
        Ok(result)
    }
}
