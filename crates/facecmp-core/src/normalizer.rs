//! Maps the provider's answer onto [`ComparisonResult`].

use crate::error::PipelineError;
use crate::types::{ComparisonResult, FaceMatch, RawProviderResult, ResponseMetadata};

/// Build the public result from a provider answer.
///
/// Matches keep provider order. The headline `similarity` is the first
/// match's similarity, not a maximum: the provider is trusted to list the
/// best match first. Missing match or unmatched-face lists count as empty;
/// any other missing field is a provider contract violation.
pub fn normalize(
    raw: RawProviderResult,
    source_name: &str,
    target_name: &str,
    threshold: f64,
) -> Result<ComparisonResult, PipelineError> {
    let source_confidence = raw
        .source_image_face
        .as_ref()
        .and_then(|f| f.confidence)
        .ok_or_else(|| missing("SourceImageFace.Confidence"))?;

    let face_matches = raw
        .face_matches
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, m)| -> Result<FaceMatch, PipelineError> {
            let similarity = m
                .similarity
                .ok_or_else(|| missing(&format!("FaceMatches[{i}].Similarity")))?;
            let confidence = m
                .face
                .and_then(|f| f.confidence)
                .ok_or_else(|| missing(&format!("FaceMatches[{i}].Face.Confidence")))?;
            Ok(FaceMatch {
                similarity,
                confidence,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let similarity = face_matches.first().map_or(0.0, |m| m.similarity);
    let unmatched_faces = raw.unmatched_faces.map_or(0, |u| u.len());

    let meta = raw
        .response_metadata
        .ok_or_else(|| missing("ResponseMetadata"))?;
    let metadata = ResponseMetadata {
        request_id: meta
            .request_id
            .ok_or_else(|| missing("ResponseMetadata.RequestId"))?,
        http_status_code: meta
            .http_status_code
            .ok_or_else(|| missing("ResponseMetadata.HTTPStatusCode"))?,
        retry_attempts: meta
            .retry_attempts
            .ok_or_else(|| missing("ResponseMetadata.RetryAttempts"))?,
    };

    Ok(ComparisonResult {
        source_confidence,
        source_image: source_name.to_string(),
        target_image: target_name.to_string(),
        similarity_threshold: threshold,
        similarity,
        face_matches,
        unmatched_faces,
        metadata,
    })
}

fn missing(field: &str) -> PipelineError {
    tracing::error!(field, "provider response missing required field");
    PipelineError::MalformedProviderResponse(field.to_string())
}
