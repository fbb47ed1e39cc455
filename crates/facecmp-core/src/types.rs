use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Similarity percentage used when the caller does not supply one.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 70.0;

/// A validated image upload, ready to be sent to the provider.
///
/// Normally produced by [`crate::validator::validate`] and moved into the
/// orchestrator, which consumes it. The content cannot be changed once built.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub filename: String,
    pub content_type: String,
    bytes: Bytes,
}

impl ImagePayload {
    pub fn new(filename: String, content_type: String, bytes: Bytes) -> Self {
        Self {
            filename,
            content_type,
            bytes,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Two validated images and the threshold the provider should apply.
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub source: ImagePayload,
    pub target: ImagePayload,
    /// Fractional confidence percentage (e.g. 70.0). Always finite.
    pub similarity_threshold: f64,
}

/// Provider answer as received, before any contract checks.
///
/// Every field is optional so that a provider omitting something is
/// representable; [`crate::normalizer::normalize`] decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawProviderResult {
    pub source_image_face: Option<RawSourceFace>,
    pub face_matches: Option<Vec<RawFaceMatch>>,
    pub unmatched_faces: Option<Vec<RawUnmatchedFace>>,
    /// Filled in by the provider client from the transport, not the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_metadata: Option<RawResponseMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawSourceFace {
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFaceMatch {
    pub similarity: Option<f64>,
    pub face: Option<RawFaceDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFaceDetail {
    pub confidence: Option<f64>,
}

/// A face found in the target image that did not clear the threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawUnmatchedFace {
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawResponseMetadata {
    pub request_id: Option<String>,
    #[serde(rename = "HTTPStatusCode")]
    pub http_status_code: Option<u16>,
    pub retry_attempts: Option<u32>,
}

/// One provider-reported match, reduced to the two scores callers see.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub similarity: f64,
    pub confidence: f64,
}

/// Provider call metadata, copied verbatim for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: String,
    pub http_status_code: u16,
    pub retry_attempts: u32,
}

/// Public comparison result returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub source_confidence: f64,
    pub source_image: String,
    pub target_image: String,
    pub similarity_threshold: f64,
    /// Similarity of the first provider match, or 0.0 when there is none.
    pub similarity: f64,
    /// Matches in provider order.
    pub face_matches: Vec<FaceMatch>,
    pub unmatched_faces: usize,
    pub metadata: ResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_result_deserializes_provider_field_names() {
        let raw: RawProviderResult = serde_json::from_value(serde_json::json!({
            "SourceImageFace": { "Confidence": 99.5 },
            "FaceMatches": [
                { "Similarity": 97.0, "Face": { "Confidence": 99.0 } }
            ],
            "UnmatchedFaces": [{ "Confidence": 88.0 }],
            "ResponseMetadata": {
                "RequestId": "req-1",
                "HTTPStatusCode": 200,
                "RetryAttempts": 0
            }
        }))
        .unwrap();

        assert_eq!(raw.source_image_face.unwrap().confidence, Some(99.5));
        let matches = raw.face_matches.unwrap();
        assert_eq!(matches[0].similarity, Some(97.0));
        assert_eq!(matches[0].face.as_ref().unwrap().confidence, Some(99.0));
        assert_eq!(raw.unmatched_faces.unwrap().len(), 1);
        let meta = raw.response_metadata.unwrap();
        assert_eq!(meta.request_id.as_deref(), Some("req-1"));
        assert_eq!(meta.http_status_code, Some(200));
    }

    #[test]
    fn test_raw_result_tolerates_missing_lists() {
        let raw: RawProviderResult =
            serde_json::from_str(r#"{"SourceImageFace":{"Confidence":90.0}}"#).unwrap();
        assert!(raw.face_matches.is_none());
        assert!(raw.unmatched_faces.is_none());
        assert!(raw.response_metadata.is_none());
    }

    #[test]
    fn test_comparison_result_wire_names() {
        let result = ComparisonResult {
            source_confidence: 99.0,
            source_image: "a.jpg".into(),
            target_image: "b.png".into(),
            similarity_threshold: 70.0,
            similarity: 0.0,
            face_matches: vec![],
            unmatched_faces: 2,
            metadata: ResponseMetadata {
                request_id: "r".into(),
                http_status_code: 200,
                retry_attempts: 1,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        for key in [
            "source_confidence",
            "source_image",
            "target_image",
            "similarity_threshold",
            "similarity",
            "face_matches",
            "unmatched_faces",
            "metadata",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["metadata"]["retry_attempts"], 1);
        assert_eq!(json["metadata"]["http_status_code"], 200);
    }
}
