//! `CompareFaces` over the Rekognition JSON protocol.

use crate::config::RekognitionConfig;
use crate::sigv4::{self, SigningParams};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use facecmp_core::types::{RawProviderResult, RawResponseMetadata};
use facecmp_core::{ComparisonRequest, FaceComparisonProvider, ProviderError};
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const SERVICE: &str = "rekognition";
const TARGET_COMPARE_FACES: &str = "RekognitionService.CompareFaces";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const REQUEST_ID_HEADER: &str = "x-amzn-requestid";
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Error codes worth another attempt regardless of HTTP status.
const RETRYABLE_CODES: [&str; 4] = [
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "TooManyRequestsException",
    "InternalServerError",
];

#[derive(Error, Debug)]
pub enum RekognitionError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CompareFacesBody {
    source_image: ImageBlob,
    target_image: ImageBlob,
    similarity_threshold: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImageBlob {
    /// Base64 of the raw image bytes.
    bytes: String,
}

/// `{"__type": "com.amazonaws...#InvalidParameterException", "message": "..."}`
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Rekognition client shared by all requests.
pub struct RekognitionClient {
    http: Client,
    config: RekognitionConfig,
    url: Url,
    host: String,
}

impl RekognitionClient {
    pub fn new(config: RekognitionConfig) -> Result<Self, RekognitionError> {
        if config.credentials.access_key_id.is_empty()
            || config.credentials.secret_access_key.is_empty()
        {
            return Err(RekognitionError::InvalidConfig("empty AWS credentials".into()));
        }
        if config.region.is_empty() {
            return Err(RekognitionError::InvalidConfig("empty AWS region".into()));
        }

        let endpoint = config.endpoint_url();
        let url = Url::parse(&endpoint)
            .map_err(|e| RekognitionError::InvalidConfig(format!("endpoint {endpoint}: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(RekognitionError::InvalidConfig(format!(
                    "endpoint {endpoint} has no host"
                )))
            }
        };

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        tracing::info!(
            region = %config.region,
            endpoint = %url,
            max_attempts = config.max_attempts,
            "Rekognition client configured"
        );

        Ok(Self {
            http,
            config,
            url,
            host,
        })
    }

    fn encode_body(request: &ComparisonRequest) -> Result<Vec<u8>, ProviderError> {
        let body = CompareFacesBody {
            source_image: ImageBlob {
                bytes: general_purpose::STANDARD.encode(request.source.bytes()),
            },
            target_image: ImageBlob {
                bytes: general_purpose::STANDARD.encode(request.target.bytes()),
            },
            similarity_threshold: request.similarity_threshold,
        };
        serde_json::to_vec(&body).map_err(|e| ProviderError::Decode(format!("encoding request: {e}")))
    }

    /// One signed POST. Returns status, request id and raw body.
    async fn send_once(
        &self,
        body: &[u8],
    ) -> Result<(StatusCode, Option<String>, Vec<u8>), reqwest::Error> {
        let creds = &self.config.credentials;
        let params = SigningParams {
            access_key_id: &creds.access_key_id,
            secret_access_key: &creds.secret_access_key,
            session_token: creds.session_token.as_deref(),
            region: &self.config.region,
            service: SERVICE,
            time: chrono::Utc::now(),
        };
        let signature = sigv4::sign(
            &params,
            "POST",
            self.url.path(),
            &[
                ("content-type", CONTENT_TYPE),
                ("host", self.host.as_str()),
                ("x-amz-target", TARGET_COMPARE_FACES),
            ],
            body,
        );

        let mut req = self
            .http
            .post(self.url.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", TARGET_COMPARE_FACES)
            .header("x-amz-date", &signature.amz_date)
            .header("authorization", &signature.authorization)
            .body(body.to_vec());
        if let Some(token) = &creds.session_token {
            req = req.header("x-amz-security-token", token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let request_id = header_request_id(resp.headers());
        let bytes = resp.bytes().await?;
        Ok((status, request_id, bytes.to_vec()))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_BACKOFF);
        let ceiling = exp.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

#[async_trait]
impl FaceComparisonProvider for RekognitionClient {
    async fn compare_faces(
        &self,
        request: ComparisonRequest,
    ) -> Result<RawProviderResult, ProviderError> {
        let body = Self::encode_body(&request)?;
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0u32;
        loop {
            let last = attempt + 1 >= max_attempts;

            let error = match self.send_once(&body).await {
                Ok((status, request_id, bytes)) if status.is_success() => {
                    let mut raw: RawProviderResult = serde_json::from_slice(&bytes)
                        .map_err(|e| ProviderError::Decode(e.to_string()))?;
                    raw.response_metadata = Some(RawResponseMetadata {
                        request_id,
                        http_status_code: Some(status.as_u16()),
                        retry_attempts: Some(attempt),
                    });
                    tracing::debug!(attempt, status = status.as_u16(), "CompareFaces succeeded");
                    return Ok(raw);
                }
                Ok((status, request_id, bytes)) => {
                    let parsed: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
                    let code = parsed
                        .error_type
                        .as_deref()
                        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
                        .unwrap_or_else(|| "UnknownError".to_string());
                    let retryable = is_retryable(status, &code);
                    tracing::warn!(
                        attempt,
                        status = status.as_u16(),
                        %code,
                        request_id = request_id.as_deref().unwrap_or("-"),
                        retryable,
                        "CompareFaces returned an error"
                    );
                    let err = ProviderError::Service {
                        status: status.as_u16(),
                        code,
                        message: parsed.message.unwrap_or_default(),
                    };
                    if !retryable {
                        return Err(err);
                    }
                    err
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "CompareFaces transport failure");
                    ProviderError::Transport(e.to_string())
                }
            };

            if last {
                return Err(error);
            }
            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }
}

/// The `x-amzn-RequestId` header, if present and non-empty.
fn header_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_retryable(status: StatusCode, code: &str) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || RETRYABLE_CODES.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError"));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE, "UnknownError"));
        assert!(is_retryable(StatusCode::BAD_REQUEST, "ThrottlingException"));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS, "UnknownError"));
        assert!(!is_retryable(StatusCode::BAD_REQUEST, "InvalidParameterException"));
        assert!(!is_retryable(StatusCode::FORBIDDEN, "AccessDeniedException"));
    }

    #[test]
    fn test_request_id_absent_or_blank_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_request_id(&headers), None);
        headers.insert(REQUEST_ID_HEADER, "".parse().unwrap());
        assert_eq!(header_request_id(&headers), None);
        headers.insert(REQUEST_ID_HEADER, "abc-123".parse().unwrap());
        assert_eq!(header_request_id(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_new_rejects_empty_credentials() {
        let cfg = RekognitionConfig::new("us-east-1", Credentials::new("", ""));
        assert!(matches!(
            RekognitionClient::new(cfg),
            Err(RekognitionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_host_keeps_explicit_port() {
        let mut cfg = RekognitionConfig::new("us-east-1", Credentials::new("a", "b"));
        cfg.endpoint = Some("http://127.0.0.1:9000/".into());
        let client = RekognitionClient::new(cfg).unwrap();
        assert_eq!(client.host, "127.0.0.1:9000");
    }

    #[test]
    fn test_backoff_is_capped() {
        let cfg = RekognitionConfig::new("us-east-1", Credentials::new("a", "b"));
        let client = RekognitionClient::new(cfg).unwrap();
        for attempt in [0, 1, 5, 31, 40] {
            assert!(client.backoff(attempt) <= MAX_BACKOFF);
        }
    }

    #[test]
    fn test_error_body_accepts_both_message_casings() {
        let lower: ErrorBody =
            serde_json::from_str(r#"{"__type":"a#B","message":"m1"}"#).unwrap();
        assert_eq!(lower.message.as_deref(), Some("m1"));
        let upper: ErrorBody = serde_json::from_str(r#"{"__type":"B","Message":"m2"}"#).unwrap();
        assert_eq!(upper.message.as_deref(), Some("m2"));
    }
}
