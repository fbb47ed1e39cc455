use anyhow::{bail, Result};
use facecmp_core::ValidationLimits;
use facecmp_rekognition::{Credentials, RekognitionConfig};
use std::time::Duration;

/// Daemon configuration, loaded once from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0:8000).
    pub bind_addr: String,
    pub project_name: String,
    /// Prefix for versioned API routes (default: /api/v1).
    pub api_v1_str: String,
    /// Per-file upload limit in MiB.
    pub max_file_size_mb: u64,
    /// Upper bound on one provider call, retries included.
    pub provider_timeout_secs: u64,
    /// Whole-request body limit in MiB. Must exceed two files' worth.
    pub body_limit_mb: u64,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_session_token: Option<String>,
    pub aws_region: String,
    pub rekognition_endpoint: Option<String>,
    pub rekognition_max_attempts: u32,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; missing optional keys get defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| match get(key) {
            Some(v) => Ok(v),
            None => bail!("{key} must be set"),
        };

        let aws_region = match get("AWS_REGION_NAME").or_else(|| get("AWS_REGION")) {
            Some(r) => r,
            None => bail!("AWS_REGION_NAME (or AWS_REGION) must be set"),
        };

        let max_file_size_mb: u64 = parse_or(&get, "FACECMP_MAX_FILE_SIZE_MB", 5)?;
        let body_limit_mb: u64 = parse_or(&get, "FACECMP_BODY_LIMIT_MB", 32)?;
        if body_limit_mb < max_file_size_mb.saturating_mul(2) {
            bail!(
                "FACECMP_BODY_LIMIT_MB ({body_limit_mb}) must be at least twice \
                 FACECMP_MAX_FILE_SIZE_MB ({max_file_size_mb})"
            );
        }

        Ok(Self {
            bind_addr: get("FACECMP_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            project_name: get("FACECMP_PROJECT_NAME")
                .unwrap_or_else(|| "Face Comparison API".to_string()),
            api_v1_str: get("FACECMP_API_V1_STR")
                .map(|p| p.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "/api/v1".to_string()),
            max_file_size_mb,
            provider_timeout_secs: parse_or::<u64>(&get, "FACECMP_PROVIDER_TIMEOUT_SECS", 30)?.max(1),
            body_limit_mb,
            aws_access_key_id: required("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            aws_session_token: get("AWS_SESSION_TOKEN"),
            aws_region,
            rekognition_endpoint: get("REKOGNITION_ENDPOINT"),
            rekognition_max_attempts: parse_or::<u32>(&get, "REKOGNITION_MAX_ATTEMPTS", 3)?.max(1),
        })
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits::with_max_mb(self.max_file_size_mb)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn body_limit_bytes(&self) -> usize {
        usize::try_from(self.body_limit_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    pub fn rekognition_config(&self) -> RekognitionConfig {
        let mut credentials =
            Credentials::new(&self.aws_access_key_id, &self.aws_secret_access_key);
        if let Some(token) = &self.aws_session_token {
            credentials = credentials.with_session_token(token);
        }
        let mut config = RekognitionConfig::new(&self.aws_region, credentials);
        config.endpoint = self.rekognition_endpoint.clone();
        config.max_attempts = self.rekognition_max_attempts;
        config
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match get(key) {
        None => Ok(default),
        Some(v) => match v.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => bail!("{key}: cannot parse {v:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const CREDS: [(&str, &str); 3] = [
        ("AWS_ACCESS_KEY_ID", "AKID"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
        ("AWS_REGION_NAME", "eu-west-1"),
    ];

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(lookup(&CREDS)).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.api_v1_str, "/api/v1");
        assert_eq!(cfg.max_file_size_mb, 5);
        assert_eq!(cfg.validation_limits().max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.provider_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.rekognition_max_attempts, 3);
        assert!(cfg.aws_session_token.is_none());
    }

    #[test]
    fn test_missing_credentials_fail() {
        let err = Config::from_lookup(lookup(&[("AWS_REGION_NAME", "us-east-1")])).unwrap_err();
        assert!(err.to_string().contains("AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_missing_region_fails() {
        let err = Config::from_lookup(lookup(&CREDS[..2])).unwrap_err();
        assert!(err.to_string().contains("AWS_REGION_NAME"));
    }

    #[test]
    fn test_region_fallback() {
        let mut pairs = CREDS[..2].to_vec();
        pairs.push(("AWS_REGION", "ap-south-1"));
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.aws_region, "ap-south-1");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([
            ("FACECMP_MAX_FILE_SIZE_MB", "10"),
            ("FACECMP_API_V1_STR", "/v2/"),
            ("REKOGNITION_ENDPOINT", "http://localhost:4566/"),
            ("AWS_SESSION_TOKEN", "tok"),
        ]);
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.max_file_size_mb, 10);
        assert_eq!(cfg.api_v1_str, "/v2");
        let rk = cfg.rekognition_config();
        assert_eq!(rk.endpoint_url(), "http://localhost:4566/");
        assert_eq!(rk.credentials.session_token.as_deref(), Some("tok"));
        assert_eq!(rk.region, "eu-west-1");
    }

    #[test]
    fn test_unparsable_number_fails() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("FACECMP_MAX_FILE_SIZE_MB", "five"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_body_limit_must_cover_two_files() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([("FACECMP_MAX_FILE_SIZE_MB", "20"), ("FACECMP_BODY_LIMIT_MB", "32")]);
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
