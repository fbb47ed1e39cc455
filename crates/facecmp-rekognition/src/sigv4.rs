//! AWS Signature Version 4 request signing.
//!
//! Only what a single-shot JSON POST needs: no query-string signing, no
//! chunked payloads, no presigned URLs.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Who signs, for which region and service, at what instant.
#[derive(Debug, Clone)]
pub struct SigningParams<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// Headers to attach to the outgoing request.
#[derive(Debug, Clone)]
pub struct Signature {
    pub amz_date: String,
    pub authorization: String,
    /// Lowercase hex of the final signature.
    pub signature: String,
}

/// Sign a request.
///
/// `headers` must contain `host` and every other header the server should
/// verify. `x-amz-date` (and `x-amz-security-token` when a session token is
/// present) are added to the signed set here; the caller sends them with
/// the values from the returned [`Signature`] and the params.
pub fn sign(
    params: &SigningParams<'_>,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    payload: &[u8],
) -> Signature {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();

    let mut signed: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), normalize_value(v)))
        .collect();
    signed.push(("x-amz-date".into(), amz_date.clone()));
    if let Some(token) = params.session_token {
        signed.push(("x-amz-security-token".into(), token.to_string()));
    }
    signed.sort();

    let signed_headers = signed
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = canonical_request(method, path, &signed, &signed_headers, &sha256_hex(payload));
    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);
    let to_sign = string_to_sign(&amz_date, &scope, &canonical);

    let key = signing_key(params.secret_access_key, &date, params.region, params.service);
    let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.access_key_id
    );

    Signature {
        amz_date,
        authorization,
        signature,
    }
}

/// Canonical request with an empty query string.
pub fn canonical_request(
    method: &str,
    path: &str,
    sorted_headers: &[(String, String)],
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let canonical_headers: String = sorted_headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();
    format!("{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}")
}

pub fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Trim and collapse internal runs of spaces.
fn normalize_value(v: &str) -> String {
    v.split_whitespace().collect::<Vec<_>>().join(" ")
}
