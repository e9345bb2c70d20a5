//! S3-compatible object storage signed with AWS SigV4 over plain `reqwest`.
//!
//! A custom `endpoint_url` (MinIO, LocalStack) switches to path-style
//! addressing: `{endpoint}/{bucket}/{key}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};

use super::BlobStore;
use crate::error::{PersistError, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Load from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and optionally
    /// `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| PersistError::Config("AWS_ACCESS_KEY_ID not set".into()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| PersistError::Config("AWS_SECRET_ACCESS_KEY not set".into()))?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

pub struct S3BlobStore {
    client: reqwest::Client,
    bucket: String,
    prefix: String,
    region: String,
    endpoint_url: Option<String>,
    credentials: AwsCredentials,
}

struct SignedRequest {
    url: String,
    headers: Vec<(String, String)>,
}

impl S3BlobStore {
    pub fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Option<String>,
        credentials: AwsCredentials,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            region: region.into(),
            endpoint_url,
            credentials,
        }
    }

    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    /// (scheme, host, canonical path) for an object
    fn locate(&self, key: &str) -> (String, String, String) {
        let encoded = self
            .object_key(key)
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/");

        match &self.endpoint_url {
            Some(endpoint) => {
                let scheme = if endpoint.starts_with("http://") { "http" } else { "https" };
                let host = endpoint
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/')
                    .to_string();
                (scheme.to_string(), host, format!("/{}/{}", self.bucket, encoded))
            }
            None => (
                "https".to_string(),
                format!("{}.s3.{}.amazonaws.com", self.bucket, self.region),
                format!("/{}", encoded),
            ),
        }
    }

    fn sign(&self, method: &str, key: &str, payload: &[u8], now: DateTime<Utc>) -> Result<SignedRequest> {
        let (scheme, host, canonical_uri) = self.locate(key);
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(payload);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method, canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.credentials.secret_access_key,
            &date_stamp,
            &self.region,
            "s3",
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.credentials.access_key_id, credential_scope, signed_headers, signature
        );

        // host is set by reqwest from the URL
        let mut request_headers: Vec<(String, String)> =
            headers.into_iter().filter(|(k, _)| k != "host").collect();
        request_headers.push(("authorization".to_string(), authorization));

        Ok(SignedRequest {
            url: format!("{}://{}{}", scheme, host, canonical_uri),
            headers: request_headers,
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let signed = self.sign("GET", key, b"", Utc::now())?;

        let mut request = self.client.get(&signed.url);
        for (name, value) in &signed.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| PersistError::Blob(format!("GET s3://{}/{}: {}", self.bucket, key, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| PersistError::Blob(e.to_string()))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(PersistError::Blob(format!(
                "S3 GetObject failed (HTTP {}) for key '{}'",
                status, key
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let signed = self.sign("PUT", key, &bytes, Utc::now())?;

        let mut request = self.client.put(&signed.url);
        for (name, value) in &signed.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(bytes)
            .send()
            .await
            .map_err(|e| PersistError::Blob(format!("PUT s3://{}/{}: {}", self.bucket, key, e)))?;

        if !response.status().is_success() {
            return Err(PersistError::Blob(format!(
                "S3 PutObject failed (HTTP {}) for key '{}'",
                response.status(),
                key
            )));
        }
        Ok(())
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| PersistError::Blob(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding of everything but unreserved characters
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
            session_token: None,
        }
    }

    #[test]
    fn test_signing_key_matches_aws_reference() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_virtual_hosted_url_with_prefix() {
        let store = S3BlobStore::new("notes", "/threadline/", "eu-west-1", None, credentials());
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let signed = store.sign("GET", "memory/threads/t 1.txt", b"", now).unwrap();

        assert_eq!(
            signed.url,
            "https://notes.s3.eu-west-1.amazonaws.com/threadline/memory/threads/t%201.txt"
        );
        assert!(signed.headers.iter().any(|(k, v)| k == "x-amz-date" && v == "20240501T120000Z"));
        let auth = &signed.headers.iter().find(|(k, _)| k == "authorization").unwrap().1;
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/eu-west-1/s3/aws4_request"
        ));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
    }

    #[test]
    fn test_custom_endpoint_uses_path_style() {
        let store = S3BlobStore::new(
            "notes",
            "",
            "us-east-1",
            Some("http://localhost:9000/".into()),
            credentials(),
        );
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let signed = store.sign("PUT", "memory/global.txt", b"hello", now).unwrap();

        assert_eq!(signed.url, "http://localhost:9000/notes/memory/global.txt");
        assert!(signed.headers.iter().all(|(k, _)| k != "host"));
    }
}
