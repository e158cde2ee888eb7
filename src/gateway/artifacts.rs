use anyhow::{Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Object store seam: blob upload plus time-limited download URLs.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;
    /// Presigned GET URL valid for `expires_secs` seconds. Does not verify
    /// that the object exists.
    async fn presigned_get_url(&self, bucket: &str, key: &str, expires_secs: u64)
        -> Result<String>;
}

/// S3-compatible artifact store (MinIO in the stock setup). Uploads go
/// through a presigned PUT so the request signing is one code path.
#[derive(Debug, Clone)]
pub struct S3ArtifactStore {
    http: reqwest::Client,
    endpoint: String,
    access_key: String,
    secret_key: String,
    secure: bool,
}

const REGION: &str = "us-east-1";

impl S3ArtifactStore {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str, secure: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build artifact store HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            secure,
        })
    }

    /// AWS Signature V4 query presigning with an unsigned payload and only
    /// the host header signed.
    fn presign(&self, method: &str, bucket: &str, key: &str, expires_secs: u64) -> String {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();
        let scope = format!("{datestamp}/{REGION}/s3/aws4_request");

        let canonical_uri = format!("/{}/{}", uri_encode(bucket, false), uri_encode(key, false));

        // Query parameters in sorted order, already encoded.
        let canonical_query = format!(
            "X-Amz-Algorithm=AWS4-HMAC-SHA256\
             &X-Amz-Credential={}\
             &X-Amz-Date={amz_date}\
             &X-Amz-Expires={expires_secs}\
             &X-Amz-SignedHeaders=host",
            uri_encode(&format!("{}/{scope}", self.access_key), true)
        );

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{canonical_query}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            self.endpoint
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let date_key = hmac(format!("AWS4{}", self.secret_key).as_bytes(), &datestamp);
        let region_key = hmac(&date_key, REGION);
        let service_key = hmac(&region_key, "s3");
        let signing_key = hmac(&service_key, "aws4_request");
        let signature = hex::encode(hmac(&signing_key, &string_to_sign));

        let scheme = if self.secure { "https" } else { "http" };
        format!(
            "{scheme}://{}{canonical_uri}?{canonical_query}&X-Amz-Signature={signature}",
            self.endpoint
        )
    }
}

fn hmac(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode per the SigV4 rules: unreserved characters pass through,
/// '/' passes through unless `encode_slash`.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[async_trait::async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let url = self.presign("PUT", bucket, key, 300);
        self.http
            .put(&url)
            .body(data)
            .send()
            .await
            .with_context(|| format!("Failed to upload {bucket}/{key}"))?
            .error_for_status()
            .with_context(|| format!("Artifact store rejected upload of {bucket}/{key}"))?;
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u64,
    ) -> Result<String> {
        Ok(self.presign("GET", bucket, key, expires_secs))
    }
}

/// In-memory artifact store for tests. Thread-safe via `RwLock`; not
/// suitable for production.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .read()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u64,
    ) -> Result<String> {
        Ok(format!("memory://{bucket}/{key}?expires={expires_secs}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("models", false), "models");
        assert_eq!(uri_encode("a b/c.bin", false), "a%20b/c.bin");
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
        assert_eq!(uri_encode("key~1_2-3", true), "key~1_2-3");
    }

    #[test]
    fn test_presigned_url_shape() {
        let store = S3ArtifactStore::new("minio:9000", "minioadmin", "minioadmin", false).unwrap();
        let url = store.presign("GET", "models", "m-1/model.pkl", 3600);
        assert!(url.starts_with("http://minio:9000/models/m-1/model.pkl?"));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains(&uri_encode("minioadmin/", true)));
    }

    #[test]
    fn test_presigned_url_scheme_follows_tls_flag() {
        let store = S3ArtifactStore::new("minio:9000", "ak", "sk", true).unwrap();
        let url = store.presign("GET", "results", "r.csv", 60);
        assert!(url.starts_with("https://"));
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryArtifactStore::new();
        store
            .upload("models", "m-1/f.bin", vec![1, 2, 3])
            .await
            .unwrap();
        assert!(store.contains("models", "m-1/f.bin"));
        let url = store.presigned_get_url("models", "m-1/f.bin", 3600).await.unwrap();
        assert_eq!(url, "memory://models/m-1/f.bin?expires=3600");
    }
}
