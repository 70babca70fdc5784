//! Startup configuration
//!
//! Values are validated once, before the server binds, and are immutable
//! afterwards. The server receives them by reference.

use thiserror::Error;
use url::Url;

use crate::path::clean;

/// Region used when the endpoint does not name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Errors detected while validating startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Bucket name cannot be empty, please provide '--bucket \"{{mybucket}}\"'")]
    EmptyBucket,

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Key prefix scoping the served tree, either `""` or `"segment/.../"`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketPath(String);

impl BucketPath {
    /// Normalize a user-supplied bucket path.
    ///
    /// One leading `/` is trimmed, the rest is lexically cleaned. The root
    /// collapses to `""`; everything else loses its leading `/` and gains a
    /// trailing one.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let cleaned = clean(trimmed);
        if cleaned == "." || cleaned == "/" {
            Self(String::new())
        } else {
            Self(format!("{}/", cleaned.trim_start_matches('/')))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for BucketPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the request handler needs besides the store
#[derive(Debug, Clone, Default)]
pub struct ServeConfig {
    pub bucket_path: BucketPath,
}

impl ServeConfig {
    pub fn new(bucket_path: &str) -> Self {
        Self {
            bucket_path: BucketPath::normalize(bucket_path),
        }
    }
}

/// Connection settings for the object store
#[derive(Clone)]
pub struct StoreConfig {
    pub endpoint: Url,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Address the bucket in the path rather than the host name
    pub path_style: bool,
}

impl StoreConfig {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(ConfigError::EmptyBucket);
        }

        let endpoint = parse_endpoint(endpoint)?;
        let host = endpoint.host_str().unwrap_or_default().to_ascii_lowercase();

        Ok(Self {
            region: region_from_host(&host).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            path_style: !is_aws_host(&host),
            endpoint,
            bucket: bucket.to_string(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        })
    }

    /// Whether requests should go out unsigned
    pub fn is_anonymous(&self) -> bool {
        self.access_key.is_empty() && self.secret_key.is_empty()
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .finish()
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

fn is_aws_host(host: &str) -> bool {
    aws_host_labels(host).is_some() || host == "amazonaws.com"
}

/// Labels in front of the AWS domain, for `.amazonaws.com` and the China
/// partition's `.amazonaws.com.cn`
fn aws_host_labels(host: &str) -> Option<Vec<&str>> {
    let rest = host
        .strip_suffix(".amazonaws.com")
        .or_else(|| host.strip_suffix(".amazonaws.com.cn"))?;
    Some(rest.split('.').collect())
}

/// Extract the region embedded in an AWS S3 host name.
///
/// Handles `s3.<region>`, `s3-<region>`, `s3.dualstack.<region>`, the FIPS
/// forms `s3-fips.<region>` and `s3-fips-<region>`, China endpoints under
/// `.amazonaws.com.cn`, and the virtual-hosted `<bucket>.s3.<region>`
/// form. Returns `None` for the global endpoint and for non-AWS hosts.
pub fn region_from_host(host: &str) -> Option<String> {
    let labels = aws_host_labels(host)?;

    // The service label is an exact `s3`/`s3-fips` anywhere, or a hyphenated
    // `s3-<region>` in first position. A bucket label may itself start with
    // `s3-`, so hyphenated labels are not searched for past the first one.
    let service = labels
        .iter()
        .position(|label| *label == "s3" || *label == "s3-fips")
        .or_else(|| labels.first().filter(|l| l.starts_with("s3-")).map(|_| 0))?;

    let hyphenated = labels[service]
        .strip_prefix("s3-fips-")
        .or_else(|| labels[service].strip_prefix("s3-"))
        .filter(|region| *region != "fips");
    if let Some(region) = hyphenated {
        return match region {
            "external-1" | "accelerate" => None,
            region => Some(region.to_string()),
        };
    }

    labels[service + 1..]
        .iter()
        .find(|label| **label != "dualstack")
        .map(|label| (*label).to_string())
}
