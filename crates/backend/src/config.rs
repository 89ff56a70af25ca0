//! Connection settings for the hosted backend.

use std::fmt;
use std::time::Duration;

use marketplace::{BucketName, LinkierError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of re-attempts for idempotent reads.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Largest accepted `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Default bucket holding property images.
pub const DEFAULT_STORAGE_BUCKET: &str = "property-images";

/// Where the hosted backend lives and how to talk to it.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project base URL without a trailing slash, e.g. `https://abc.example.co`.
    pub url: String,
    /// Public (anonymous) API key sent with every request.
    pub anon_key: String,
    pub storage_bucket: BucketName,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("storage_bucket", &self.storage_bucket)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl BackendConfig {
    /// Validates `url` and `anon_key` and applies the defaults.
    pub fn new(url: impl AsRef<str>, anon_key: impl AsRef<str>) -> Result<Self, LinkierError> {
        let url = url.as_ref().trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(config_error("backend url is not set"));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(config_error(format!(
                "backend url '{url}' must start with http:// or https://"
            )));
        }
        let anon_key = anon_key.as_ref().trim();
        if anon_key.is_empty() {
            return Err(config_error("backend anon key is not set"));
        }
        Ok(Self {
            url: url.to_owned(),
            anon_key: anon_key.to_owned(),
            storage_bucket: BucketName::new(DEFAULT_STORAGE_BUCKET)
                .ok_or_else(|| config_error("default storage bucket is invalid"))?,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_storage_bucket(mut self, bucket: BucketName) -> Self {
        self.storage_bucket = bucket;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

fn config_error(message: impl Into<String>) -> LinkierError {
    LinkierError::ConfigurationError {
        message: message.into(),
    }
}
