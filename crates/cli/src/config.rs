//! `linkier.toml` parsing, defaults and environment overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backend::BackendConfig;
use marketplace::{BucketName, LinkierError};
use serde::Deserialize;
use tracing::debug;

pub const ENV_BACKEND_URL: &str = "LINKIER_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "LINKIER_ANON_KEY";

const DEFAULT_SNAPSHOT_PATH: &str = "linkier-data.json";

/// Which port implementations the CLI wires up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Rest,
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    pub kind: BackendKind,
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub storage_bucket: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: None,
            anon_key: None,
            storage_bucket: backend::config::DEFAULT_STORAGE_BUCKET.to_owned(),
            timeout_secs: backend::config::DEFAULT_TIMEOUT.as_secs(),
            max_retries: backend::config::DEFAULT_MAX_RETRIES,
        }
    }
}

impl fmt::Debug for BackendSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSection")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "<redacted>"))
            .field("storage_bucket", &self.storage_bucket)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemorySection {
    /// JSON snapshot the in-process backend is loaded from and saved to.
    pub snapshot_path: PathBuf,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    /// Overrides `<config dir>/linkier/session.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    /// OTLP/gRPC collector endpoint; tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
}

/// The whole configuration file. Every field has a default, so an empty or
/// missing file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub backend: BackendSection,
    pub memory: MemorySection,
    pub session: SessionSection,
    pub logging: LoggingSection,
    pub telemetry: TelemetrySection,
}

fn config_error(message: impl Into<String>) -> LinkierError {
    LinkierError::ConfigurationError {
        message: message.into(),
    }
}

impl CliConfig {
    /// Reads `path`, falling back to defaults when the file does not exist,
    /// then applies environment overrides.
    pub async fn load(path: &Path) -> Result<Self, LinkierError> {
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_toml(&text)
                .map_err(|err| config_error(format!("{}: {err}", path.display())))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Self::default()
            }
            Err(err) => {
                return Err(config_error(format!(
                    "failed to read '{}': {err}",
                    path.display()
                )))
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, LinkierError> {
        toml::from_str(text).map_err(|err| config_error(err.to_string()))
    }

    /// Applies `LINKIER_BACKEND_URL` and `LINKIER_ANON_KEY`; blank values are
    /// ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(url) = present(ENV_BACKEND_URL) {
            self.backend.url = Some(url);
        }
        if let Some(key) = present(ENV_ANON_KEY) {
            self.backend.anon_key = Some(key);
        }
    }

    pub fn image_bucket(&self) -> Result<BucketName, LinkierError> {
        BucketName::new(self.backend.storage_bucket.trim())
            .ok_or_else(|| config_error("backend.storage_bucket must not be empty"))
    }

    /// Connection settings for the hosted backend.
    pub fn backend_config(&self) -> Result<BackendConfig, LinkierError> {
        let url = self.backend.url.as_deref().ok_or_else(|| {
            config_error(format!(
                "backend.url is not set (or set {ENV_BACKEND_URL}); \
                 use backend.kind = \"memory\" to run offline"
            ))
        })?;
        let anon_key = self
            .backend
            .anon_key
            .as_deref()
            .ok_or_else(|| {
                config_error(format!("backend.anon_key is not set (or set {ENV_ANON_KEY})"))
            })?;
        if self.backend.timeout_secs == 0 {
            return Err(config_error("backend.timeout_secs must be positive"));
        }
        if self.backend.max_retries > backend::config::MAX_RETRIES_LIMIT {
            return Err(config_error(format!(
                "backend.max_retries must be at most {}",
                backend::config::MAX_RETRIES_LIMIT
            )));
        }
        Ok(BackendConfig::new(url, anon_key)?
            .with_storage_bucket(self.image_bucket()?)
            .with_timeout(Duration::from_secs(self.backend.timeout_secs))
            .with_max_retries(self.backend.max_retries))
    }

    /// Where the signed-in session is kept between invocations.
    pub fn session_path(&self) -> Result<PathBuf, LinkierError> {
        if let Some(path) = &self.session.path {
            return Ok(path.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join("linkier").join("session.json"))
            .ok_or_else(|| {
                config_error("no user configuration directory on this platform; set session.path")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = CliConfig::from_toml("").unwrap();
        assert_eq!(config.backend.kind, BackendKind::Rest);
        assert_eq!(config.backend.storage_bucket, "property-images");
        assert_eq!(config.backend.timeout_secs, 15);
        assert_eq!(config.backend.max_retries, 2);
        assert_eq!(config.memory.snapshot_path, PathBuf::from("linkier-data.json"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.telemetry.otlp_endpoint.is_none());
    }

    #[test]
    fn full_file_parses() {
        let config = CliConfig::from_toml(
            r#"
            [backend]
            kind = "rest"
            url = "https://project.example.co/"
            anon_key = "public-key"
            storage_bucket = "photos"
            timeout_secs = 5
            max_retries = 4

            [session]
            path = "/tmp/linkier-session.json"

            [logging]
            level = "debug,backend=trace"
            format = "json"

            [telemetry]
            otlp_endpoint = "http://localhost:4317"
            "#,
        )
        .unwrap();

        let backend = config.backend_config().unwrap();
        assert_eq!(backend.url, "https://project.example.co");
        assert_eq!(backend.storage_bucket.as_str(), "photos");
        assert_eq!(backend.timeout, Duration::from_secs(5));
        assert_eq!(backend.max_retries, 4);
        assert_eq!(
            config.session_path().unwrap(),
            PathBuf::from("/tmp/linkier-session.json")
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!format!("{:?}", config.backend).contains("public-key"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CliConfig::from_toml("[backend]\nurll = \"x\"").unwrap_err();
        assert!(matches!(err, LinkierError::ConfigurationError { .. }));
    }

    #[test]
    fn environment_overrides_the_file() {
        let mut config =
            CliConfig::from_toml("[backend]\nurl = \"https://file.example.co\"").unwrap();
        config.apply_env(|name| match name {
            ENV_BACKEND_URL => Some("https://env.example.co".into()),
            ENV_ANON_KEY => Some("env-key".into()),
            _ => None,
        });
        assert_eq!(config.backend.url.as_deref(), Some("https://env.example.co"));
        assert_eq!(config.backend.anon_key.as_deref(), Some("env-key"));

        config.apply_env(|_| Some("  ".into()));
        assert_eq!(config.backend.url.as_deref(), Some("https://env.example.co"));
    }

    #[test]
    fn missing_backend_settings_are_configuration_errors() {
        let config = CliConfig::default();
        let err = config.backend_config().unwrap_err();
        assert!(err.to_string().contains("backend.url"));

        let mut config = CliConfig::default();
        config.backend.url = Some("ftp://nope".into());
        config.backend.anon_key = Some("key".into());
        assert!(matches!(
            config.backend_config(),
            Err(LinkierError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn unbounded_retry_counts_are_rejected() {
        let mut config = CliConfig::default();
        config.backend.url = Some("https://abc.example.co".into());
        config.backend.anon_key = Some("key".into());
        config.backend.max_retries = 40;
        let err = config.backend_config().unwrap_err();
        assert!(err.to_string().contains("max_retries"));

        config.backend.max_retries = backend::config::MAX_RETRIES_LIMIT;
        assert!(config.backend_config().is_ok());
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join(format!("linkier-absent-{}.toml", std::process::id()));
        let config = CliConfig::load(&path).await.unwrap();
        assert_eq!(config.memory.snapshot_path, PathBuf::from(DEFAULT_SNAPSHOT_PATH));
    }
}
