use crate::error::ConfigError;
use crate::file::MAX_FILE_BYTES;
use crate::labels::LabelSet;
use serde::Deserialize;
use std::{path::Path, time::Duration};

/// Route and port served by the reference similarity service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/compute_similarity/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Deployment settings of an analysis client.
///
/// Every field is optional in the TOML file:
///
/// ```toml
/// endpoint = "http://models.internal:8000/compute_similarity/"
/// labels = ["red", "green", "blue"]
/// max_file_bytes = 5242880
/// request_timeout_secs = 30
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub endpoint: String,
    pub labels: LabelSet,
    pub max_file_bytes: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            labels: LabelSet::default(),
            max_file_bytes: MAX_FILE_BYTES,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint '{}' must be an http or https URL",
                self.endpoint
            )));
        }
        if self.labels.is_empty() {
            return Err(ConfigError::Invalid("labels must not be empty".into()));
        }
        if let Some(label) = self.labels.find_invalid() {
            return Err(ConfigError::Invalid(format!(
                "label '{label}' is blank or repeated"
            )));
        }
        if self.max_file_bytes == 0 || self.max_file_bytes > MAX_FILE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "max_file_bytes must be between 1 and {MAX_FILE_BYTES}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
