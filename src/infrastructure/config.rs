//! TOML configuration for the wizard host.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_URL: &str = "ADMISSION_WIZARD_API_URL";
pub const ENV_DRAFT_DIR: &str = "ADMISSION_WIZARD_DRAFT_DIR";
pub const ENV_LOG_FILE: &str = "ADMISSION_WIZARD_LOG_FILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WizardConfig {
    pub api_base_url: String,
    pub draft_dir: PathBuf,
    pub log_file: PathBuf,
    pub request_timeout_secs: u64,
    /// Lets a deep link open any stage regardless of completion.
    pub deep_link_override: bool,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/".to_string(),
            draft_dir: PathBuf::from(".admission-wizard/drafts"),
            log_file: PathBuf::from(".admission-wizard/wizard.log"),
            request_timeout_secs: 30,
            deep_link_override: false,
        }
    }
}

impl WizardConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Applies `ADMISSION_WIZARD_*` overrides through `lookup`, usually
    /// `|name| std::env::var(name).ok()`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(dir) = lookup(ENV_DRAFT_DIR) {
            self.draft_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_LOG_FILE) {
            self.log_file = PathBuf::from(file);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".to_string()));
        }
        if self.draft_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("draft_dir must not be empty".to_string()));
        }
        Ok(())
    }
}
