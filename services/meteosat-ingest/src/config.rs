//! Service configuration.
//!
//! Built once at start-up (see `main.rs`) and handed to constructors; nothing
//! below this module reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use eumdac_client::{ClientConfig, Credentials, DEFAULT_API_URL};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Update interval must be at least one minute")]
    ZeroInterval,

    #[error("Catalog consumer key and secret must both be set")]
    MissingCredentials,

    #[error("State and output directories must differ: {0}")]
    SharedDirectory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Time between scheduled cycles
    pub update_interval: Duration,
    pub credentials: Credentials,
    /// Catalog base URL
    pub api_url: String,
    pub request_timeout: Duration,
    /// Directory holding `{source}.json`
    pub state_dir: PathBuf,
    /// Root of the exported rasters
    pub output_dir: PathBuf,
    /// Parent of per-run working areas; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    /// Decode/resample program
    pub resample_command: PathBuf,
    /// Clip and band export program
    pub gdal_translate: PathBuf,
}

impl IngestConfig {
    /// Configuration with defaults for everything but credentials and paths.
    pub fn new(credentials: Credentials, state_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            update_interval: Duration::from_secs(15 * 60),
            credentials,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(600),
            state_dir,
            output_dir,
            temp_dir: None,
            resample_command: PathBuf::from("msg-resample"),
            gdal_translate: PathBuf::from("gdal_translate"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval < Duration::from_secs(60) {
            return Err(ConfigError::ZeroInterval);
        }
        if self.credentials.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        if self.state_dir == self.output_dir {
            return Err(ConfigError::SharedDirectory(self.state_dir.clone()));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.api_url.clone(),
            credentials: self.credentials.clone(),
            request_timeout: self.request_timeout,
        }
    }
}
