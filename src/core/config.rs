

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::batch::BatchConfig;
use super::error::{BulkOpsError, Result};

pub const ENV_PREFIX: &str = "BULKOPS";


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOpsConfig {

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub access_token: Option<String>,


    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub delay_between_batches_ms: u64,


    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,


    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,

    #[serde(default = "default_marker_max_age_secs")]
    pub interrupted_marker_max_age_secs: u64,
}

fn default_api_base_url() -> String { "http://localhost:8000/api/v1/".to_string() }
fn default_batch_size() -> usize { crate::DEFAULT_BATCH_SIZE }
fn default_request_timeout_secs() -> u64 { crate::DEFAULT_REQUEST_TIMEOUT_SECS }
fn default_marker_dir() -> PathBuf { std::env::temp_dir().join("bulkops") }
fn default_marker_max_age_secs() -> u64 { crate::DEFAULT_MARKER_MAX_AGE_SECS }

impl Default for BulkOpsConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            access_token: None,
            batch_size: default_batch_size(),
            delay_between_batches_ms: 0,
            request_timeout_secs: default_request_timeout_secs(),
            marker_dir: default_marker_dir(),
            interrupted_marker_max_age_secs: default_marker_max_age_secs(),
        }
    }
}

impl BulkOpsConfig {

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }


    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BulkOpsError::InvalidBatchSize(self.batch_size));
        }

        url::Url::parse(&self.api_base_url).map_err(|e| {
            BulkOpsError::Config(format!("invalid api_base_url '{}': {}", self.api_base_url, e))
        })?;

        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            delay_between_batches: Duration::from_millis(self.delay_between_batches_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn interrupted_marker_max_age(&self) -> Duration {
        Duration::from_secs(self.interrupted_marker_max_age_secs)
    }
}
