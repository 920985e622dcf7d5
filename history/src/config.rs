//! Run configuration
//!
//! Settings come from an optional TOML file, overridden by command-line
//! flags. The environment (`AWS_REGION`, `COMMIT_TRAIL_ENDPOINT`) only fills
//! the region and endpoint when neither source set them.
//!
//! ```toml
//! [client]
//! region = "eu-west-1"
//! endpoint = "http://localhost:4566"
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 200
//!
//! [traversal]
//! concurrency = 4
//! max_depth = 100000
//!
//! [filters]
//! repositories = "service-*"
//! branches = "release/*"
//! ```

use crate::enumerate::TraversalOptions;
use crate::error::{HistoryError, HistoryResult};
use crate::retry::RetryPolicy;
use glob::Pattern;
use provider::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const REGION_ENV: &str = "AWS_REGION";
pub const ENDPOINT_ENV: &str = "COMMIT_TRAIL_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalSection {
    pub concurrency: usize,
    pub max_depth: Option<usize>,
}

impl Default for TraversalSection {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub repositories: Option<String>,
    pub branches: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientSection,
    pub retry: RetryPolicy,
    pub traversal: TraversalSection,
    pub filters: FilterSection,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> HistoryResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Fills region and endpoint from the environment when the file left them unset.
    pub fn apply_env(mut self) -> Self {
        if self.client.region.is_none() {
            self.client.region = std::env::var(REGION_ENV).ok().filter(|v| !v.is_empty());
        }
        if self.client.endpoint.is_none() {
            self.client.endpoint = std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty());
        }
        self
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config =
            ClientConfig::default().with_timeout(Duration::from_secs(self.client.timeout_secs));
        if let Some(region) = &self.client.region {
            config = config.with_region(region.clone());
        }
        if let Some(endpoint) = &self.client.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        config
    }

    pub fn traversal_options(&self) -> HistoryResult<TraversalOptions> {
        let mut options = TraversalOptions::default().with_concurrency(self.traversal.concurrency);
        options.max_depth = self.traversal.max_depth;

        if let Some(pattern) = &self.filters.repositories {
            options = options.with_repository_filter(compile_filter("repositories", pattern)?);
        }
        if let Some(pattern) = &self.filters.branches {
            options = options.with_branch_filter(compile_filter("branches", pattern)?);
        }
        Ok(options)
    }

    pub fn validate(&self) -> HistoryResult<()> {
        self.client_config()
            .validate()
            .and_then(|_| self.retry.validate())
            .map_err(|message| HistoryError::Config { message })?;

        if self.traversal.concurrency == 0 {
            return Err(HistoryError::Config {
                message: "Concurrency must be greater than 0".to_string(),
            });
        }

        if self.traversal.max_depth == Some(0) {
            return Err(HistoryError::Config {
                message: "Max depth must be greater than 0".to_string(),
            });
        }

        self.traversal_options().map(|_| ())
    }
}

fn compile_filter(field: &str, pattern: &str) -> HistoryResult<Pattern> {
    Pattern::new(pattern).map_err(|e| HistoryError::Config {
        message: format!("Invalid {} filter '{}': {}", field, pattern, e),
    })
}
