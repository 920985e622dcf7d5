use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    pub region: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: regional_endpoint(DEFAULT_REGION),
            region: DEFAULT_REGION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Public CodeCommit endpoint for a region.
pub fn regional_endpoint(region: &str) -> String {
    format!("https://codecommit.{}.amazonaws.com", region)
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the region and points the endpoint at that region's public service.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self.endpoint = regional_endpoint(&self.region);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err("Endpoint must start with http:// or https://".to_string());
        }

        if self.region.is_empty() {
            return Err("Region cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
