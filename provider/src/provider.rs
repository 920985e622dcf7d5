use crate::types::{Branch, CommitNode, Repository};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Throttled by provider: {message}")]
    Throttling { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("{code}: {message}")]
    Api { code: String, message: String },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl ProviderError {
    /// Rate-limit signals are the only errors worth retrying.
    pub fn is_throttling(&self) -> bool {
        matches!(self, ProviderError::Throttling { .. })
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// The four remote calls the history engine depends on.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn list_repositories(&self) -> ProviderResult<Vec<Repository>>;

    async fn list_branches(&self, repository: &str) -> ProviderResult<Vec<String>>;

    async fn get_branch(&self, repository: &str, branch: &str) -> ProviderResult<Branch>;

    async fn get_commit(&self, repository: &str, commit_id: &str) -> ProviderResult<CommitNode>;

    fn provider_name(&self) -> &'static str;
}
