use provider::ProviderError;
use thiserror::Error;

/// Failure of a single remote call after the retry policy gave up on it.
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("{operation} {target} failed: {source}")]
    Fatal {
        operation: &'static str,
        target: String,
        source: ProviderError,
    },

    #[error("{operation} {target} still throttled after {attempts} attempts: {source}")]
    Exhausted {
        operation: &'static str,
        target: String,
        attempts: u32,
        source: ProviderError,
    },
}

impl RetryError {
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            RetryError::Fatal { source, .. } | RetryError::Exhausted { source, .. } => source,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to list branches for repository {repository}: {source}")]
    BranchListing {
        repository: String,
        source: RetryError,
    },

    #[error("Failed to resolve branch {branch} in repository {repository}: {source}")]
    BranchResolution {
        repository: String,
        branch: String,
        source: RetryError,
    },

    #[error("Failed to get commit {commit_id} in repository {repository}: {source}")]
    CommitFetch {
        repository: String,
        commit_id: String,
        source: RetryError,
    },

    #[error("Parent cycle in repository {repository}: commit {commit_id} was already visited")]
    CycleDetected {
        repository: String,
        commit_id: String,
    },

    #[error("History of repository {repository} is longer than the depth limit of {limit} commits")]
    DepthExceeded { repository: String, limit: usize },

    #[error("Cannot walk repository {repository} from an empty commit id")]
    EmptyStartCommit { repository: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    /// Commit id the failure is attached to, when there is one.
    pub fn commit_id(&self) -> Option<&str> {
        match self {
            HistoryError::CommitFetch { commit_id, .. }
            | HistoryError::CycleDetected { commit_id, .. } => Some(commit_id.as_str()),
            _ => None,
        }
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;
