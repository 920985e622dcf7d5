pub mod config;
#[cfg(feature = "codecommit")]
pub mod codecommit;
pub mod memory;
pub mod provider;
pub mod types;

pub use config::ClientConfig;
pub use memory::{CallKey, InMemoryProvider, Operation};
pub use provider::{ProviderError, ProviderResult, SourceProvider};
pub use types::{Branch, CommitAuthor, CommitNode, Repository};

#[cfg(feature = "codecommit")]
pub use codecommit::CodeCommitProvider;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::memory::*;
    pub use crate::provider::*;
    pub use crate::types::*;

    #[cfg(feature = "codecommit")]
    pub use crate::codecommit::*;
}
