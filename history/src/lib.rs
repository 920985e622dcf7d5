//! First-parent commit history for every branch of every repository.
//!
//! ```no_run
//! use history::{HistoryEngine, Retrier, RetryPolicy};
//! use provider::{ClientConfig, CodeCommitProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = CodeCommitProvider::new(ClientConfig::default().with_region("eu-west-1"))?;
//! let engine = HistoryEngine::new(&provider, Retrier::new(RetryPolicy::default()));
//!
//! let history = engine.branch_history("my-repo", "main").await?;
//! for record in history.iter() {
//!     println!("{} {}", record.commit_id, record.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod report;
pub mod retry;
pub mod walker;

pub use aggregate::{to_records, CommitRecord, TraversalResult};
pub use config::AppConfig;
pub use enumerate::{
    BranchReport, BranchResolution, HistoryEngine, RepositoryReport, TraversalOptions,
};
pub use error::{HistoryError, HistoryResult, RetryError};
pub use report::OutputFormat;
pub use retry::{RecordingSleeper, Retrier, RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use walker::CommitWalker;
