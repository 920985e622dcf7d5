//! Scripted in-memory provider
//!
//! Serves repositories, branches and commits from memory and can be told to
//! fail specific calls a fixed number of times. Used by tests and by the CLI's
//! offline fixture mode.
//!
//! ```
//! use provider::{Branch, CommitNode, InMemoryProvider, Operation, ProviderError};
//!
//! let provider = InMemoryProvider::new()
//!     .with_repository("R", "r-1")
//!     .with_branch("R", Branch::new("main", "C2"))
//!     .with_commit("R", CommitNode::new("C2", vec!["C1".to_string()], "second"))
//!     .with_commit("R", CommitNode::root("C1", "first"));
//!
//! provider.fail_next(
//!     Operation::GetCommit,
//!     "R",
//!     "C2",
//!     ProviderError::Throttling { message: "Rate exceeded".to_string() },
//! );
//! assert_eq!(provider.pending_failures(), 1);
//! ```

use crate::provider::{ProviderError, ProviderResult, SourceProvider};
use crate::types::{Branch, CommitNode, Repository};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

/// The remote calls a provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListRepositories,
    ListBranches,
    GetBranch,
    GetCommit,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListRepositories => "ListRepositories",
            Operation::ListBranches => "ListBranches",
            Operation::GetBranch => "GetBranch",
            Operation::GetCommit => "GetCommit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    repositories: Vec<FixtureRepository>,
}

#[derive(Debug, Deserialize)]
struct FixtureRepository {
    name: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    branches: Vec<Branch>,
    #[serde(default)]
    commits: Vec<CommitNode>,
}

#[derive(Default)]
pub struct InMemoryProvider {
    repositories: Vec<Repository>,
    branches: HashMap<String, Vec<Branch>>,
    commits: HashMap<String, HashMap<String, CommitNode>>,
    failures: Mutex<HashMap<CallKey, VecDeque<ProviderError>>>,
    calls: Mutex<Vec<CallKey>>,
}

/// `(operation, repository, target)` of one call.
pub type CallKey = (Operation, String, String);

fn call_key(operation: Operation, repository: &str, target: &str) -> CallKey {
    (operation, repository.to_string(), target.to_string())
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a provider from a JSON fixture of the form
    /// `{"repositories": [{"name", "id", "branches": [..], "commits": [..]}]}`.
    pub fn from_fixture_json(json: &str) -> ProviderResult<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;

        let mut provider = Self::new();
        for repo in fixture.repositories {
            provider = provider.with_repository(repo.name.clone(), repo.id);
            for branch in repo.branches {
                provider = provider.with_branch(&repo.name, branch);
            }
            for commit in repo.commits {
                provider = provider.with_commit(&repo.name, commit);
            }
        }
        Ok(provider)
    }

    pub fn with_repository(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        let name = name.into();
        self.branches.entry(name.clone()).or_default();
        self.commits.entry(name.clone()).or_default();
        self.repositories.push(Repository { name, id: id.into() });
        self
    }

    pub fn with_branch(mut self, repository: &str, branch: Branch) -> Self {
        self.branches
            .entry(repository.to_string())
            .or_default()
            .push(branch);
        self
    }

    pub fn with_commit(mut self, repository: &str, commit: CommitNode) -> Self {
        self.commits
            .entry(repository.to_string())
            .or_default()
            .insert(commit.id.clone(), commit);
        self
    }

    /// Queues an error for the next call of `operation` on `target` in
    /// `repository`.
    ///
    /// The repository is empty for `ListRepositories`. The target is the
    /// branch name for `GetBranch`, the commit id for `GetCommit` and empty
    /// otherwise. Queued errors are returned in order, one per call, before
    /// normal service resumes.
    pub fn fail_next(
        &self,
        operation: Operation,
        repository: &str,
        target: &str,
        error: ProviderError,
    ) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures
            .entry(call_key(operation, repository, target))
            .or_default()
            .push_back(error);
    }

    pub fn pending_failures(&self) -> usize {
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.values().map(VecDeque::len).sum()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<CallKey> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(op, _, _)| *op == operation)
            .count()
    }

    fn record(&self, operation: Operation, repository: &str, target: &str) -> ProviderResult<()> {
        debug!("in-memory {} {} {}", operation, repository, target);
        let key = call_key(operation, repository, target);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());

        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        match failures.get_mut(&key).and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn repository_exists(&self, repository: &str) -> ProviderResult<()> {
        if self.repositories.iter().any(|r| r.name == repository) {
            Ok(())
        } else {
            Err(ProviderError::NotFound {
                resource: format!("repository {}", repository),
            })
        }
    }
}

#[async_trait]
impl SourceProvider for InMemoryProvider {
    async fn list_repositories(&self) -> ProviderResult<Vec<Repository>> {
        self.record(Operation::ListRepositories, "", "")?;
        Ok(self.repositories.clone())
    }

    async fn list_branches(&self, repository: &str) -> ProviderResult<Vec<String>> {
        self.record(Operation::ListBranches, repository, "")?;
        self.repository_exists(repository)?;
        Ok(self
            .branches
            .get(repository)
            .map(|branches| branches.iter().map(|b| b.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_branch(&self, repository: &str, branch: &str) -> ProviderResult<Branch> {
        self.record(Operation::GetBranch, repository, branch)?;
        self.repository_exists(repository)?;
        self.branches
            .get(repository)
            .and_then(|branches| branches.iter().find(|b| b.name == branch))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                resource: format!("branch {} in {}", branch, repository),
            })
    }

    async fn get_commit(&self, repository: &str, commit_id: &str) -> ProviderResult<CommitNode> {
        self.record(Operation::GetCommit, repository, commit_id)?;
        self.repository_exists(repository)?;
        self.commits
            .get(repository)
            .and_then(|commits| commits.get(commit_id))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                resource: format!("commit {} in {}", commit_id, repository),
            })
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
