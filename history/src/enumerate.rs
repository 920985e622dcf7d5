//! Repository and branch enumeration
//!
//! [`HistoryEngine`] drives the whole run: list repositories, list and
//! resolve each repository's branches, then walk every branch. Failures are
//! kept per repository and per branch so one bad branch never hides its
//! siblings.

use crate::aggregate::{to_records, TraversalResult};
use crate::error::{HistoryError, HistoryResult};
use crate::retry::Retrier;
use crate::walker::CommitWalker;
use futures::stream::{self, StreamExt};
use glob::Pattern;
use provider::{Branch, Repository, SourceProvider};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Branches walked at the same time within one repository
    pub concurrency: usize,
    /// Longest history accepted before a walk is aborted
    pub max_depth: Option<usize>,
    pub repository_filter: Option<Pattern>,
    pub branch_filter: Option<Pattern>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_depth: None,
            repository_filter: None,
            branch_filter: None,
        }
    }
}

impl TraversalOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_repository_filter(mut self, pattern: Pattern) -> Self {
        self.repository_filter = Some(pattern);
        self
    }

    pub fn with_branch_filter(mut self, pattern: Pattern) -> Self {
        self.branch_filter = Some(pattern);
        self
    }

    pub fn matches_repository(&self, name: &str) -> bool {
        self.repository_filter
            .as_ref()
            .map_or(true, |pattern| pattern.matches(name))
    }

    pub fn matches_branch(&self, name: &str) -> bool {
        self.branch_filter
            .as_ref()
            .map_or(true, |pattern| pattern.matches(name))
    }
}

/// Outcome of resolving one branch name to its head.
#[derive(Debug)]
pub struct BranchResolution {
    pub name: String,
    pub result: HistoryResult<Branch>,
}

#[derive(Debug)]
pub struct BranchReport {
    pub branch: String,
    pub head_commit_id: Option<String>,
    pub outcome: HistoryResult<TraversalResult>,
}

#[derive(Debug)]
pub struct RepositoryReport {
    pub repository: Repository,
    pub outcome: HistoryResult<Vec<BranchReport>>,
}

impl RepositoryReport {
    /// Number of branches whose traversal failed, plus one if the
    /// repository itself could not be enumerated.
    pub fn failure_count(&self) -> usize {
        match &self.outcome {
            Ok(branches) => branches.iter().filter(|b| b.outcome.is_err()).count(),
            Err(_) => 1,
        }
    }
}

pub struct HistoryEngine<'a> {
    provider: &'a dyn SourceProvider,
    retrier: Retrier,
    options: TraversalOptions,
}

impl<'a> HistoryEngine<'a> {
    pub fn new(provider: &'a dyn SourceProvider, retrier: Retrier) -> Self {
        Self {
            provider,
            retrier,
            options: TraversalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TraversalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TraversalOptions {
        &self.options
    }

    pub fn walker(&self) -> CommitWalker<'_> {
        CommitWalker::new(self.provider, &self.retrier).with_max_depth(self.options.max_depth)
    }

    /// Lists every repository visible to the provider's credentials.
    ///
    /// Not retried: a failure here means the run cannot start.
    pub async fn list_repositories(&self) -> HistoryResult<Vec<Repository>> {
        let repositories = self.provider.list_repositories().await?;
        info!(
            "Found {} repositories via {}",
            repositories.len(),
            self.provider.provider_name()
        );
        Ok(repositories)
    }

    pub async fn list_branch_names(&self, repository: &str) -> HistoryResult<Vec<String>> {
        let provider = self.provider;
        self.retrier
            .call("ListBranches", repository, move || {
                provider.list_branches(repository)
            })
            .await
            .map_err(|source| HistoryError::BranchListing {
                repository: repository.to_string(),
                source,
            })
    }

    pub async fn resolve_branch(&self, repository: &str, branch: &str) -> HistoryResult<Branch> {
        let provider = self.provider;
        self.retrier
            .call("GetBranch", branch, move || {
                provider.get_branch(repository, branch)
            })
            .await
            .map_err(|source| HistoryError::BranchResolution {
                repository: repository.to_string(),
                branch: branch.to_string(),
                source,
            })
    }

    /// Lists a repository's branches and resolves each to its head commit.
    ///
    /// A failure to list fails the call; a failure to resolve one branch is
    /// reported in that branch's entry only.
    pub async fn list_branches(&self, repository: &str) -> HistoryResult<Vec<BranchResolution>> {
        let names = self.list_branch_names(repository).await?;

        let mut resolutions = Vec::with_capacity(names.len());
        for name in names {
            let result = self.resolve_branch(repository, &name).await;
            if let Err(e) = &result {
                warn!("Skipping branch {} of {}: {}", name, repository, e);
            }
            resolutions.push(BranchResolution { name, result });
        }
        Ok(resolutions)
    }

    /// Walks a resolved branch. A branch without a head yields an empty result.
    pub async fn traverse_branch(
        &self,
        repository: &str,
        branch: &Branch,
    ) -> HistoryResult<TraversalResult> {
        let Some(head) = branch.head() else {
            debug!("Branch {} of {} has no commits", branch.name, repository);
            return Ok(TraversalResult::empty());
        };

        let commits = self.walker().walk(repository, head).await?;
        Ok(TraversalResult::from(to_records(&commits)))
    }

    /// Resolves `branch` and walks it.
    pub async fn branch_history(
        &self,
        repository: &str,
        branch: &str,
    ) -> HistoryResult<TraversalResult> {
        let resolved = self.resolve_branch(repository, branch).await?;
        self.traverse_branch(repository, &resolved).await
    }

    async fn branch_report(&self, repository: &str, name: String) -> BranchReport {
        let branch = match self.resolve_branch(repository, &name).await {
            Ok(branch) => branch,
            Err(e) => {
                warn!("Skipping branch {} of {}: {}", name, repository, e);
                return BranchReport {
                    branch: name,
                    head_commit_id: None,
                    outcome: Err(e),
                };
            }
        };

        let outcome = self.traverse_branch(repository, &branch).await;
        match &outcome {
            Ok(result) => info!(
                "Branch {} of {}: {} commits",
                branch.name,
                repository,
                result.len()
            ),
            Err(e) => warn!("Traversal of {} in {} failed: {}", branch.name, repository, e),
        }

        BranchReport {
            branch: name,
            head_commit_id: branch.head_commit_id,
            outcome,
        }
    }

    /// Walks every matching branch of one repository.
    ///
    /// Reports come back in branch listing order regardless of concurrency.
    pub async fn enumerate_repository(&self, repository: &str) -> HistoryResult<Vec<BranchReport>> {
        let names = self.list_branch_names(repository).await?;
        let selected: Vec<String> = names
            .into_iter()
            .filter(|name| self.options.matches_branch(name))
            .collect();

        debug!(
            "Walking {} branches of {} ({} at a time)",
            selected.len(),
            repository,
            self.options.concurrency
        );

        let reports = stream::iter(
            selected
                .into_iter()
                .map(|name| self.branch_report(repository, name)),
        )
        .buffered(self.options.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

        Ok(reports)
    }

    /// For each repository, for each branch, a traversal or the error that
    /// stopped it.
    ///
    /// Only a failure to list repositories fails the whole call.
    pub async fn enumerate_all(&self) -> HistoryResult<Vec<RepositoryReport>> {
        let repositories = self.list_repositories().await?;

        let mut reports = Vec::new();
        for repository in repositories {
            if !self.options.matches_repository(&repository.name) {
                debug!("Repository {} filtered out", repository.name);
                continue;
            }

            let outcome = self.enumerate_repository(&repository.name).await;
            if let Err(e) = &outcome {
                warn!("Skipping repository {}: {}", repository.name, e);
            }
            reports.push(RepositoryReport {
                repository,
                outcome,
            });
        }

        let failures: usize = reports.iter().map(RepositoryReport::failure_count).sum();
        info!(
            "Enumerated {} repositories ({} failures)",
            reports.len(),
            failures
        );
        Ok(reports)
    }
}
