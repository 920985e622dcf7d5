use crate::error::{HistoryError, HistoryResult};
use crate::retry::Retrier;
use provider::{CommitNode, SourceProvider};
use std::collections::HashSet;
use tracing::{debug, info};

/// Walks a branch's first-parent chain from a starting commit to the root.
///
/// Every commit costs exactly one `GetCommit` round trip; nothing is cached
/// between walks. The walk stops when a commit without parents has been
/// recorded, and fails as a whole if any fetch fails.
pub struct CommitWalker<'a> {
    provider: &'a dyn SourceProvider,
    retrier: &'a Retrier,
    max_depth: Option<usize>,
}

impl<'a> CommitWalker<'a> {
    pub fn new(provider: &'a dyn SourceProvider, retrier: &'a Retrier) -> Self {
        Self {
            provider,
            retrier,
            max_depth: None,
        }
    }

    /// Refuses histories longer than `max_depth` commits.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the commits from `start_commit_id` to the root, newest first.
    pub async fn walk(
        &self,
        repository: &str,
        start_commit_id: &str,
    ) -> HistoryResult<Vec<CommitNode>> {
        if start_commit_id.is_empty() {
            return Err(HistoryError::EmptyStartCommit {
                repository: repository.to_string(),
            });
        }

        let provider = self.provider;
        let mut commits = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(start_commit_id.to_string());

        while let Some(commit_id) = cursor {
            if !visited.insert(commit_id.clone()) {
                return Err(HistoryError::CycleDetected {
                    repository: repository.to_string(),
                    commit_id,
                });
            }

            if let Some(limit) = self.max_depth {
                if commits.len() >= limit {
                    return Err(HistoryError::DepthExceeded {
                        repository: repository.to_string(),
                        limit,
                    });
                }
            }

            let id = commit_id.as_str();
            let commit = self
                .retrier
                .call("GetCommit", id, move || provider.get_commit(repository, id))
                .await
                .map_err(|source| HistoryError::CommitFetch {
                    repository: repository.to_string(),
                    commit_id: commit_id.clone(),
                    source,
                })?;

            debug!(
                "Fetched commit {} ({} parents)",
                commit.id,
                commit.parent_ids.len()
            );

            cursor = commit.first_parent().map(str::to_string);
            commits.push(commit);
        }

        info!(
            "Walked {} commits in {} from {}",
            commits.len(),
            repository,
            start_commit_id
        );
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{RecordingSleeper, RetryPolicy};
    use provider::{InMemoryProvider, Operation, ProviderError};
    use std::sync::Arc;
    use std::time::Duration;

    /// Linear chain C{n} -> ... -> C1 in repository "R".
    fn chain(n: usize) -> InMemoryProvider {
        let mut provider = InMemoryProvider::new().with_repository("R", "r-1");
        for i in 1..=n {
            let parents = if i == 1 {
                Vec::new()
            } else {
                vec![format!("C{}", i - 1)]
            };
            provider = provider.with_commit(
                "R",
                CommitNode::new(format!("C{}", i), parents, format!("commit {}", i)),
            );
        }
        provider
    }

    fn retrier() -> (Retrier, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        (
            Retrier::new(RetryPolicy::default()).with_sleeper(sleeper.clone()),
            sleeper,
        )
    }

    #[tokio::test]
    async fn test_walk_chains_of_various_lengths() {
        for n in [1usize, 2, 5, 40] {
            let provider = chain(n);
            let (retrier, _) = retrier();
            let walker = CommitWalker::new(&provider, &retrier);

            let commits = walker.walk("R", &format!("C{}", n)).await.unwrap();
            assert_eq!(commits.len(), n);
            assert_eq!(commits[0].id, format!("C{}", n));
            assert!(commits.last().unwrap().is_root());
            for pair in commits.windows(2) {
                assert_eq!(pair[0].first_parent(), Some(pair[1].id.as_str()));
            }
            assert_eq!(provider.call_count(Operation::GetCommit), n);
        }
    }

    #[tokio::test]
    async fn test_walk_follows_first_parent_only() {
        let provider = InMemoryProvider::new()
            .with_repository("R", "r-1")
            .with_commit(
                "R",
                CommitNode::new("M", vec!["C1".to_string(), "F1".to_string()], "merge"),
            )
            .with_commit("R", CommitNode::root("C1", "base"))
            .with_commit("R", CommitNode::root("F1", "feature"));
        let (retrier, _) = retrier();

        let commits = CommitWalker::new(&provider, &retrier)
            .walk("R", "M")
            .await
            .unwrap();
        let ids: Vec<&str> = commits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["M", "C1"]);
    }

    #[tokio::test]
    async fn test_empty_start_is_rejected() {
        let provider = chain(1);
        let (retrier, _) = retrier();
        let result = CommitWalker::new(&provider, &retrier).walk("R", "").await;
        assert!(matches!(result, Err(HistoryError::EmptyStartCommit { .. })));
        assert_eq!(provider.call_count(Operation::GetCommit), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_with_commit_id() {
        let provider = chain(3);
        provider.fail_next(
            Operation::GetCommit,
            "R",
            "C2",
            ProviderError::Authentication {
                message: "expired".to_string(),
            },
        );
        let (retrier, sleeper) = retrier();

        let err = CommitWalker::new(&provider, &retrier)
            .walk("R", "C3")
            .await
            .unwrap_err();
        assert_eq!(err.commit_id(), Some("C2"));
        assert!(matches!(err, HistoryError::CommitFetch { .. }));
        assert!(sleeper.delays().is_empty());
        assert_eq!(provider.call_count(Operation::GetCommit), 2);
    }

    #[tokio::test]
    async fn test_missing_parent_is_fetch_failure() {
        let provider = InMemoryProvider::new()
            .with_repository("R", "r-1")
            .with_commit("R", CommitNode::new("C2", vec!["gone".to_string()], "orphaned"));
        let (retrier, _) = retrier();

        let err = CommitWalker::new(&provider, &retrier)
            .walk("R", "C2")
            .await
            .unwrap_err();
        assert_eq!(err.commit_id(), Some("gone"));
    }

    #[tokio::test]
    async fn test_throttled_fetch_is_retried() {
        let provider = chain(2);
        for _ in 0..2 {
            provider.fail_next(
                Operation::GetCommit,
                "R",
                "C1",
                ProviderError::Throttling {
                    message: "Rate exceeded".to_string(),
                },
            );
        }
        let (retrier, sleeper) = retrier();

        let commits = CommitWalker::new(&provider, &retrier)
            .walk("R", "C2")
            .await
            .unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );
    }

    #[tokio::test]
    async fn test_cycle_is_detected() {
        let provider = InMemoryProvider::new()
            .with_repository("R", "r-1")
            .with_commit("R", CommitNode::new("A", vec!["B".to_string()], "a"))
            .with_commit("R", CommitNode::new("B", vec!["A".to_string()], "b"));
        let (retrier, _) = retrier();

        let err = CommitWalker::new(&provider, &retrier)
            .walk("R", "A")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HistoryError::CycleDetected { ref commit_id, .. } if commit_id == "A"
        ));
        assert_eq!(provider.call_count(Operation::GetCommit), 2);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let provider = chain(5);
        let (retrier, _) = retrier();
        let walker = CommitWalker::new(&provider, &retrier);

        let err = walker
            .with_max_depth(Some(3))
            .walk("R", "C5")
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::DepthExceeded { limit: 3, .. }));

        let exact = CommitWalker::new(&provider, &retrier)
            .with_max_depth(Some(5))
            .walk("R", "C5")
            .await
            .unwrap();
        assert_eq!(exact.len(), 5);
    }
}
