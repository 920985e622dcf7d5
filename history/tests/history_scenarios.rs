//! End-to-end traversal scenarios against the in-memory provider.

use history::report::render_reports;
use history::{
    HistoryEngine, HistoryError, OutputFormat, RecordingSleeper, Retrier, RetryError,
    RetryPolicy, TraversalOptions,
};
use provider::{Branch, CommitNode, InMemoryProvider, Operation, ProviderError};
use std::sync::Arc;
use std::time::Duration;

const SAMPLE: &str = include_str!("fixtures/sample.json");

fn throttled() -> ProviderError {
    ProviderError::Throttling {
        message: "Rate exceeded".to_string(),
    }
}

/// Repository "R": "main" at C3 -> C2 -> C1, plus a headless "empty" branch.
fn scenario_provider() -> InMemoryProvider {
    InMemoryProvider::new()
        .with_repository("R", "r-1")
        .with_branch("R", Branch::new("main", "C3"))
        .with_branch("R", Branch::headless("empty"))
        .with_commit(
            "R",
            CommitNode::new("C3", vec!["C2".to_string()], "third").with_author("Ada", "3"),
        )
        .with_commit("R", CommitNode::new("C2", vec!["C1".to_string()], "second"))
        .with_commit("R", CommitNode::root("C1", "first").with_author("Grace", "1"))
}

fn recording_engine(
    provider: &InMemoryProvider,
    policy: RetryPolicy,
) -> (HistoryEngine<'_>, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::new());
    let retrier = Retrier::new(policy).with_sleeper(sleeper.clone());
    (HistoryEngine::new(provider, retrier), sleeper)
}

#[tokio::test]
async fn test_walk_returns_head_to_root() {
    let provider = scenario_provider();
    let (engine, sleeper) = recording_engine(&provider, RetryPolicy::default());

    let commits = engine.walker().walk("R", "C3").await.unwrap();
    let ids: Vec<&str> = commits.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["C3", "C2", "C1"]);
    assert!(commits[2].is_root());
    assert!(sleeper.delays().is_empty());

    let history = engine.branch_history("R", "main").await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.head().unwrap().commit_id, "C3");
    assert!(history.iter().all(|r| r.tags.is_empty()));
    assert_eq!(history.records[1].author, "");
    assert_eq!(history.records[2].author, "Grace");
}

#[tokio::test]
async fn test_empty_branch_does_not_abort_siblings() {
    let provider = scenario_provider();
    let (engine, _) = recording_engine(&provider, RetryPolicy::default());

    let reports = engine.enumerate_all().await.unwrap();
    assert_eq!(reports.len(), 1);

    let branches = reports[0].outcome.as_ref().unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0].branch, "main");
    assert_eq!(branches[0].outcome.as_ref().unwrap().len(), 3);
    assert_eq!(branches[1].branch, "empty");
    assert!(branches[1].outcome.as_ref().unwrap().is_empty());
    assert_eq!(branches[1].head_commit_id, None);
}

#[tokio::test]
async fn test_throttled_twice_then_succeeds() {
    let provider = scenario_provider();
    provider.fail_next(Operation::GetCommit, "R", "C3", throttled());
    provider.fail_next(Operation::GetCommit, "R", "C3", throttled());
    let (engine, sleeper) = recording_engine(&provider, RetryPolicy::new(3));

    let history = engine.branch_history("R", "main").await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(200), Duration::from_millis(400)]
    );
    assert_eq!(provider.call_count(Operation::GetCommit), 5);
}

#[tokio::test]
async fn test_throttling_exhaustion_fails_only_that_branch() {
    let provider = scenario_provider()
        .with_branch("R", Branch::new("hotfix", "C1"));
    for _ in 0..3 {
        provider.fail_next(Operation::GetCommit, "R", "C2", throttled());
    }
    let (engine, sleeper) = recording_engine(&provider, RetryPolicy::new(3));

    let reports = engine.enumerate_all().await.unwrap();
    let branches = reports[0].outcome.as_ref().unwrap();

    match &branches[0].outcome {
        Err(HistoryError::CommitFetch {
            repository,
            commit_id,
            source: RetryError::Exhausted { attempts, .. },
        }) => {
            assert_eq!(repository, "R");
            assert_eq!(commit_id, "C2");
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected exhausted commit fetch, got {:?}", other),
    }
    assert!(branches[1].outcome.as_ref().unwrap().is_empty());
    assert_eq!(branches[2].outcome.as_ref().unwrap().len(), 1);
    assert_eq!(reports[0].failure_count(), 1);
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(600)
        ]
    );
    assert_eq!(provider.pending_failures(), 0);
}

#[tokio::test]
async fn test_branch_resolution_failure_is_isolated() {
    let provider = scenario_provider();
    provider.fail_next(
        Operation::GetBranch,
        "R",
        "main",
        ProviderError::NotFound {
            resource: "branch main".to_string(),
        },
    );
    let (engine, _) = recording_engine(&provider, RetryPolicy::default());

    let reports = engine.enumerate_all().await.unwrap();
    let branches = reports[0].outcome.as_ref().unwrap();
    assert!(matches!(
        branches[0].outcome,
        Err(HistoryError::BranchResolution { ref branch, .. }) if branch == "main"
    ));
    assert!(branches[1].outcome.is_ok());
    assert_eq!(provider.call_count(Operation::GetCommit), 0);
}

#[tokio::test]
async fn test_concurrent_walks_keep_listing_order() {
    let mut provider = InMemoryProvider::new().with_repository("R", "r-1");
    for b in 0..6 {
        let depth = 6 - b;
        for i in 1..=depth {
            let parents = if i == 1 {
                Vec::new()
            } else {
                vec![format!("b{}-{}", b, i - 1)]
            };
            provider = provider.with_commit(
                "R",
                CommitNode::new(format!("b{}-{}", b, i), parents, "work"),
            );
        }
        provider = provider.with_branch(
            "R",
            Branch::new(format!("branch-{}", b), format!("b{}-{}", b, depth)),
        );
    }

    let sleeper = Arc::new(RecordingSleeper::new());
    let engine = HistoryEngine::new(
        &provider,
        Retrier::new(RetryPolicy::default()).with_sleeper(sleeper),
    )
    .with_options(TraversalOptions::default().with_concurrency(4));

    let reports = engine.enumerate_all().await.unwrap();
    let branches = reports[0].outcome.as_ref().unwrap();
    let names: Vec<&str> = branches.iter().map(|b| b.branch.as_str()).collect();
    assert_eq!(
        names,
        vec!["branch-0", "branch-1", "branch-2", "branch-3", "branch-4", "branch-5"]
    );
    for (b, report) in branches.iter().enumerate() {
        let history = report.outcome.as_ref().unwrap();
        assert_eq!(history.len(), 6 - b);
        assert_eq!(history.head().unwrap().commit_id, format!("b{}-{}", b, 6 - b));
    }
}

#[tokio::test]
async fn test_fixture_run_end_to_end() {
    let provider = InMemoryProvider::from_fixture_json(SAMPLE).unwrap();
    let (engine, _) = recording_engine(&provider, RetryPolicy::default());

    let reports = engine.enumerate_all().await.unwrap();
    assert_eq!(reports.len(), 2);

    let r = reports[0].outcome.as_ref().unwrap();
    let main: Vec<&str> = r[0]
        .outcome
        .as_ref()
        .unwrap()
        .iter()
        .map(|rec| rec.commit_id.as_str())
        .collect();
    assert_eq!(main, vec!["C3", "C2", "C1"]);

    let text = render_reports(&reports, OutputFormat::Text).unwrap();
    assert!(text.contains("Commit: C3\nAuthor: Ada Lovelace\nDate: 1700000300 +0000\n"));
    assert!(!text.contains("F1"));
    assert!(text.contains("== docs"));
}
