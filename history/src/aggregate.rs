use provider::CommitNode;
use serde::{Deserialize, Serialize};

/// Output view of one commit in a branch's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_id: String,
    pub author: String,
    pub date: String,
    pub message: String,
    /// Always empty: tags are not resolved.
    pub tags: Vec<String>,
}

impl From<&CommitNode> for CommitRecord {
    fn from(commit: &CommitNode) -> Self {
        Self {
            commit_id: commit.id.clone(),
            author: commit.author_name().unwrap_or_default().to_string(),
            date: commit.author_date().unwrap_or_default().to_string(),
            message: commit.message.clone(),
            tags: Vec::new(),
        }
    }
}

/// History of one branch, newest commit first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub records: Vec<CommitRecord>,
}

impl TraversalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn head(&self) -> Option<&CommitRecord> {
        self.records.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommitRecord> {
        self.records.iter()
    }
}

impl From<Vec<CommitRecord>> for TraversalResult {
    fn from(records: Vec<CommitRecord>) -> Self {
        Self { records }
    }
}

/// Maps fetched commits to records, keeping traversal order.
pub fn to_records(commits: &[CommitNode]) -> Vec<CommitRecord> {
    commits.iter().map(CommitRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_author_has_empty_fields() {
        let commit = CommitNode::root("C1", "Initial commit");
        let record = CommitRecord::from(&commit);

        assert_eq!(record.commit_id, "C1");
        assert_eq!(record.message, "Initial commit");
        assert_eq!(record.author, "");
        assert_eq!(record.date, "");
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_record_with_partial_author() {
        let mut commit = CommitNode::root("C1", "msg").with_author("Ada", "2024-01-01");
        if let Some(author) = commit.author.as_mut() {
            author.date = None;
        }

        let record = CommitRecord::from(&commit);
        assert_eq!(record.author, "Ada");
        assert_eq!(record.date, "");
    }

    #[test]
    fn test_to_records_preserves_order() {
        let commits = vec![
            CommitNode::new("C3", vec!["C2".to_string()], "third").with_author("Ada", "3"),
            CommitNode::new("C2", vec!["C1".to_string()], "second"),
            CommitNode::root("C1", "first").with_author("Grace", "1"),
        ];

        let records = to_records(&commits);
        let ids: Vec<&str> = records.iter().map(|r| r.commit_id.as_str()).collect();
        assert_eq!(ids, vec!["C3", "C2", "C1"]);
        assert_eq!(records[0].author, "Ada");
        assert_eq!(records[2].date, "1");
        assert!(records.iter().all(|r| r.tags.is_empty()));
    }

    #[test]
    fn test_empty_input_gives_empty_result() {
        let result = TraversalResult::from(to_records(&[]));
        assert!(result.is_empty());
        assert_eq!(result.head(), None);
    }

    #[test]
    fn test_record_serializes_tags_as_empty_list() {
        let record = CommitRecord::from(&CommitNode::root("C1", "msg"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tags"], serde_json::json!([]));
        assert_eq!(json["commit_id"], "C1");
    }
}
