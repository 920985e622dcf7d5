use serde::{Deserialize, Serialize};

/// A repository visible to the caller's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub id: String,
}

impl Repository {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// A branch reference. `head_commit_id` is absent for branches that have
/// never received a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub head_commit_id: Option<String>,
}

impl Branch {
    pub fn new(name: impl Into<String>, head_commit_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head_commit_id: Some(head_commit_id.into()),
        }
    }

    pub fn headless(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head_commit_id: None,
        }
    }

    /// Head commit id, treating an empty string the same as an absent head.
    pub fn head(&self) -> Option<&str> {
        self.head_commit_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider-formatted timestamp, kept verbatim.
    #[serde(default)]
    pub date: Option<String>,
}

/// A commit object as returned by the provider. Never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitNode {
    pub id: String,
    /// First entry is the first parent; empty for a root commit.
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
    #[serde(default)]
    pub message: String,
}

impl CommitNode {
    pub fn new(id: impl Into<String>, parent_ids: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_ids,
            author: None,
            message: message.into(),
        }
    }

    pub fn root(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(id, Vec::new(), message)
    }

    pub fn with_author(mut self, name: impl Into<String>, date: impl Into<String>) -> Self {
        self.author = Some(CommitAuthor {
            name: Some(name.into()),
            email: None,
            date: Some(date.into()),
        });
        self
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parent_ids.first().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.name.as_deref())
    }

    pub fn author_date(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.date.as_deref())
    }
}
