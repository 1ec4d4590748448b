use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked issue, REST wire format.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub repository_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignee: Option<User>,
    /// The account that opened the issue.
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

impl Issue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }

    pub fn assignee_login(&self) -> Option<&str> {
        self.assignee.as_ref().map(|u| u.login.as_str())
    }
}

/// Issue creation request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
}

/// Partial issue update; untouched fields are omitted from the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl IssueChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
