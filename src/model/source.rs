use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// Snapshot of a GitHub issue or pull request as delivered by one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIssue {
    pub number: u64,
    /// `html_url` on GitHub; doubles as the remote link globalId on the JIRA side.
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub author: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub state: IssueState,
    #[serde(default)]
    pub is_pull_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SourceIssue {
    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }

    /// "PR" or "issue", as used in audit comments.
    pub fn kind(&self) -> &'static str {
        if self.is_pull_request {
            "PR"
        } else {
            "issue"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceComment {
    pub id: u64,
    pub url: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Wire shape shared by the REST API and webhook payloads.
#[derive(Debug, Deserialize)]
pub struct GhIssue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub user: GhUser,
    #[serde(default)]
    pub labels: Vec<GhLabel>,
    pub state: IssueState,
    pub html_url: String,
    pub pull_request: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct GhUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct GhLabel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GhComment {
    pub id: u64,
    pub html_url: String,
    pub user: GhUser,
    pub body: Option<String>,
}

impl From<GhIssue> for SourceIssue {
    fn from(issue: GhIssue) -> Self {
        SourceIssue {
            number: issue.number,
            url: issue.html_url,
            title: issue.title,
            body: issue.body,
            author: issue.user.login,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            state: issue.state,
            is_pull_request: issue.pull_request.is_some(),
            updated_at: issue.updated_at,
        }
    }
}

impl From<GhComment> for SourceComment {
    fn from(comment: GhComment) -> Self {
        SourceComment {
            id: comment.id,
            url: comment.html_url,
            author: comment.user.login,
            body: comment.body,
        }
    }
}
