pub mod error;
pub mod github;
pub mod jira;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

pub use error::TrackerError;

use crate::model::source::SourceIssue;
use crate::model::target::{
    IssueType, IssueUpdate, NewIssue, RemoteLink, TargetComment, TargetIssue,
};

pub type TrackerResult<T> = Result<T, TrackerError>;

/// The tracker events originate from. Read-mostly; the only write is the title amend.
#[async_trait]
pub trait SourceTracker: Send + Sync {
    async fn get_issue(&self, number: u64) -> TrackerResult<SourceIssue>;
    async fn edit_issue_title(&self, number: u64, title: &str) -> TrackerResult<()>;
    async fn list_open_issues_and_prs(&self) -> TrackerResult<Vec<SourceIssue>>;
    async fn is_collaborator(&self, _login: &str) -> TrackerResult<bool> {
        Ok(false)
    }
}

/// The system of record issues are mirrored into.
#[async_trait]
pub trait TargetTracker: Send + Sync {
    /// Run a JQL query. Results keep the order the query asks for.
    async fn search(&self, jql: &str) -> TrackerResult<Vec<TargetIssue>>;
    async fn get_issue(&self, key: &str) -> TrackerResult<TargetIssue>;
    async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<TargetIssue>;
    async fn update_issue(&self, key: &str, update: &IssueUpdate) -> TrackerResult<()>;

    async fn list_remote_links(&self, key: &str) -> TrackerResult<Vec<RemoteLink>>;
    async fn add_remote_link(&self, key: &str, link: &RemoteLink) -> TrackerResult<()>;
    async fn update_remote_link(&self, key: &str, link: &RemoteLink) -> TrackerResult<()>;

    async fn list_comments(&self, key: &str) -> TrackerResult<Vec<TargetComment>>;
    async fn add_comment(&self, key: &str, body: &str) -> TrackerResult<()>;
    async fn update_comment(&self, key: &str, comment_id: &str, body: &str) -> TrackerResult<()>;

    async fn list_issue_types(&self) -> TrackerResult<Vec<IssueType>>;
    async fn project_components(&self, project_key: &str) -> TrackerResult<Vec<String>>;
}
