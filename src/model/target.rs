use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A JIRA issue as far as the mirror cares about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetIssue {
    pub id: String,
    pub key: String,
    /// Project the issue currently lives in; may differ from the configured one after a move.
    pub project_key: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub global_id: String,
    pub url: String,
    pub title: String,
    pub resolved: bool,
    pub relationship: String,
}

pub const SYNCED_FROM: &str = "synced from";

impl RemoteLink {
    pub fn synced_from(url: &str, title: &str, resolved: bool) -> Self {
        Self {
            id: None,
            global_id: url.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            resolved,
            relationship: SYNCED_FROM.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetComment {
    pub id: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueType {
    pub id: String,
    pub name: String,
}

/// JIRA accepts an issue type either by id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueTypeRef {
    Id(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub project: String,
    pub summary: String,
    pub description: String,
    pub issue_type: IssueTypeRef,
    pub labels: Vec<String>,
    pub components: Option<Vec<String>>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdate {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub labels: Option<Vec<String>>,
    pub components: Option<Vec<String>>,
    /// Select-list custom field as (field id, option value).
    pub select_field: Option<(String, String)>,
}

impl IssueUpdate {
    pub fn labels(labels: Vec<String>) -> Self {
        Self {
            labels: Some(labels),
            ..Self::default()
        }
    }

    pub fn select(field: &str, value: &str) -> Self {
        Self {
            select_field: Some((field.to_string(), value.to_string())),
            ..Self::default()
        }
    }
}
