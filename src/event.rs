use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::model::source::{GhComment, GhIssue, GhUser, SourceComment, SourceIssue};

/// One unit of work for the mirror, decoded from a GitHub Actions event.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    IssueOpened {
        issue: SourceIssue,
    },
    IssueEdited {
        issue: SourceIssue,
        sender: String,
    },
    IssueClosed {
        issue: SourceIssue,
        sender: String,
    },
    IssueReopened {
        issue: SourceIssue,
        sender: String,
    },
    IssueDeleted {
        issue: SourceIssue,
        sender: String,
    },
    IssueLabeled {
        issue: SourceIssue,
        label: String,
    },
    IssueUnlabeled {
        issue: SourceIssue,
        label: String,
    },
    CommentCreated {
        issue: SourceIssue,
        comment: SourceComment,
    },
    CommentEdited {
        issue: SourceIssue,
        comment: SourceComment,
        previous_body: Option<String>,
    },
    CommentDeleted {
        issue: SourceIssue,
        comment: SourceComment,
    },
    ManualSync {
        issue_numbers: String,
    },
    Reconcile,
}

#[derive(Deserialize)]
struct Payload {
    action: Option<String>,
    issue: Option<GhIssue>,
    pull_request: Option<GhIssue>,
    comment: Option<GhComment>,
    label: Option<NamedLabel>,
    sender: Option<GhUser>,
    changes: Option<Changes>,
    inputs: Option<Value>,
}

#[derive(Deserialize)]
struct NamedLabel {
    name: String,
}

#[derive(Deserialize)]
struct Changes {
    body: Option<ChangedText>,
}

#[derive(Deserialize)]
struct ChangedText {
    from: Option<String>,
}

impl SyncEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::IssueOpened { .. } => "issue-opened",
            SyncEvent::IssueEdited { .. } => "issue-edited",
            SyncEvent::IssueClosed { .. } => "issue-closed",
            SyncEvent::IssueReopened { .. } => "issue-reopened",
            SyncEvent::IssueDeleted { .. } => "issue-deleted",
            SyncEvent::IssueLabeled { .. } => "issue-labeled",
            SyncEvent::IssueUnlabeled { .. } => "issue-unlabeled",
            SyncEvent::CommentCreated { .. } => "comment-created",
            SyncEvent::CommentEdited { .. } => "comment-edited",
            SyncEvent::CommentDeleted { .. } => "comment-deleted",
            SyncEvent::ManualSync { .. } => "manual-sync",
            SyncEvent::Reconcile => "reconcile",
        }
    }

    /// Decode a webhook payload. `Ok(None)` means the event is not one the mirror acts on.
    pub fn from_webhook(event_name: &str, payload: &str) -> Result<Option<SyncEvent>> {
        let payload: Payload =
            serde_json::from_str(payload).context("Failed to parse event payload")?;

        match event_name {
            "schedule" => return Ok(Some(SyncEvent::Reconcile)),
            "workflow_dispatch" => {
                let numbers = payload
                    .inputs
                    .as_ref()
                    .and_then(|i| i.get("issue-numbers"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                return Ok(Some(match numbers {
                    Some(n) => SyncEvent::ManualSync {
                        issue_numbers: n.to_string(),
                    },
                    None => SyncEvent::Reconcile,
                }));
            }
            _ => {}
        }

        let action = payload.action.as_deref().unwrap_or_default();
        let raw_issue = match event_name {
            "issues" | "issue_comment" => payload.issue,
            "pull_request" | "pull_request_target" => payload.pull_request,
            _ => return Ok(None),
        };
        let mut issue: SourceIssue = raw_issue
            .with_context(|| format!("{event_name} event without an issue"))?
            .into();
        if event_name.starts_with("pull_request") {
            issue.is_pull_request = true;
        }
        let sender = payload
            .sender
            .map(|s| s.login)
            .unwrap_or_else(|| issue.author.clone());

        if event_name == "issue_comment" {
            let comment: SourceComment = payload
                .comment
                .context("issue_comment event without a comment")?
                .into();
            let event = match action {
                "created" => SyncEvent::CommentCreated { issue, comment },
                "edited" => SyncEvent::CommentEdited {
                    issue,
                    comment,
                    previous_body: payload.changes.and_then(|c| c.body).and_then(|b| b.from),
                },
                "deleted" => SyncEvent::CommentDeleted { issue, comment },
                _ => return Ok(None),
            };
            return Ok(Some(event));
        }

        let label = payload.label.map(|l| l.name);
        let event = match action {
            "opened" => SyncEvent::IssueOpened { issue },
            "edited" => SyncEvent::IssueEdited { issue, sender },
            "closed" => SyncEvent::IssueClosed { issue, sender },
            "reopened" => SyncEvent::IssueReopened { issue, sender },
            "deleted" => SyncEvent::IssueDeleted { issue, sender },
            "labeled" => SyncEvent::IssueLabeled {
                issue,
                label: label.context("labeled event without a label")?,
            },
            "unlabeled" => SyncEvent::IssueUnlabeled {
                issue,
                label: label.context("unlabeled event without a label")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
