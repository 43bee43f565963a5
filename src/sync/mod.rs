pub mod field_map;
pub mod handlers;
pub mod reconcile;
pub mod resolver;


use anyhow::Result;
use tracing::info;

use crate::config::{JiraConfig, SyncConfig};
use crate::event::SyncEvent;
use crate::providers::{SourceTracker, TargetTracker};
use crate::util::clock::Clock;
use crate::util::markup::MarkupConverter;

/// Project-level knobs the handlers need.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project: String,
    pub component: Option<String>,
    pub default_issue_type: String,
    pub status_field: Option<String>,
    pub skip_collaborator_prs: bool,
}

impl Settings {
    pub fn new(jira: &JiraConfig, sync: &SyncConfig) -> Self {
        Self {
            project: jira.project.clone(),
            component: jira.component.clone(),
            default_issue_type: jira.issue_type.clone(),
            status_field: jira.status_field.clone(),
            skip_collaborator_prs: sync.skip_collaborator_prs,
        }
    }
}

/// Mirrors GitHub issues into JIRA. Holds every remote collaborator explicitly,
/// so each invocation starts from fresh remote state.
pub struct Mirror {
    source: Box<dyn SourceTracker>,
    target: Box<dyn TargetTracker>,
    markup: Box<dyn MarkupConverter>,
    clock: Box<dyn Clock>,
    settings: Settings,
}

impl Mirror {
    pub fn new(
        source: Box<dyn SourceTracker>,
        target: Box<dyn TargetTracker>,
        markup: Box<dyn MarkupConverter>,
        clock: Box<dyn Clock>,
        settings: Settings,
    ) -> Self {
        Self {
            source,
            target,
            markup,
            clock,
            settings,
        }
    }

    pub async fn handle(&self, event: SyncEvent) -> Result<()> {
        info!(kind = event.kind(), "handling event");
        match event {
            SyncEvent::IssueOpened { issue } => self.handle_opened(&issue).await,
            SyncEvent::IssueEdited { issue, sender } => self.handle_edited(&issue, &sender).await,
            SyncEvent::IssueClosed { issue, sender } => self.handle_closed(&issue, &sender).await,
            SyncEvent::IssueReopened { issue, sender } => {
                self.handle_reopened(&issue, &sender).await
            }
            SyncEvent::IssueDeleted { issue, sender } => {
                self.handle_deleted(&issue, &sender).await
            }
            SyncEvent::IssueLabeled { issue, label } => self.handle_labeled(&issue, &label).await,
            SyncEvent::IssueUnlabeled { issue, label } => {
                self.handle_unlabeled(&issue, &label).await
            }
            SyncEvent::CommentCreated { issue, comment } => {
                self.handle_comment_created(&issue, &comment).await
            }
            SyncEvent::CommentEdited {
                issue,
                comment,
                previous_body,
            } => {
                self.handle_comment_edited(&issue, &comment, previous_body.as_deref())
                    .await
            }
            SyncEvent::CommentDeleted { issue, comment } => {
                self.handle_comment_deleted(&issue, &comment).await
            }
            SyncEvent::ManualSync { issue_numbers } => self.sync_manually(&issue_numbers).await,
            SyncEvent::Reconcile => self.reconcile().await.map(|_| ()),
        }
    }
}
