use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::field_map;
use super::Mirror;
use crate::model::source::{SourceComment, SourceIssue};
use crate::model::target::{IssueTypeRef, IssueUpdate, NewIssue, RemoteLink, TargetIssue};
use crate::util::clock::jitter;

/// Retries after the first failed title edit.
pub const TITLE_EDIT_RETRIES: u32 = 5;

const STATUS_OPEN: &str = "Open";
const STATUS_CLOSED: &str = "Closed";

/// Numbers from free text such as `12, 15 #20`. Non-numeric tokens are skipped.
pub fn parse_issue_numbers(input: &str) -> Vec<u64> {
    input
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(token, "wrong issue number entered, skipping");
                None
            }
        })
        .collect()
}

impl Mirror {
    pub async fn handle_opened(&self, issue: &SourceIssue) -> Result<()> {
        if let Some(existing) = self.find_target(issue).await? {
            info!(key = %existing.key, "issue already exists (another event was dispatched first?)");
            return Ok(());
        }
        info!(url = %issue.url, "creating new JIRA issue for new GitHub issue");
        self.create_target(issue).await?;
        Ok(())
    }

    pub async fn handle_edited(&self, issue: &SourceIssue, user: &str) -> Result<()> {
        let target = self.find_or_create_target(issue).await?;
        let body = self.markup.convert(issue.body.as_deref()).await;
        let update = IssueUpdate {
            summary: Some(field_map::summary(issue)),
            description: Some(field_map::description(issue, &body)),
            components: self.components_field(Some(&target)).await?,
            ..IssueUpdate::default()
        };
        self.target
            .update_issue(&target.key, &update)
            .await
            .with_context(|| format!("Failed to update {}", target.key))?;
        self.update_link_resolved(issue, &target.key).await?;
        self.leave_audit_comment(issue, &target, "edited", user).await
    }

    /// Closing on GitHub does not close the JIRA issue: GitHub issues are often closed
    /// once a workaround is found while the root cause is still open.
    pub async fn handle_closed(&self, issue: &SourceIssue, user: &str) -> Result<()> {
        let Some(target) = self.find_target(issue).await? else {
            info!(url = %issue.url, "no synced JIRA issue, nothing to close");
            return Ok(());
        };
        self.leave_audit_comment(issue, &target, "closed", user).await?;
        self.set_status(&target.key, STATUS_CLOSED).await;
        self.update_link_resolved(issue, &target.key).await
    }

    pub async fn handle_reopened(&self, issue: &SourceIssue, user: &str) -> Result<()> {
        let target = self.find_or_create_target(issue).await?;
        self.leave_audit_comment(issue, &target, "reopened", user).await?;
        self.set_status(&target.key, STATUS_OPEN).await;
        self.update_link_resolved(issue, &target.key).await
    }

    pub async fn handle_deleted(&self, issue: &SourceIssue, user: &str) -> Result<()> {
        match self.find_target(issue).await? {
            Some(target) => self.leave_audit_comment(issue, &target, "deleted", user).await,
            None => Ok(()),
        }
    }

    pub async fn handle_labeled(&self, issue: &SourceIssue, label: &str) -> Result<()> {
        let Some(target) = self.resolve(issue, issue.is_open()).await? else {
            return Ok(());
        };
        let new_label = field_map::label(label);
        if field_map::is_reserved_label(&new_label) {
            debug!(label = %new_label, "ignoring label owned by JIRA");
            return Ok(());
        }
        if target.labels.contains(&new_label) {
            return Ok(());
        }
        let mut labels = target.labels.clone();
        labels.push(new_label);
        self.target
            .update_issue(&target.key, &IssueUpdate::labels(labels))
            .await
            .with_context(|| format!("Failed to update labels on {}", target.key))?;
        Ok(())
    }

    pub async fn handle_unlabeled(&self, issue: &SourceIssue, label: &str) -> Result<()> {
        let Some(target) = self.resolve(issue, issue.is_open()).await? else {
            return Ok(());
        };
        let removed = field_map::label(label);
        if field_map::is_reserved_label(&removed) {
            debug!(label = %removed, "ignoring label owned by JIRA");
            return Ok(());
        }
        if !target.labels.contains(&removed) {
            return Ok(());
        }
        let labels: Vec<String> = target
            .labels
            .iter()
            .filter(|l| **l != removed)
            .cloned()
            .collect();
        self.target
            .update_issue(&target.key, &IssueUpdate::labels(labels))
            .await
            .with_context(|| format!("Failed to update labels on {}", target.key))?;
        Ok(())
    }

    pub async fn handle_comment_created(
        &self,
        issue: &SourceIssue,
        comment: &SourceComment,
    ) -> Result<()> {
        let target = self.find_or_create_target(issue).await?;
        let body = self.markup.convert(comment.body.as_deref()).await;
        self.target
            .add_comment(&target.key, &field_map::fingerprint(comment, &body))
            .await
            .with_context(|| format!("Failed to comment on {}", target.key))?;
        Ok(())
    }

    /// Update the mirrored comment in place when its previous text can be found,
    /// otherwise post the new text as a fresh comment.
    pub async fn handle_comment_edited(
        &self,
        issue: &SourceIssue,
        comment: &SourceComment,
        previous_body: Option<&str>,
    ) -> Result<()> {
        let target = self.find_or_create_target(issue).await?;
        let body = self.markup.convert(comment.body.as_deref()).await;
        let new_text = field_map::fingerprint(comment, &body);

        if let Some(previous) = previous_body {
            let old_body = self.markup.convert(Some(previous)).await;
            let old_text = field_map::fingerprint(comment, &old_body);
            let existing = self.target.list_comments(&target.key).await?;
            if let Some(mirrored) = existing.iter().find(|c| c.body == old_text) {
                self.target
                    .update_comment(&target.key, &mirrored.id, &new_text)
                    .await
                    .with_context(|| format!("Failed to update comment on {}", target.key))?;
                return Ok(());
            }
        }

        debug!(key = %target.key, "previous comment text not found, adding a new comment");
        self.target
            .add_comment(&target.key, &new_text)
            .await
            .with_context(|| format!("Failed to comment on {}", target.key))?;
        Ok(())
    }

    /// The mirrored comment stays in JIRA; only a note about the deletion is added.
    pub async fn handle_comment_deleted(
        &self,
        issue: &SourceIssue,
        comment: &SourceComment,
    ) -> Result<()> {
        let target = self.find_or_create_target(issue).await?;
        self.target
            .add_comment(&target.key, &field_map::comment_deleted(comment))
            .await
            .with_context(|| format!("Failed to comment on {}", target.key))?;
        Ok(())
    }

    /// Mirror the listed issues or PRs. Safe to re-run over already synced numbers.
    pub async fn sync_manually(&self, issue_numbers: &str) -> Result<()> {
        for number in parse_issue_numbers(issue_numbers) {
            let issue = self
                .source
                .get_issue(number)
                .await
                .with_context(|| format!("Failed to fetch GitHub issue #{number}"))?;
            info!(number, "mirroring issue to JIRA");
            self.handle_opened(&issue).await?;
        }
        Ok(())
    }

    /// Create the JIRA issue, link it back, and append its key to the GitHub title.
    pub(crate) async fn create_target(&self, issue: &SourceIssue) -> Result<TargetIssue> {
        let types = self
            .target
            .list_issue_types()
            .await
            .context("Failed to list JIRA issue types")?;
        let issue_type = field_map::issue_type(&issue.labels, &types)
            .unwrap_or_else(|| IssueTypeRef::Name(self.settings.default_issue_type.clone()));
        let body = self.markup.convert(issue.body.as_deref()).await;

        let new_issue = NewIssue {
            project: self.settings.project.clone(),
            summary: field_map::summary(issue),
            description: field_map::description(issue, &body),
            issue_type,
            labels: issue
                .labels
                .iter()
                .map(|l| field_map::label(l))
                .filter(|l| !field_map::is_reserved_label(l))
                .collect(),
            components: self.components_field(None).await?,
        };
        let created = self
            .target
            .create_issue(&new_issue)
            .await
            .context("Failed to create JIRA issue")?;
        info!(key = %created.key, url = %issue.url, "created JIRA issue");

        self.set_status(&created.key, STATUS_OPEN).await;

        let link = RemoteLink::synced_from(&issue.url, &issue.title, !issue.is_open());
        self.target
            .add_remote_link(&created.key, &link)
            .await
            .with_context(|| format!("Failed to link {} to {}", created.key, issue.url))?;

        self.amend_source_title(issue.number, &created.key).await?;
        Ok(created)
    }

    /// Append ` (KEY-123)` to the GitHub title. Edits made with the workflow token do
    /// not trigger further events.
    async fn amend_source_title(&self, number: u64, key: &str) -> Result<()> {
        let current = self
            .source
            .get_issue(number)
            .await
            .with_context(|| format!("Failed to fetch GitHub issue #{number}"))?;
        let suffix = format!(" ({key})");
        if current.title.ends_with(&suffix) {
            return Ok(());
        }
        let title = format!("{}{suffix}", current.title);

        let mut retries = TITLE_EDIT_RETRIES;
        loop {
            match self.source.edit_issue_title(number, &title).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && retries > 0 => {
                    warn!(number, retries, error = %e, "GitHub title edit failed, retrying");
                    self.clock.sleep(jitter(1..=5)).await;
                    retries -= 1;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to edit title of GitHub issue #{number}"))
                }
            }
        }
    }

    /// Best effort: the status field is metadata and may be missing from the screen.
    async fn set_status(&self, key: &str, value: &str) {
        let Some(field) = self.settings.status_field.as_deref() else {
            return;
        };
        if let Err(e) = self
            .target
            .update_issue(key, &IssueUpdate::select(field, value))
            .await
        {
            warn!(key, field, value, error = %e, "could not set GitHub issue status field");
        }
    }

    /// Mirror open/closed state and the current title onto the "synced from" link.
    /// JIRA shows resolved links struck through.
    async fn update_link_resolved(&self, issue: &SourceIssue, key: &str) -> Result<()> {
        let links = self
            .target
            .list_remote_links(key)
            .await
            .with_context(|| format!("Failed to list remote links on {key}"))?;
        for mut link in links.into_iter().filter(|l| l.global_id == issue.url) {
            link.title = issue.title.clone();
            link.resolved = !issue.is_open();
            self.target
                .update_remote_link(key, &link)
                .await
                .with_context(|| format!("Failed to update remote link on {key}"))?;
        }
        Ok(())
    }

    async fn leave_audit_comment(
        &self,
        issue: &SourceIssue,
        target: &TargetIssue,
        verb: &str,
        user: &str,
    ) -> Result<()> {
        self.target
            .add_comment(&target.key, &field_map::audit_comment(issue, verb, user))
            .await
            .with_context(|| format!("Failed to comment on {}", target.key))?;
        Ok(())
    }
}
