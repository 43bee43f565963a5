use anyhow::{Context, Result};
use tracing::{debug, info};

use super::Mirror;
use crate::model::source::SourceIssue;

impl Mirror {
    /// Sweep every open GitHub issue and PR, creating JIRA issues for any the event
    /// path missed. Returns how many were created.
    pub async fn reconcile(&self) -> Result<usize> {
        let open = self
            .source
            .list_open_issues_and_prs()
            .await
            .context("Failed to list open GitHub issues")?;
        info!(count = open.len(), "reconciling open issues and PRs");
        self.sync_remaining(&open).await
    }

    pub async fn sync_remaining(&self, open: &[SourceIssue]) -> Result<usize> {
        let mut created = 0;
        for issue in open.iter().filter(|i| i.is_open()) {
            if issue.is_pull_request
                && self.settings.skip_collaborator_prs
                && self.source.is_collaborator(&issue.author).await?
            {
                debug!(number = issue.number, author = %issue.author, "skipping collaborator PR");
                continue;
            }
            if self.find_target(issue).await?.is_some() {
                continue;
            }
            info!(number = issue.number, url = %issue.url, "creating missing JIRA issue");
            self.create_target(issue).await?;
            created += 1;
        }
        Ok(created)
    }
}
