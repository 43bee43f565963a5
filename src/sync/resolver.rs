//! Finding the JIRA issue that mirrors a GitHub issue.
//!
//! There is no local state: every lookup goes back to JIRA. Events for one GitHub
//! issue often arrive in a burst (opened, then edited or labeled) and are processed
//! out of order by independent runs, so a lookup that wants to create a missing issue
//! first waits a few times for a concurrent `opened` run to finish creating it.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use super::Mirror;
use crate::model::source::SourceIssue;
use crate::model::target::{RemoteLink, TargetIssue};
use crate::util::clock::jitter;

/// Waits before giving up and creating the issue, bounding the worst case at
/// five times the maximum wait.
pub const RESOLVE_RETRIES: u32 = 5;
const RESOLVE_WAIT_SECS: std::ops::RangeInclusive<u64> = 30..=60;

static MANUAL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-Z]+-\d+)\)\s*$").expect("valid manual key regex"));

/// What to do after a lookup found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    GiveUp,
    Wait,
    Create,
}

pub fn next_step(create_if_missing: bool, retries_remaining: u32) -> Step {
    if !create_if_missing {
        Step::GiveUp
    } else if retries_remaining > 0 {
        Step::Wait
    } else {
        Step::Create
    }
}

pub fn remote_link_query(url: &str) -> String {
    format!("issue in issuesWithRemoteLinksByGlobalId(\"{url}\") order by updated desc")
}

impl Mirror {
    /// The linked JIRA issue, if there is one. Never creates.
    pub async fn find_target(&self, issue: &SourceIssue) -> Result<Option<TargetIssue>> {
        self.resolve(issue, false).await
    }

    /// The linked JIRA issue, creating it after the race-avoidance waits if needed.
    pub async fn find_or_create_target(&self, issue: &SourceIssue) -> Result<TargetIssue> {
        self.resolve(issue, true)
            .await?
            .with_context(|| format!("no JIRA issue resolved for {}", issue.url))
    }

    pub async fn resolve(
        &self,
        issue: &SourceIssue,
        create_if_missing: bool,
    ) -> Result<Option<TargetIssue>> {
        let mut retries = RESOLVE_RETRIES;
        loop {
            if let Some(found) = self.lookup(issue).await? {
                return Ok(Some(found));
            }
            match next_step(create_if_missing, retries) {
                Step::GiveUp => return Ok(None),
                Step::Wait => {
                    info!(
                        url = %issue.url,
                        retries,
                        "waiting to see if the issue is created by another run"
                    );
                    self.clock.sleep(jitter(RESOLVE_WAIT_SECS)).await;
                    retries -= 1;
                }
                Step::Create => {
                    info!(url = %issue.url, "creating missing JIRA issue");
                    return self.create_target(issue).await.map(Some);
                }
            }
        }
    }

    async fn lookup(&self, issue: &SourceIssue) -> Result<Option<TargetIssue>> {
        let jql = remote_link_query(&issue.url);
        debug!(%jql, "JQL query");
        let mut found = self
            .target
            .search(&jql)
            .await
            .context("JIRA remote link search failed")?;

        if found.is_empty() {
            warn!(url = %issue.url, "no JIRA issues have a remote link with this globalId");
            return Ok(self.manual_match(issue).await);
        }
        if found.len() > 1 {
            warn!(
                url = %issue.url,
                count = found.len(),
                "remote link globalId matches multiple JIRA issues, using last-updated only"
            );
        }
        Ok(Some(found.swap_remove(0)))
    }

    /// An issue synced by hand ends its GitHub title with `(KEY-123)` and has the
    /// GitHub url in its JIRA description. Link those so later lookups find them.
    ///
    /// Failures are not logged: the title comes from an untrusted source
    /// and must not reveal which JIRA keys exist.
    async fn manual_match(&self, issue: &SourceIssue) -> Option<TargetIssue> {
        let key = MANUAL_KEY.captures(&issue.title)?.get(1)?.as_str().to_string();
        let target = self.target.get_issue(&key).await.ok()?;
        if !target
            .description
            .as_deref()
            .is_some_and(|d| d.contains(&issue.url))
        {
            return None;
        }
        info!(key = %target.key, "JIRA issue looks manually synced, adding a remote link");
        let link = RemoteLink::synced_from(&issue.url, &issue.title, !issue.is_open());
        self.target.add_remote_link(&target.key, &link).await.ok()?;
        Some(target)
    }
}
