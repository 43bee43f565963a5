//! In-memory trackers for tests. Clones share state, so a test can keep a handle
//! while the mirror owns a boxed copy.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use super::{SourceTracker, TargetTracker, TrackerError, TrackerResult};
use crate::model::source::{IssueState, SourceIssue};
use crate::model::target::{
    IssueType, IssueUpdate, NewIssue, RemoteLink, TargetComment, TargetIssue,
};

pub fn source_issue(number: u64, title: &str) -> SourceIssue {
    SourceIssue {
        number,
        url: format!("https://github.com/acme/widgets/issues/{number}"),
        title: title.to_string(),
        body: Some("It crashes.".into()),
        author: "reporter".into(),
        labels: vec![],
        state: IssueState::Open,
        is_pull_request: false,
        updated_at: None,
    }
}

#[derive(Default)]
struct GitHubState {
    issues: BTreeMap<u64, SourceIssue>,
    collaborators: HashSet<String>,
    title_edits: Vec<(u64, String)>,
    transient_failures: usize,
    fatal_title_edit: bool,
}

#[derive(Clone, Default)]
pub struct FakeGitHub {
    state: Arc<Mutex<GitHubState>>,
}

impl FakeGitHub {
    pub fn with_issues(issues: Vec<SourceIssue>) -> Self {
        let fake = Self::default();
        for issue in issues {
            fake.insert(issue);
        }
        fake
    }

    pub fn insert(&self, issue: SourceIssue) {
        self.state.lock().unwrap().issues.insert(issue.number, issue);
    }

    pub fn add_collaborator(&self, login: &str) {
        self.state.lock().unwrap().collaborators.insert(login.into());
    }

    /// Fail the next `n` title edits with a transient error.
    pub fn fail_title_edits(&self, n: usize) {
        self.state.lock().unwrap().transient_failures = n;
    }

    pub fn reject_title_edits(&self) {
        self.state.lock().unwrap().fatal_title_edit = true;
    }

    pub fn title(&self, number: u64) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.issues.get(&number).map(|i| i.title.clone())
    }

    pub fn title_edits(&self) -> Vec<(u64, String)> {
        self.state.lock().unwrap().title_edits.clone()
    }
}

#[async_trait]
impl SourceTracker for FakeGitHub {
    async fn get_issue(&self, number: u64) -> TrackerResult<SourceIssue> {
        let state = self.state.lock().unwrap();
        state
            .issues
            .get(&number)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(format!("GitHub issue #{number}")))
    }

    async fn edit_issue_title(&self, number: u64, title: &str) -> TrackerResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fatal_title_edit {
            return Err(TrackerError::Rejected {
                status: 422,
                body: "Validation Failed".into(),
            });
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(TrackerError::Transient("502 Bad Gateway".into()));
        }
        state.title_edits.push((number, title.to_string()));
        match state.issues.get_mut(&number) {
            Some(issue) => {
                issue.title = title.to_string();
                Ok(())
            }
            None => Err(TrackerError::NotFound(format!("GitHub issue #{number}"))),
        }
    }

    async fn list_open_issues_and_prs(&self) -> TrackerResult<Vec<SourceIssue>> {
        let state = self.state.lock().unwrap();
        Ok(state.issues.values().filter(|i| i.is_open()).cloned().collect())
    }

    async fn is_collaborator(&self, login: &str) -> TrackerResult<bool> {
        Ok(self.state.lock().unwrap().collaborators.contains(login))
    }
}

struct StoredIssue {
    issue: TargetIssue,
    links: Vec<RemoteLink>,
    comments: Vec<TargetComment>,
    select_fields: BTreeMap<String, String>,
}

struct JiraState {
    project: String,
    next_number: u64,
    next_link_id: u64,
    next_comment_id: u64,
    clock: u64,
    issues: Vec<StoredIssue>,
    issue_types: Vec<IssueType>,
    components: BTreeMap<String, Vec<String>>,
    created: Vec<NewIssue>,
    searches: usize,
    fail_select_field: bool,
    hide_links_from_search: bool,
}

#[derive(Clone)]
pub struct FakeJira {
    state: Arc<Mutex<JiraState>>,
}

impl FakeJira {
    /// Issues created by this fake are keyed `{project}-101`, `{project}-102`, ...
    pub fn new(project: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(JiraState {
                project: project.to_string(),
                next_number: 101,
                next_link_id: 1,
                next_comment_id: 1,
                clock: 0,
                issues: Vec::new(),
                issue_types: vec![
                    IssueType {
                        id: "1".into(),
                        name: "Task".into(),
                    },
                    IssueType {
                        id: "2".into(),
                        name: "Bug".into(),
                    },
                    IssueType {
                        id: "3".into(),
                        name: "Story".into(),
                    },
                ],
                components: BTreeMap::new(),
                created: Vec::new(),
                searches: 0,
                fail_select_field: false,
                hide_links_from_search: false,
            })),
        }
    }

    pub fn set_components(&self, project: &str, components: &[&str]) {
        self.state.lock().unwrap().components.insert(
            project.to_string(),
            components.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn fail_select_field_updates(&self) {
        self.state.lock().unwrap().fail_select_field = true;
    }

    /// Make the remote-link search always come back empty, as if the index lagged.
    pub fn hide_links_from_search(&self) {
        self.state.lock().unwrap().hide_links_from_search = true;
    }

    /// Seed an issue directly, bypassing `create_issue`.
    pub fn seed(&self, key: &str, description: &str, links: Vec<RemoteLink>) {
        let mut state = self.state.lock().unwrap();
        state.clock += 1;
        let updated = Utc.timestamp_opt(0, 0).unwrap() + Duration::seconds(state.clock as i64);
        let project_key = key.split('-').next().unwrap_or_default().to_string();
        let links: Vec<RemoteLink> = links
            .into_iter()
            .map(|mut l| {
                l.id = Some(state.next_link_id);
                state.next_link_id += 1;
                l
            })
            .collect();
        state.issues.push(StoredIssue {
            issue: TargetIssue {
                id: format!("id-{key}"),
                key: key.to_string(),
                project_key,
                summary: String::new(),
                description: Some(description.to_string()),
                labels: vec![],
                components: vec![],
                updated: Some(updated),
            },
            links,
            comments: vec![],
            select_fields: BTreeMap::new(),
        });
    }

    pub fn set_labels(&self, key: &str, labels: &[&str]) {
        self.with_issue(key, |s| {
            s.issue.labels = labels.iter().map(|l| l.to_string()).collect()
        });
    }

    pub fn set_issue_components(&self, key: &str, components: &[&str]) {
        self.with_issue(key, |s| {
            s.issue.components = components.iter().map(|c| c.to_string()).collect()
        });
    }

    pub fn push_comment(&self, key: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_comment_id.to_string();
        state.next_comment_id += 1;
        if let Some(s) = state.issues.iter_mut().find(|s| s.issue.key == key) {
            s.comments.push(TargetComment {
                id,
                body: body.to_string(),
            });
        }
    }

    fn with_issue<T>(&self, key: &str, f: impl FnOnce(&mut StoredIssue) -> T) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        state.issues.iter_mut().find(|s| s.issue.key == key).map(f)
    }

    pub fn issue(&self, key: &str) -> Option<TargetIssue> {
        self.with_issue(key, |s| s.issue.clone())
    }

    pub fn links(&self, key: &str) -> Vec<RemoteLink> {
        self.with_issue(key, |s| s.links.clone()).unwrap_or_default()
    }

    pub fn comments(&self, key: &str) -> Vec<String> {
        self.with_issue(key, |s| s.comments.iter().map(|c| c.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn select_field(&self, key: &str, field: &str) -> Option<String> {
        self.with_issue(key, |s| s.select_fields.get(field).cloned())
            .flatten()
    }

    pub fn created(&self) -> Vec<NewIssue> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn issue_count(&self) -> usize {
        self.state.lock().unwrap().issues.len()
    }

    pub fn searches(&self) -> usize {
        self.state.lock().unwrap().searches
    }

    fn not_found(key: &str) -> TrackerError {
        TrackerError::NotFound(format!("JIRA issue {key}"))
    }
}

/// Pull the quoted globalId out of an `issuesWithRemoteLinksByGlobalId("...")` query.
fn global_id_from_jql(jql: &str) -> Option<&str> {
    let start = jql.find("(\"")? + 2;
    let end = start + jql[start..].find("\")")?;
    Some(&jql[start..end])
}

#[async_trait]
impl TargetTracker for FakeJira {
    async fn search(&self, jql: &str) -> TrackerResult<Vec<TargetIssue>> {
        let mut state = self.state.lock().unwrap();
        state.searches += 1;
        if state.hide_links_from_search {
            return Ok(vec![]);
        }
        let Some(global_id) = global_id_from_jql(jql) else {
            return Err(TrackerError::Rejected {
                status: 400,
                body: format!("unsupported query: {jql}"),
            });
        };
        let mut found: Vec<TargetIssue> = state
            .issues
            .iter()
            .filter(|s| s.links.iter().any(|l| l.global_id == global_id))
            .map(|s| s.issue.clone())
            .collect();
        found.sort_by(|a, b| b.updated.cmp(&a.updated));
        Ok(found)
    }

    async fn get_issue(&self, key: &str) -> TrackerResult<TargetIssue> {
        self.issue(key).ok_or_else(|| Self::not_found(key))
    }

    async fn create_issue(&self, new: &NewIssue) -> TrackerResult<TargetIssue> {
        let key = {
            let mut state = self.state.lock().unwrap();
            let key = format!("{}-{}", state.project, state.next_number);
            state.next_number += 1;
            state.created.push(new.clone());
            key
        };
        self.seed(&key, &new.description, vec![]);
        self.with_issue(&key, |s| {
            s.issue.project_key = new.project.clone();
            s.issue.summary = new.summary.clone();
            s.issue.labels = new.labels.clone();
            s.issue.components = new.components.clone().unwrap_or_default();
        });
        self.get_issue(&key).await
    }

    async fn update_issue(&self, key: &str, update: &IssueUpdate) -> TrackerResult<()> {
        if update.select_field.is_some() && self.state.lock().unwrap().fail_select_field {
            return Err(TrackerError::Rejected {
                status: 400,
                body: "Field cannot be set".into(),
            });
        }
        self.with_issue(key, |s| {
            if let Some(summary) = &update.summary {
                s.issue.summary = summary.clone();
            }
            if let Some(description) = &update.description {
                s.issue.description = Some(description.clone());
            }
            if let Some(labels) = &update.labels {
                s.issue.labels = labels.clone();
            }
            if let Some(components) = &update.components {
                s.issue.components = components.clone();
            }
            if let Some((field, value)) = &update.select_field {
                s.select_fields.insert(field.clone(), value.clone());
            }
        })
        .ok_or_else(|| Self::not_found(key))
    }

    async fn list_remote_links(&self, key: &str) -> TrackerResult<Vec<RemoteLink>> {
        self.with_issue(key, |s| s.links.clone())
            .ok_or_else(|| Self::not_found(key))
    }

    async fn add_remote_link(&self, key: &str, link: &RemoteLink) -> TrackerResult<()> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_link_id;
        state.next_link_id += 1;
        let stored = state
            .issues
            .iter_mut()
            .find(|s| s.issue.key == key)
            .ok_or_else(|| Self::not_found(key))?;
        stored.links.retain(|l| l.global_id != link.global_id);
        stored.links.push(RemoteLink {
            id: Some(id),
            ..link.clone()
        });
        Ok(())
    }

    async fn update_remote_link(&self, key: &str, link: &RemoteLink) -> TrackerResult<()> {
        self.with_issue(key, |s| {
            for existing in s.links.iter_mut().filter(|l| l.id == link.id) {
                *existing = link.clone();
            }
        })
        .ok_or_else(|| Self::not_found(key))
    }

    async fn list_comments(&self, key: &str) -> TrackerResult<Vec<TargetComment>> {
        self.with_issue(key, |s| s.comments.clone())
            .ok_or_else(|| Self::not_found(key))
    }

    async fn add_comment(&self, key: &str, body: &str) -> TrackerResult<()> {
        self.get_issue(key).await?;
        self.push_comment(key, body);
        Ok(())
    }

    async fn update_comment(&self, key: &str, comment_id: &str, body: &str) -> TrackerResult<()> {
        self.with_issue(key, |s| {
            s.comments
                .iter_mut()
                .find(|c| c.id == comment_id)
                .map(|c| c.body = body.to_string())
        })
        .flatten()
        .ok_or_else(|| TrackerError::NotFound(format!("JIRA comment {comment_id}")))
    }

    async fn list_issue_types(&self) -> TrackerResult<Vec<IssueType>> {
        Ok(self.state.lock().unwrap().issue_types.clone())
    }

    async fn project_components(&self, project_key: &str) -> TrackerResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .components
            .get(project_key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(format!("JIRA project {project_key}")))
    }
}
