use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use super::error::check;
use super::{SourceTracker, TrackerError, TrackerResult};
use crate::config::GitHubConfig;
use crate::model::source::{GhIssue, SourceIssue};

const PER_PAGE: usize = 100;

pub struct GitHubTracker {
    base_url: String,
    repository: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubTracker {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{path}", self.base_url, self.repository)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "jira-sync")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }
        req
    }
}

#[async_trait]
impl SourceTracker for GitHubTracker {
    async fn get_issue(&self, number: u64) -> TrackerResult<SourceIssue> {
        let url = self.repo_url(&format!("issues/{number}"));
        let resp = self.request(reqwest::Method::GET, &url).send().await?;
        let issue: GhIssue = check(resp, &format!("GitHub issue #{number}"))
            .await?
            .json()
            .await?;
        Ok(issue.into())
    }

    async fn edit_issue_title(&self, number: u64, title: &str) -> TrackerResult<()> {
        let url = self.repo_url(&format!("issues/{number}"));
        let resp = self
            .request(reqwest::Method::PATCH, &url)
            .json(&json!({ "title": title }))
            .send()
            .await?;
        check(resp, &format!("GitHub issue #{number}")).await?;
        Ok(())
    }

    async fn list_open_issues_and_prs(&self) -> TrackerResult<Vec<SourceIssue>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let url = self.repo_url("issues");
            let resp = self
                .request(reqwest::Method::GET, &url)
                .query(&[
                    ("state", "open".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;
            let batch: Vec<GhIssue> = check(resp, "GitHub issue list").await?.json().await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch.into_iter().map(SourceIssue::from));
            if done {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn is_collaborator(&self, login: &str) -> TrackerResult<bool> {
        let url = self.repo_url(&format!("collaborators/{}", urlencoding::encode(login)));
        let resp = self.request(reqwest::Method::GET, &url).send().await?;
        match resp.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => {
                check(resp, "GitHub collaborator").await?;
                Err(TrackerError::Decode(format!(
                    "unexpected collaborator response for {login}"
                )))
            }
        }
    }
}
