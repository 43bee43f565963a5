use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::check;
use super::{TargetTracker, TrackerResult};
use crate::config::JiraConfig;
use crate::model::target::{
    IssueType, IssueTypeRef, IssueUpdate, NewIssue, RemoteLink, TargetComment, TargetIssue,
};

const ISSUE_FIELDS: &str = "summary,description,labels,components,project,updated";

pub struct JiraTracker {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl JiraTracker {
    pub fn new(config: &JiraConfig) -> Self {
        let creds = format!("{}:{}", config.user, config.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/rest/api/2/{path}", self.base_url))
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct JiraIssue {
    id: String,
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    components: Vec<NamedField>,
    project: Option<ProjectField>,
    updated: Option<String>,
}

#[derive(Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Deserialize)]
struct ProjectField {
    key: String,
}

#[derive(Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraRemoteLink {
    id: u64,
    global_id: Option<String>,
    relationship: Option<String>,
    object: RemoteObject,
}

#[derive(Deserialize)]
struct RemoteObject {
    url: String,
    #[serde(default)]
    title: String,
    status: Option<RemoteStatus>,
}

#[derive(Deserialize)]
struct RemoteStatus {
    #[serde(default)]
    resolved: bool,
}

#[derive(Deserialize)]
struct CommentPage {
    comments: Vec<JiraComment>,
}

#[derive(Deserialize)]
struct JiraComment {
    id: String,
    #[serde(default)]
    body: String,
}

fn parse_jira_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl From<JiraIssue> for TargetIssue {
    fn from(issue: JiraIssue) -> Self {
        let fields = issue.fields;
        TargetIssue {
            id: issue.id,
            project_key: fields.project.map(|p| p.key).unwrap_or_default(),
            key: issue.key,
            summary: fields.summary.unwrap_or_default(),
            description: fields.description,
            labels: fields.labels,
            components: fields.components.into_iter().map(|c| c.name).collect(),
            updated: fields.updated.as_deref().and_then(parse_jira_time),
        }
    }
}

impl From<JiraRemoteLink> for RemoteLink {
    fn from(link: JiraRemoteLink) -> Self {
        RemoteLink {
            id: Some(link.id),
            global_id: link.global_id.unwrap_or_default(),
            url: link.object.url,
            title: link.object.title,
            resolved: link.object.status.map(|s| s.resolved).unwrap_or(false),
            relationship: link.relationship.unwrap_or_default(),
        }
    }
}

fn issue_type_json(issue_type: &IssueTypeRef) -> Value {
    match issue_type {
        IssueTypeRef::Id(id) => json!({ "id": id }),
        IssueTypeRef::Name(name) => json!({ "name": name }),
    }
}

fn components_json(components: &[String]) -> Value {
    Value::Array(components.iter().map(|c| json!({ "name": c })).collect())
}

pub(crate) fn create_fields(issue: &NewIssue) -> Value {
    let mut fields = Map::new();
    fields.insert("project".into(), json!({ "key": issue.project }));
    fields.insert("summary".into(), json!(issue.summary));
    fields.insert("description".into(), json!(issue.description));
    fields.insert("issuetype".into(), issue_type_json(&issue.issue_type));
    fields.insert("labels".into(), json!(issue.labels));
    if let Some(components) = &issue.components {
        fields.insert("components".into(), components_json(components));
    }
    json!({ "fields": fields })
}

pub(crate) fn update_fields(update: &IssueUpdate) -> Value {
    let mut fields = Map::new();
    if let Some(summary) = &update.summary {
        fields.insert("summary".into(), json!(summary));
    }
    if let Some(description) = &update.description {
        fields.insert("description".into(), json!(description));
    }
    if let Some(labels) = &update.labels {
        fields.insert("labels".into(), json!(labels));
    }
    if let Some(components) = &update.components {
        fields.insert("components".into(), components_json(components));
    }
    if let Some((field, value)) = &update.select_field {
        fields.insert(field.clone(), json!({ "value": value }));
    }
    json!({ "fields": fields })
}

/// Remote link body. Fields of `existing_object` that we don't manage (icons, summary)
/// are carried over, since a PUT replaces the whole object.
fn remote_link_json(link: &RemoteLink, existing_object: Option<Value>) -> Value {
    let mut object = match existing_object {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    object.insert("url".into(), json!(link.url));
    object.insert("title".into(), json!(link.title));
    let mut status = match object.remove("status") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    status.insert("resolved".into(), json!(link.resolved));
    object.insert("status".into(), Value::Object(status));
    json!({
        "globalId": link.global_id,
        "relationship": link.relationship,
        "object": object,
    })
}

#[async_trait]
impl TargetTracker for JiraTracker {
    async fn search(&self, jql: &str) -> TrackerResult<Vec<TargetIssue>> {
        let path = format!(
            "search?jql={}&maxResults=50&fields={ISSUE_FIELDS}",
            urlencoding::encode(jql)
        );
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        let search: SearchResponse = check(resp, "JIRA search").await?.json().await?;
        Ok(search.issues.into_iter().map(TargetIssue::from).collect())
    }

    async fn get_issue(&self, key: &str) -> TrackerResult<TargetIssue> {
        let path = format!("issue/{}?fields={ISSUE_FIELDS}", urlencoding::encode(key));
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        let issue: JiraIssue = check(resp, &format!("JIRA issue {key}"))
            .await?
            .json()
            .await?;
        Ok(issue.into())
    }

    async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<TargetIssue> {
        let resp = self
            .request(reqwest::Method::POST, "issue")
            .json(&create_fields(issue))
            .send()
            .await?;
        let created: CreatedIssue = check(resp, "JIRA issue").await?.json().await?;
        self.get_issue(&created.key).await
    }

    async fn update_issue(&self, key: &str, update: &IssueUpdate) -> TrackerResult<()> {
        let resp = self
            .request(reqwest::Method::PUT, &format!("issue/{key}"))
            .json(&update_fields(update))
            .send()
            .await?;
        check(resp, &format!("JIRA issue {key}")).await?;
        Ok(())
    }

    async fn list_remote_links(&self, key: &str) -> TrackerResult<Vec<RemoteLink>> {
        let resp = self
            .request(reqwest::Method::GET, &format!("issue/{key}/remotelink"))
            .send()
            .await?;
        let links: Vec<JiraRemoteLink> = check(resp, &format!("JIRA issue {key}"))
            .await?
            .json()
            .await?;
        Ok(links.into_iter().map(RemoteLink::from).collect())
    }

    async fn add_remote_link(&self, key: &str, link: &RemoteLink) -> TrackerResult<()> {
        let resp = self
            .request(reqwest::Method::POST, &format!("issue/{key}/remotelink"))
            .json(&remote_link_json(link, None))
            .send()
            .await?;
        check(resp, &format!("JIRA issue {key}")).await?;
        Ok(())
    }

    async fn update_remote_link(&self, key: &str, link: &RemoteLink) -> TrackerResult<()> {
        // Without an id, POSTing the same globalId updates the existing link in place.
        let path = match link.id {
            Some(id) => format!("issue/{key}/remotelink/{id}"),
            None => return self.add_remote_link(key, link).await,
        };
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        let mut existing: Value = check(resp, &format!("JIRA remote link on {key}"))
            .await?
            .json()
            .await?;
        let object = existing.get_mut("object").map(Value::take);

        let resp = self
            .request(reqwest::Method::PUT, &path)
            .json(&remote_link_json(link, object))
            .send()
            .await?;
        check(resp, &format!("JIRA remote link on {key}")).await?;
        Ok(())
    }

    async fn list_comments(&self, key: &str) -> TrackerResult<Vec<TargetComment>> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("issue/{key}/comment?maxResults=1000"),
            )
            .send()
            .await?;
        let page: CommentPage = check(resp, &format!("JIRA issue {key}"))
            .await?
            .json()
            .await?;
        Ok(page
            .comments
            .into_iter()
            .map(|c| TargetComment {
                id: c.id,
                body: c.body,
            })
            .collect())
    }

    async fn add_comment(&self, key: &str, body: &str) -> TrackerResult<()> {
        let resp = self
            .request(reqwest::Method::POST, &format!("issue/{key}/comment"))
            .json(&json!({ "body": body }))
            .send()
            .await?;
        check(resp, &format!("JIRA issue {key}")).await?;
        Ok(())
    }

    async fn update_comment(&self, key: &str, comment_id: &str, body: &str) -> TrackerResult<()> {
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("issue/{key}/comment/{comment_id}"),
            )
            .json(&json!({ "body": body }))
            .send()
            .await?;
        check(resp, &format!("JIRA comment {comment_id}")).await?;
        Ok(())
    }

    async fn list_issue_types(&self) -> TrackerResult<Vec<IssueType>> {
        let resp = self.request(reqwest::Method::GET, "issuetype").send().await?;
        Ok(check(resp, "JIRA issue types").await?.json().await?)
    }

    async fn project_components(&self, project_key: &str) -> TrackerResult<Vec<String>> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("project/{}/components", urlencoding::encode(project_key)),
            )
            .send()
            .await?;
        let components: Vec<NamedField> = check(resp, &format!("JIRA project {project_key}"))
            .await?
            .json()
            .await?;
        Ok(components.into_iter().map(|c| c.name).collect())
    }
}
