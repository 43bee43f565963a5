use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub github: Option<GitHubConfig>,
    pub jira: Option<JiraConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: String,
    pub repository: String,
    #[serde(default = "default_github_api")]
    pub api_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JiraConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub project: String,
    pub component: Option<String>,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    /// Custom select field mirroring the GitHub open/closed state. An empty value in the
    /// file turns the status update off.
    #[serde(default = "default_status_field")]
    pub status_field: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_markup_command")]
    pub markup_command: String,
    #[serde(default)]
    pub skip_collaborator_prs: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            markup_command: default_markup_command(),
            skip_collaborator_prs: false,
        }
    }
}

fn default_github_api() -> String {
    "https://api.github.com".into()
}

fn default_issue_type() -> String {
    "Task".into()
}

fn default_status_field() -> Option<String> {
    Some("customfield_12100".into())
}

fn default_markup_command() -> String {
    "markdown2confluence".into()
}

fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("JIRA_SYNC_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jira-sync")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    let mut config = read_config_file(&config_path())?;
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

fn read_config_file(path: &PathBuf) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

impl AppConfig {
    /// Overlay environment variables on top of the file config. Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(repository) = var("GITHUB_REPOSITORY") {
            let gh = self.github.get_or_insert_with(|| GitHubConfig {
                token: String::new(),
                repository: String::new(),
                api_url: default_github_api(),
            });
            gh.repository = repository;
        }
        if let Some(gh) = self.github.as_mut() {
            if let Some(token) = var("GITHUB_TOKEN") {
                gh.token = token;
            }
            if let Some(api_url) = var("GITHUB_API_URL") {
                gh.api_url = api_url;
            }
        }

        let jira_vars = [
            var("JIRA_URL"),
            var("JIRA_USER"),
            var("JIRA_PASS"),
            var("JIRA_PROJECT"),
        ];
        if self.jira.is_none() && jira_vars.iter().all(Option::is_some) {
            let [url, user, password, project] = jira_vars.map(Option::unwrap_or_default);
            self.jira = Some(JiraConfig {
                url,
                user,
                password,
                project,
                component: None,
                issue_type: default_issue_type(),
                status_field: default_status_field(),
            });
        } else if let Some(jira) = self.jira.as_mut() {
            let [url, user, password, project] = jira_vars;
            if let Some(url) = url {
                jira.url = url;
            }
            if let Some(user) = user {
                jira.user = user;
            }
            if let Some(password) = password {
                jira.password = password;
            }
            if let Some(project) = project {
                jira.project = project;
            }
        }
        if let Some(jira) = self.jira.as_mut() {
            if let Some(component) = var("JIRA_COMPONENT") {
                jira.component = Some(component);
            }
            if let Some(issue_type) = var("JIRA_ISSUE_TYPE") {
                jira.issue_type = issue_type;
            }
            if let Some(field) = var("JIRA_STATUS_FIELD") {
                jira.status_field = Some(field);
            }
            jira.component = jira.component.take().filter(|c| !c.trim().is_empty());
            jira.status_field = jira.status_field.take().filter(|f| !f.trim().is_empty());
        }
    }
}
