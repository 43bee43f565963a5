use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::{AppConfig, GitHubConfig, JiraConfig};
use crate::event::SyncEvent;

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Handle the event GitHub Actions started this run for.
    FromEnvironment,
    /// Mirror the listed issue or PR numbers.
    Sync(String),
    Reconcile,
    Help,
}

/// Parse arguments after the binary name.
///
/// Supported forms:
///   jira-sync
///   jira-sync sync 12 15
///   jira-sync sync "12, 15"
///   jira-sync reconcile
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::FromEnvironment);
    };
    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "sync" => {
            let numbers = args[1..].join(" ");
            if numbers.trim().is_empty() {
                bail!("Usage: jira-sync sync <issue numbers>\n\nExample:\n  jira-sync sync 12 15");
            }
            Ok(Command::Sync(numbers))
        }
        "reconcile" => {
            if args.len() > 1 {
                bail!("reconcile takes no arguments");
            }
            Ok(Command::Reconcile)
        }
        other => bail!("Unknown command '{other}'. Run `jira-sync --help` for usage."),
    }
}

/// Read the event GitHub Actions describes through `GITHUB_EVENT_NAME` and
/// `GITHUB_EVENT_PATH`. `Ok(None)` for events the mirror ignores.
pub fn event_from_environment(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<SyncEvent>> {
    let name = lookup("GITHUB_EVENT_NAME").context("GITHUB_EVENT_NAME is not set")?;
    let path = lookup("GITHUB_EVENT_PATH")
        .map(PathBuf::from)
        .context("GITHUB_EVENT_PATH is not set")?;
    let payload = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read event payload from {}", path.display()))?;
    SyncEvent::from_webhook(&name, &payload)
}

/// The GitHub and JIRA settings a run needs. `Ok(None)` when there is no GitHub
/// repository configured, i.e. we are not inside a GitHub Actions run.
pub fn run_context(config: &AppConfig) -> Result<Option<(&GitHubConfig, &JiraConfig)>> {
    let Some(github) = config.github.as_ref() else {
        info!("Not running in GitHub action context, nothing to do");
        return Ok(None);
    };
    let jira = config
        .jira
        .as_ref()
        .context("JIRA is not configured: set JIRA_URL, JIRA_USER, JIRA_PASS and JIRA_PROJECT")?;
    Ok(Some((github, jira)))
}

impl Command {
    pub fn into_event(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<SyncEvent>> {
        match self {
            Command::FromEnvironment => event_from_environment(lookup),
            Command::Sync(issue_numbers) => Ok(Some(SyncEvent::ManualSync { issue_numbers })),
            Command::Reconcile => Ok(Some(SyncEvent::Reconcile)),
            Command::Help => Ok(None),
        }
    }
}

pub fn print_help() {
    println!("jira-sync: mirror GitHub issues and pull requests into JIRA\n");
    println!("USAGE:");
    println!("  jira-sync                 Handle the current GitHub Actions event");
    println!("  jira-sync sync <numbers>  Mirror the given issue/PR numbers");
    println!("  jira-sync reconcile       Create JIRA issues for every unsynced open issue/PR");
    println!();
    println!("ENVIRONMENT:");
    println!("  GITHUB_TOKEN, GITHUB_REPOSITORY, GITHUB_EVENT_NAME, GITHUB_EVENT_PATH");
    println!("  JIRA_URL, JIRA_USER, JIRA_PASS, JIRA_PROJECT");
    println!("  JIRA_COMPONENT, JIRA_ISSUE_TYPE, JIRA_STATUS_FIELD (optional)");
    println!("  JIRA_SYNC_CONFIG     Config file path");
    println!("  JIRA_SYNC_LOG_FORMAT Set to 'json' for JSON logs");
}
