mod cli;
mod config;
mod event;
mod logging;
mod model;
mod providers;
mod sync;
mod util;

use anyhow::Result;
use tracing::info;

use cli::Command;
use providers::github::GitHubTracker;
use providers::jira::JiraTracker;
use sync::{Mirror, Settings};
use util::clock::TokioClock;
use util::markup::Markdown2Confluence;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse_args(&args)?;
    if command == Command::Help {
        cli::print_help();
        return Ok(());
    }

    logging::init()?;

    let config = config::load_config()?;
    let Some((github, jira)) = cli::run_context(&config)? else {
        return Ok(());
    };

    let Some(event) = command.into_event(|name| std::env::var(name).ok())? else {
        info!("event is not one that is mirrored, nothing to do");
        return Ok(());
    };

    let mirror = Mirror::new(
        Box::new(GitHubTracker::new(github)),
        Box::new(JiraTracker::new(jira)),
        Box::new(Markdown2Confluence::new(config.sync.markup_command.clone())),
        Box::new(TokioClock),
        Settings::new(jira, &config.sync),
    );
    mirror.handle(event).await
}
