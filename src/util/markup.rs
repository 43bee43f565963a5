use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::warn;

/// JIRA rejects text fields over 32KB in total, so cap any single body at half that.
const MAX_BODY_CHARS: usize = 16384;
const TRUNCATED_CHARS: usize = 16376;

/// Markdown to JIRA wiki markup.
#[async_trait]
pub trait MarkupConverter: Send + Sync {
    async fn convert(&self, markdown: Option<&str>) -> String;
}

/// Shells out to `markdown2confluence <in.md> <out.txt>`.
pub struct Markdown2Confluence {
    command: String,
}

impl Markdown2Confluence {
    pub fn new(command: String) -> Self {
        Self { command }
    }

    async fn run(&self, markdown: &str) -> Result<String> {
        let dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let md_path = dir.path().join("markdown.md");
        let out_path = dir.path().join("confluence.txt");

        let mut input = markdown.to_string();
        if !input.ends_with('\n') {
            input.push('\n');
        }
        tokio::fs::write(&md_path, input).await?;

        let output = tokio::process::Command::new(&self.command)
            .arg(&md_path)
            .arg(&out_path)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {stderr}", self.command, output.status);
        }

        let converted = tokio::fs::read_to_string(&out_path)
            .await
            .context("Failed to read converter output")?;
        Ok(converted)
    }
}

#[async_trait]
impl MarkupConverter for Markdown2Confluence {
    async fn convert(&self, markdown: Option<&str>) -> String {
        let Some(markdown) = markdown else {
            return "\n".into();
        };
        match self.run(markdown).await {
            Ok(converted) => limit_length(converted),
            Err(e) => {
                warn!(error = %e, "markdown conversion failed, JIRA will get raw markdown");
                markdown.to_string()
            }
        }
    }
}

/// Truncate oversized text, leaving newlines to close any open formatting block.
pub fn limit_length(text: String) -> String {
    if text.chars().count() <= MAX_BODY_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(TRUNCATED_CHARS).collect();
    cut.push_str("\n\n[...]");
    cut
}

#[cfg(test)]
pub struct Passthrough;

#[cfg(test)]
#[async_trait]
impl MarkupConverter for Passthrough {
    async fn convert(&self, markdown: Option<&str>) -> String {
        markdown.map(String::from).unwrap_or_else(|| "\n".into())
    }
}
