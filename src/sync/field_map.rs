//! Pure mapping from GitHub issue data to JIRA field values.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, warn};

use super::Mirror;
use crate::model::source::{SourceComment, SourceIssue};
use crate::model::target::{IssueType, IssueTypeRef, TargetIssue};

/// Type ids of the two issue types that some repos label with non-standard names.
pub const NEW_FEATURE_TYPE_ID: &str = "10101";
pub const BUG_TYPE_ID: &str = "10004";

const RESERVED_LABEL_PREFIXES: [&str; 2] = ["status:", "resolution:"];

static KEY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s*\(\w+-\d+\))+\s*$").expect("valid key suffix regex"));

/// `GH #12: title` or `PR #12: title`, without any ` (KEY-123)` suffixes on the title.
///
/// Any key-shaped suffix is dropped, not just the configured project's, since the
/// JIRA issue may have moved projects since the title was amended.
pub fn summary(issue: &SourceIssue) -> String {
    let prefix = if issue.is_pull_request { "PR" } else { "GH" };
    let title = KEY_SUFFIX.replace(&issue.title, "");
    format!("{prefix} #{}: {title}", issue.number)
}

/// Full description text. `body` is the already converted issue body.
pub fn description(issue: &SourceIssue, body: &str) -> String {
    let kind = if issue.is_pull_request {
        "Pull Request"
    } else {
        "Issue"
    };
    let mut text = format!(
        "[GitHub {kind}|{url}] from user @{author}:\n\
         \n    {body}\n\
         \n    ---\n\
         \n    Notes:\n\
         \n    * Do not edit this description text, it may be updated automatically.\n    \
         * Please interact on GitHub where possible, changes will sync to here.\n    ",
        url = issue.url,
        author = issue.author,
    );
    if !issue.is_pull_request {
        text.push_str(&format!(
            "\n    * If closing this issue from a commit, please add\n      \
             {{code}}\n      \
             Closes {url}\n      \
             {{code}}\n      \
             in the commit message so the commit is closed on GitHub automatically.\n",
            url = issue.url,
        ));
    }
    text
}

/// JIRA labels cannot contain spaces.
pub fn label(name: &str) -> String {
    name.replace(' ', "-")
}

/// Labels mirrored from JIRA back to GitHub; never pushed the other way.
pub fn is_reserved_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    RESERVED_LABEL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Map the first label that names an issue type. Only valid at creation time:
/// JIRA treats changing the type of an existing issue as unsafe.
pub fn issue_type(labels: &[String], types: &[IssueType]) -> Option<IssueTypeRef> {
    for gh_label in labels {
        match gh_label.as_str() {
            "Type: Feature Request" => {
                info!(label = %gh_label, "mapping label to New Feature issue type");
                return Some(IssueTypeRef::Id(NEW_FEATURE_TYPE_ID.into()));
            }
            "Type: Bug :bug:" => {
                info!(label = %gh_label, "mapping label to Bug issue type");
                return Some(IssueTypeRef::Id(BUG_TYPE_ID.into()));
            }
            _ => {}
        }
        let wanted = gh_label.to_lowercase();
        for issue_type in types {
            let name = issue_type.name.to_lowercase();
            if wanted == name || wanted == format!("type: {name}") {
                info!(label = %gh_label, issue_type = %issue_type.name, "mapping label to issue type");
                return Some(IssueTypeRef::Id(issue_type.id.clone()));
            }
        }
    }
    None
}

/// The configured component plus whatever the existing issue already has.
pub fn merge_components(configured: &str, existing: Option<&TargetIssue>) -> Vec<String> {
    let mut components = vec![configured.to_string()];
    if let Some(existing) = existing {
        components.extend(
            existing
                .components
                .iter()
                .filter(|c| c.as_str() != configured)
                .cloned(),
        );
    }
    components
}

/// Text that identifies a mirrored comment. Edits are matched by recomputing this
/// from the previous body, so the format has to stay stable.
pub fn fingerprint(comment: &SourceComment, body: &str) -> String {
    format!(
        "[GitHub issue comment|{}] by @{}:\n\n{body}",
        comment.url, comment.author
    )
}

pub fn audit_comment(issue: &SourceIssue, verb: &str, user: &str) -> String {
    format!(
        "The [GitHub {}|{}] has been {verb} by @{user}",
        issue.kind(),
        issue.url
    )
}

pub fn comment_deleted(comment: &SourceComment) -> String {
    format!(
        "@{} deleted [GitHub issue comment|{}]",
        comment.author, comment.url
    )
}

impl Mirror {
    /// Components field for a create or update, or `None` to leave it alone.
    ///
    /// The component is checked against the project the issue lives in now, which
    /// can differ from the configured project once an issue has been moved.
    pub(crate) async fn components_field(
        &self,
        existing: Option<&TargetIssue>,
    ) -> Result<Option<Vec<String>>> {
        let Some(configured) = self.settings.component.as_deref() else {
            debug!("no component configured, not updating components field");
            return Ok(None);
        };
        let project = existing
            .map(|i| i.project_key.as_str())
            .filter(|k| !k.is_empty())
            .unwrap_or(self.settings.project.as_str());
        let available = self.target.project_components(project).await?;
        if !available.iter().any(|c| c == configured) {
            warn!(
                project,
                component = configured,
                "JIRA project doesn't contain the configured component, not updating components field"
            );
            return Ok(None);
        }
        Ok(Some(merge_components(configured, existing)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fake::source_issue;

    fn types() -> Vec<IssueType> {
        vec![
            IssueType {
                id: "1".into(),
                name: "Task".into(),
            },
            IssueType {
                id: "2".into(),
                name: "Bug".into(),
            },
        ]
    }

    #[test]
    fn summary_for_issue_and_pr() {
        let mut issue = source_issue(42, "Crash on boot");
        assert_eq!(summary(&issue), "GH #42: Crash on boot");
        issue.is_pull_request = true;
        assert_eq!(summary(&issue), "PR #42: Crash on boot");
    }

    #[test]
    fn summary_strips_key_suffix() {
        let issue = source_issue(42, "Crash on boot (PROJ-101)");
        assert_eq!(summary(&issue), "GH #42: Crash on boot");
    }

    #[test]
    fn summary_strips_accumulated_suffixes() {
        let issue = source_issue(42, "Crash on boot (PROJ-101) (OTHER-7)");
        assert_eq!(summary(&issue), "GH #42: Crash on boot");
    }

    #[test]
    fn summary_keeps_non_key_parentheses() {
        let issue = source_issue(1, "Fails (sometimes) on ESP32");
        assert_eq!(summary(&issue), "GH #1: Fails (sometimes) on ESP32");
    }

    #[test]
    fn summary_is_stable_across_title_amends() {
        let mut issue = source_issue(42, "Crash on boot");
        let first = summary(&issue);
        issue.title = format!("{} (PROJ-101)", issue.title);
        let second = summary(&issue);
        issue.title = format!("{} (PROJ-101)", issue.title);
        assert_eq!(first, second);
        assert_eq!(second, summary(&issue));
    }

    #[test]
    fn description_is_deterministic_and_mentions_source() {
        let issue = source_issue(3, "t");
        let a = description(&issue, "converted body");
        let b = description(&issue, "converted body");
        assert_eq!(a, b);
        assert!(a.starts_with(&format!("[GitHub Issue|{}] from user @reporter:", issue.url)));
        assert!(a.contains("converted body"));
        assert!(a.contains(&format!("Closes {}", issue.url)));
    }

    #[test]
    fn description_layout_matches_existing_issues() {
        let issue = source_issue(3, "t");
        assert_eq!(
            description(&issue, "h1. Body"),
            format!(
                "[GitHub Issue|{url}] from user @reporter:\n\
                 \n    h1. Body\n\
                 \n    ---\n\
                 \n    Notes:\n\
                 \n    * Do not edit this description text, it may be updated automatically.\n\
                 \x20   * Please interact on GitHub where possible, changes will sync to here.\n\
                 \x20   \n\
                 \x20   * If closing this issue from a commit, please add\n\
                 \x20     {{code}}\n\
                 \x20     Closes {url}\n\
                 \x20     {{code}}\n\
                 \x20     in the commit message so the commit is closed on GitHub automatically.\n",
                url = issue.url
            )
        );
    }

    #[test]
    fn pr_description_has_no_closing_instructions() {
        let mut issue = source_issue(3, "t");
        issue.is_pull_request = true;
        let text = description(&issue, "body");
        assert!(text.starts_with("[GitHub Pull Request|"));
        assert!(!text.contains("Closes"));
    }

    #[test]
    fn labels_replace_spaces() {
        assert_eq!(label("good first issue"), "good-first-issue");
        assert_eq!(label("bug"), "bug");
    }

    #[test]
    fn reserved_prefixes_any_case() {
        assert!(is_reserved_label("Status:Opened"));
        assert!(is_reserved_label("RESOLUTION:-Done"));
        assert!(is_reserved_label("status:"));
        assert!(!is_reserved_label("bug"));
        assert!(!is_reserved_label("my-status:x"));
    }

    #[test]
    fn issue_type_by_name_or_prefixed_name() {
        assert_eq!(
            issue_type(&["bug".into()], &types()),
            Some(IssueTypeRef::Id("2".into()))
        );
        assert_eq!(
            issue_type(&["Type: Task".into()], &types()),
            Some(IssueTypeRef::Id("1".into()))
        );
        assert_eq!(issue_type(&["help wanted".into()], &types()), None);
        assert_eq!(issue_type(&[], &types()), None);
    }

    #[test]
    fn issue_type_special_labels() {
        assert_eq!(
            issue_type(&["Type: Feature Request".into()], &types()),
            Some(IssueTypeRef::Id(NEW_FEATURE_TYPE_ID.into()))
        );
        assert_eq!(
            issue_type(&["Type: Bug :bug:".into()], &types()),
            Some(IssueTypeRef::Id(BUG_TYPE_ID.into()))
        );
    }

    #[test]
    fn issue_type_first_matching_label_wins() {
        let labels = vec!["help wanted".into(), "Type: Task".into(), "bug".into()];
        assert_eq!(
            issue_type(&labels, &types()),
            Some(IssueTypeRef::Id("1".into()))
        );
    }

    #[test]
    fn merge_keeps_existing_without_duplicating_configured() {
        let existing = TargetIssue {
            id: "1".into(),
            key: "PROJ-1".into(),
            project_key: "PROJ".into(),
            summary: String::new(),
            description: None,
            labels: vec![],
            components: vec!["Firmware".into(), "Docs".into()],
            updated: None,
        };
        assert_eq!(
            merge_components("Firmware", Some(&existing)),
            vec!["Firmware", "Docs"]
        );
        assert_eq!(merge_components("Firmware", None), vec!["Firmware"]);
    }

    #[test]
    fn fingerprint_embeds_url_and_author() {
        let comment = SourceComment {
            id: 9,
            url: "https://github.com/acme/widgets/issues/1#issuecomment-9".into(),
            author: "alice".into(),
            body: Some("hi".into()),
        };
        assert_eq!(
            fingerprint(&comment, "hi"),
            "[GitHub issue comment|https://github.com/acme/widgets/issues/1#issuecomment-9] by @alice:\n\nhi"
        );
        assert_eq!(
            comment_deleted(&comment),
            "@alice deleted [GitHub issue comment|https://github.com/acme/widgets/issues/1#issuecomment-9]"
        );
    }

    #[test]
    fn audit_comment_names_kind() {
        let mut issue = source_issue(5, "t");
        assert_eq!(
            audit_comment(&issue, "closed", "bob"),
            format!("The [GitHub issue|{}] has been closed by @bob", issue.url)
        );
        issue.is_pull_request = true;
        assert!(audit_comment(&issue, "reopened", "bob").starts_with("The [GitHub PR|"));
    }
}
