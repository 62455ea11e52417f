//! 消息组装 - 构建上下文 + 策略结果 + 配置 → `Message`
//!
//! 组装永远不会失败：缺失的部分（提交、自定义消息、mention）直接省略。

use super::mention;
use super::message::{Color, Message};
use super::policy::Framing;
use crate::build::{BuildContext, CommitEntry, Outcome};
use crate::config::{CommitInfoChoice, NotificationConfig};

/// 结果文案
pub mod phrase {
    pub const STARTED: &str = "Build started";
    pub const SUCCESS: &str = "Success";
    pub const FAILURE: &str = "Failure";
    pub const UNSTABLE: &str = "Unstable";
    pub const ABORTED: &str = "Aborted";
    pub const NOT_BUILT: &str = "Not built";
    pub const BACK_TO_NORMAL: &str = "Back to normal";
    pub const STILL_FAILING: &str = "Still failing";
}

/// 组装最终消息
pub fn compose(context: &BuildContext, framing: Framing, config: &NotificationConfig) -> Message {
    let mut text = mention_prefix(context, config);
    text.push_str(&base_text(context, framing, config));

    if framing != Framing::Start && config.include_test_summary {
        if let Some(summary) = &context.test_summary {
            text.push_str(&format!(
                "\nTest Status: Passed: {}, Failed: {}, Skipped: {}",
                summary.passed, summary.failed, summary.skipped
            ));
        }
    }

    if config.include_custom_message && !config.custom_message.trim().is_empty() {
        text.push('\n');
        text.push_str(&config.custom_message);
    }

    let message = Message::new(text, color_for(context.outcome, framing, config));
    match commit_summary(&context.commits, config.commit_info_choice) {
        Some(summary) => message.with_attachment(summary),
        None => message,
    }
}

/// 颜色映射
pub fn color_for(outcome: Outcome, framing: Framing, config: &NotificationConfig) -> Color {
    match framing {
        Framing::Start => Color::None,
        Framing::BackToNormal => Color::Good,
        Framing::RepeatedFailure if config.repeated_failure_as_warning => Color::Warning,
        Framing::RepeatedFailure => Color::Danger,
        Framing::Normal => match outcome {
            Outcome::Success => Color::Good,
            Outcome::Unstable => Color::Warning,
            Outcome::Failure | Outcome::Aborted => Color::Danger,
            Outcome::NotBuilt | Outcome::Started => Color::None,
        },
    }
}

fn outcome_phrase(outcome: Outcome, framing: Framing) -> &'static str {
    match framing {
        Framing::Start => phrase::STARTED,
        Framing::BackToNormal => phrase::BACK_TO_NORMAL,
        Framing::RepeatedFailure => phrase::STILL_FAILING,
        Framing::Normal => match outcome {
            Outcome::Started => phrase::STARTED,
            Outcome::Success => phrase::SUCCESS,
            Outcome::Failure => phrase::FAILURE,
            Outcome::Unstable => phrase::UNSTABLE,
            Outcome::Aborted => phrase::ABORTED,
            Outcome::NotBuilt => phrase::NOT_BUILT,
        },
    }
}

/// `<job> - #<build> <phrase> (<url>)`
fn base_text(context: &BuildContext, framing: Framing, config: &NotificationConfig) -> String {
    let mut text = format!(
        "{} - #{} {}",
        context.job_name,
        context.build_number,
        outcome_phrase(context.outcome, framing)
    );
    let url = build_url(&context.url, &config.build_server_url);
    if !url.is_empty() {
        text.push_str(&format!(" ({})", url));
    }
    text
}

/// 相对构建 URL 拼接到 build server URL 上（两边的 `/` 都会规整）
fn build_url(url: &str, server_url: &str) -> String {
    if url.is_empty() || url.contains("://") || server_url.is_empty() {
        return url.to_string();
    }
    format!(
        "{}/{}",
        server_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

fn mention_prefix(context: &BuildContext, config: &NotificationConfig) -> String {
    if !config.include_mention || config.mention_list.is_empty() {
        return String::new();
    }
    mention::resolve(&config.mention_list, context)
        .iter()
        .map(|handle| format!("@{} ", handle))
        .collect()
}

/// 按配置生成提交摘要；没有提交时返回 `None`
pub fn commit_summary(commits: &[CommitEntry], choice: CommitInfoChoice) -> Option<String> {
    if commits.is_empty() {
        return None;
    }

    match choice {
        CommitInfoChoice::None => None,
        CommitInfoChoice::Authors => {
            let mut authors: Vec<&str> = Vec::new();
            for commit in commits {
                if !authors.contains(&commit.author.as_str()) {
                    authors.push(&commit.author);
                }
            }
            Some(authors.join(", "))
        }
        CommitInfoChoice::AuthorsAndTitles => Some(
            commits
                .iter()
                .map(|c| format!("{}: {}", c.author, c.title))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        CommitInfoChoice::AuthorsAndPaths => {
            let mut lines = Vec::new();
            for commit in commits {
                lines.push(format!("{}: {}", commit.author, commit.title));
                lines.extend(commit.paths.iter().map(|p| format!("  - {}", p)));
            }
            Some(lines.join("\n"))
        }
    }
}
