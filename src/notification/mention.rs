//! Mention 解析 - 把配置的 mention token 转成聊天账号

use super::delivery::ChatUser;
use crate::build::BuildContext;

/// 触发构建的用户
pub const TRIGGERING_USER_TOKEN: &str = "$triggering_user";
/// Pull request 作者
pub const PR_AUTHOR_TOKEN: &str = "$pr_author";

/// 把 token 列表解析成 handle（不带 `@`）
///
/// 顺序与输入一致，重复项保留。无法解析的特殊 token 直接丢弃。
pub fn resolve(tokens: &[String], context: &BuildContext) -> Vec<String> {
    tokens
        .iter()
        .filter_map(|token| resolve_token(token.trim(), context))
        .collect()
}

fn resolve_token(token: &str, context: &BuildContext) -> Option<String> {
    match token {
        "" => None,
        TRIGGERING_USER_TOKEN => non_empty(&context.triggering_user),
        PR_AUTHOR_TOKEN => context.pull_request_author.as_deref().and_then(non_empty),
        // channel / here / 普通账号原样通过
        literal => non_empty(literal.trim_start_matches('@')),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// 配置界面使用的候选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionSuggestion {
    pub label: String,
    pub value: String,
}

impl MentionSuggestion {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// 固定候选项 + 目录中未删除的用户
pub fn suggestions(users: &[ChatUser]) -> Vec<MentionSuggestion> {
    let mut items = vec![
        MentionSuggestion::new("[ job triggering user ]", TRIGGERING_USER_TOKEN),
        MentionSuggestion::new("[ pull request author ]", PR_AUTHOR_TOKEN),
        MentionSuggestion::new("@channel", "channel"),
        MentionSuggestion::new("@here", "here"),
    ];
    items.extend(
        users
            .iter()
            .filter(|u| !u.deleted)
            .map(|u| MentionSuggestion::new(format!("@{}", u.name), u.name.clone())),
    );
    items
}
