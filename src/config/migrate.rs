//! 旧版 job 配置迁移
//!
//! 旧版把连接信息和开关放在 job property 里，并且只有 `showCommitList` 一个提交开关。
//! 迁移是纯函数，由外部启动流程调用一次；重复调用结果不变。

use serde::{Deserialize, Serialize};

use super::{CommitInfoChoice, JobConfig, NotifyFlags};

/// 旧版 job property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyJobProperty {
    pub team_domain: String,
    pub token: String,
    pub room: String,
    #[serde(flatten)]
    pub flags: NotifyFlags,
    pub include_test_summary: bool,
    pub show_commit_list: bool,
    pub include_custom_message: bool,
    pub custom_message: String,
}

/// 把旧版配置合并进当前 job 配置
///
/// 连接字段只在当前值为空时才使用旧值；开关、测试汇总和自定义消息以旧版为准；
/// mention 一律关闭。
pub fn migrate(legacy: &LegacyJobProperty, current: &JobConfig) -> JobConfig {
    let fill = |value: &str, old: &str| {
        if value.trim().is_empty() {
            old.to_string()
        } else {
            value.to_string()
        }
    };

    JobConfig {
        team_domain: fill(&current.team_domain, &legacy.team_domain),
        auth_token: fill(&current.auth_token, &legacy.token),
        room: fill(&current.room, &legacy.room),
        flags: legacy.flags,
        include_test_summary: legacy.include_test_summary,
        commit_info_choice: if legacy.show_commit_list {
            CommitInfoChoice::AuthorsAndTitles
        } else {
            CommitInfoChoice::None
        },
        include_custom_message: legacy.include_custom_message,
        custom_message: legacy.custom_message.clone(),
        include_mention: false,
        mention_list: Vec::new(),
        ..current.clone()
    }
}
