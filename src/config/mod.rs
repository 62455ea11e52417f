//! 配置层 - 单个 job 的配置 + 全局默认值 → 生效配置
//!
//! 配置由外部系统持有，这里只负责：
//! 1. 从 JSON 文件加载（`JobConfig::load` / `GlobalConfig::load_from`）
//! 2. 空值回退到全局默认（`resolve`）
//! 3. 旧版配置迁移（`migrate`）
//!
//! 通知核心只读取 `NotificationConfig`，从不修改它。

pub mod migrate;

pub use migrate::{migrate, LegacyJobProperty};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认 API 地址（API token 模式）
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// 提交信息的详细程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitInfoChoice {
    #[default]
    None,
    Authors,
    AuthorsAndTitles,
    AuthorsAndPaths,
}

/// 各类结果的通知开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyFlags {
    pub start_notification: bool,
    pub notify_success: bool,
    pub notify_failure: bool,
    pub notify_aborted: bool,
    pub notify_not_built: bool,
    pub notify_unstable: bool,
    pub notify_back_to_normal: bool,
    pub notify_repeated_failure: bool,
}

/// 单个 job 的配置（原样保存，字段可为空）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobConfig {
    pub team_domain: String,
    pub auth_token: String,
    pub api_token: String,
    pub room: String,
    pub build_server_url: String,
    pub send_as: String,
    pub icon_emoji: Option<String>,
    #[serde(flatten)]
    pub flags: NotifyFlags,
    /// 连续失败时使用 warning 颜色（默认 danger）
    pub repeated_failure_as_warning: bool,
    pub include_test_summary: bool,
    pub commit_info_choice: CommitInfoChoice,
    pub include_custom_message: bool,
    pub custom_message: String,
    pub include_mention: bool,
    pub mention_list: Vec<String>,
}

impl JobConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read job config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid job config {}", path.display()))
    }
}

/// 全局默认配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    pub team_domain: String,
    pub token: String,
    pub api_token: String,
    pub room: String,
    pub build_server_url: String,
    pub send_as: String,
    /// API 地址（自建服务或测试时覆盖）
    pub api_base_url: Option<String>,
    /// Webhook 地址（覆盖 `https://<team>.slack.com/...`）
    pub webhook_url: Option<String>,
}

impl GlobalConfig {
    /// 默认路径 `~/.config/build-notifier/global.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config/build-notifier/global.json"))
    }

    /// 从指定文件加载；文件不存在时返回空配置
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Global config not found, using empty defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read global config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid global config {}", path.display()))
    }

    /// 从默认路径加载
    pub fn auto_load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }
}

/// 生效配置 - 通知核心唯一读取的配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationConfig {
    pub team_domain: String,
    pub auth_token: String,
    pub api_token: String,
    pub room: String,
    pub build_server_url: String,
    pub send_as: String,
    pub icon_emoji: Option<String>,
    pub api_base_url: String,
    pub webhook_url: Option<String>,
    pub flags: NotifyFlags,
    pub repeated_failure_as_warning: bool,
    pub include_test_summary: bool,
    pub commit_info_choice: CommitInfoChoice,
    pub include_custom_message: bool,
    pub custom_message: String,
    pub include_mention: bool,
    pub mention_list: Vec<String>,
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// 补全末尾的 `/`，方便拼接相对构建 URL
fn normalize_server_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// 合并 job 配置和全局默认值
///
/// job 上为空的连接字段（team domain / token / room / API token / server URL / sendAs）
/// 使用全局值，其余字段原样保留。
pub fn resolve(job: &JobConfig, global: &GlobalConfig) -> NotificationConfig {
    NotificationConfig {
        team_domain: or_default(&job.team_domain, &global.team_domain),
        auth_token: or_default(&job.auth_token, &global.token),
        api_token: or_default(&job.api_token, &global.api_token),
        room: or_default(&job.room, &global.room),
        build_server_url: normalize_server_url(&or_default(
            &job.build_server_url,
            &global.build_server_url,
        )),
        send_as: or_default(&job.send_as, &global.send_as),
        icon_emoji: job.icon_emoji.clone().filter(|e| !e.is_empty()),
        api_base_url: global
            .api_base_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        webhook_url: global.webhook_url.clone().filter(|u| !u.is_empty()),
        flags: job.flags,
        repeated_failure_as_warning: job.repeated_failure_as_warning,
        include_test_summary: job.include_test_summary,
        commit_info_choice: job.commit_info_choice,
        include_custom_message: job.include_custom_message,
        custom_message: job.custom_message.clone(),
        include_mention: job.include_mention,
        mention_list: job.mention_list.clone(),
    }
}
