//! 投递客户端 - 把消息 POST 到聊天 webhook
//!
//! 两种模式：
//! - 配置了 API token：`<api_base>/chat.postMessage`，`Authorization: Bearer`
//! - 否则：`https://<team>.slack.com/services/hooks/jenkins-ci?token=<token>`（可被 `webhook_url` 覆盖）
//!
//! 所有失败都在这里吸收：`publish` 只返回 bool，`list_users` 失败时返回空列表。

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::message::{Color, Message};
use crate::config::NotificationConfig;

/// 请求超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// 重试前等待（毫秒）
pub const DEFAULT_RETRY_DELAY_MS: u64 = 250;

/// 首次发送 + 一次重试
const MAX_ATTEMPTS: u32 = 2;

/// 未配置 sendAs 时的显示名
const DEFAULT_USERNAME: &str = "build-notifier";

/// 聊天目录中的用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

/// users.list 响应
#[derive(Debug, Deserialize)]
struct UsersListResponse {
    ok: bool,
    #[serde(default)]
    members: Vec<ChatUser>,
    #[serde(default)]
    error: Option<String>,
}

/// Webhook 请求载荷
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    pub attachments: Vec<AttachmentPayload>,
}

/// 附件（颜色条 + 提交摘要）
#[derive(Debug, Serialize)]
pub struct AttachmentPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub fallback: String,
}

impl WebhookPayload {
    pub fn new(message: &Message, room: Option<&str>, config: &NotificationConfig) -> Self {
        let username = if config.send_as.trim().is_empty() {
            DEFAULT_USERNAME.to_string()
        } else {
            config.send_as.clone()
        };

        Self {
            text: message.text.clone(),
            channel: room.map(|r| r.to_string()),
            username,
            icon_emoji: config.icon_emoji.clone(),
            attachments: vec![AttachmentPayload {
                color: message.color.attachment_color(),
                text: message.attachment.clone(),
                fallback: message.text.clone(),
            }],
        }
    }
}

/// 发送目标
#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    /// API 模式，Bearer 认证
    Api { url: String, token: String },
    /// Webhook 模式，token 放在 query 参数里
    Webhook { url: String, token: Option<String> },
}

impl Endpoint {
    fn from_config(config: &NotificationConfig) -> Option<Self> {
        if !config.api_token.is_empty() {
            return Some(Endpoint::Api {
                url: format!("{}/chat.postMessage", config.api_base_url.trim_end_matches('/')),
                token: config.api_token.clone(),
            });
        }

        let token = Some(config.auth_token.clone()).filter(|t| !t.is_empty());
        if let Some(url) = &config.webhook_url {
            return Some(Endpoint::Webhook {
                url: url.clone(),
                token,
            });
        }

        if config.team_domain.is_empty() || token.is_none() {
            return None;
        }
        Some(Endpoint::Webhook {
            url: format!(
                "https://{}.slack.com/services/hooks/jenkins-ci",
                config.team_domain
            ),
            token,
        })
    }

    fn url(&self) -> &str {
        match self {
            Endpoint::Api { url, .. } | Endpoint::Webhook { url, .. } => url,
        }
    }
}

/// 投递客户端
#[derive(Debug)]
pub struct DeliveryClient {
    client: reqwest::blocking::Client,
    retry_delay: Duration,
    room_separator: Regex,
}

impl DeliveryClient {
    /// 使用默认超时和重试间隔
    pub fn new() -> Result<Self> {
        Self::with_settings(
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        )
    }

    pub fn with_settings(timeout: Duration, retry_delay: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;

        Ok(Self {
            client,
            retry_delay,
            room_separator: Regex::new(r"[,; ]+")?,
        })
    }

    /// 拆分多个 room（逗号、分号、空格分隔）
    fn rooms<'a>(&self, room: &'a str) -> Vec<&'a str> {
        self.room_separator
            .split(room.trim())
            .filter(|r| !r.is_empty())
            .collect()
    }

    /// 发送消息，所有 room 都成功才返回 true
    ///
    /// 每个 room 失败后重试一次；失败只记录日志，不向调用方抛错。
    pub fn publish(&self, message: &Message, config: &NotificationConfig) -> bool {
        let Some(endpoint) = Endpoint::from_config(config) else {
            warn!("No delivery endpoint configured (need API token, or team domain + token)");
            return false;
        };

        let rooms = self.rooms(&config.room);
        if rooms.is_empty() {
            let payload = WebhookPayload::new(message, None, config);
            return self.post_with_retry(&endpoint, &payload, "<default>");
        }

        let mut all_sent = true;
        for room in rooms {
            let payload = WebhookPayload::new(message, Some(room), config);
            if !self.post_with_retry(&endpoint, &payload, room) {
                all_sent = false;
            }
        }
        all_sent
    }

    fn post_with_retry(&self, endpoint: &Endpoint, payload: &WebhookPayload, room: &str) -> bool {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.post_once(endpoint, payload) {
                Ok(()) => {
                    info!(room = %room, attempt, "Notification delivered");
                    return true;
                }
                Err(e) => {
                    warn!(room = %room, attempt, error = %e, "Notification delivery failed");
                    if attempt < MAX_ATTEMPTS && !self.retry_delay.is_zero() {
                        std::thread::sleep(self.retry_delay);
                    }
                }
            }
        }

        error!(
            room = %room,
            url = %endpoint.url(),
            "Giving up on notification after {} attempts",
            MAX_ATTEMPTS
        );
        false
    }

    fn post_once(&self, endpoint: &Endpoint, payload: &WebhookPayload) -> Result<()> {
        let request = match endpoint {
            Endpoint::Api { url, token } => self.client.post(url).bearer_auth(token),
            Endpoint::Webhook { url, token } => {
                let request = self.client.post(url);
                match token {
                    Some(token) => request.query(&[("token", token)]),
                    None => request,
                }
            }
        };

        let response = request
            .json(payload)
            .send()
            .context("HTTP request failed")?;

        let status = response.status();
        let body = response.text().context("Failed to read response body")?;
        debug!(status = %status, body_len = body.len(), "Endpoint responded");

        if !status.is_success() {
            bail!("HTTP {}: {}", status, body);
        }

        // API 模式下失败也是 200，需要看 ok 字段
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
            if json.get("ok").and_then(|v| v.as_bool()) == Some(false) {
                let reason = json
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                bail!("Endpoint rejected message: {}", reason);
            }
        }

        Ok(())
    }

    /// 连接测试：同步发送一条固定消息
    ///
    /// 返回 `Ok("Success")`，或 `Err("Failure")` / `Err("Client error : ...")`。
    pub fn test_connection(&self, config: &NotificationConfig) -> std::result::Result<String, String> {
        if Endpoint::from_config(config).is_none() {
            return Err("Client error : no API token, or team domain and token, configured".to_string());
        }

        let message = Message::new(
            format!("Build notifier: you're all set on {}", config.build_server_url),
            Color::Good,
        );
        if self.publish(&message, config) {
            Ok("Success".to_string())
        } else {
            Err("Failure".to_string())
        }
    }

    /// 拉取聊天目录中的用户，任何失败都返回空列表
    pub fn list_users(&self, config: &NotificationConfig) -> Vec<ChatUser> {
        match self.fetch_users(config) {
            Ok(users) => {
                debug!(count = users.len(), "Fetched directory users");
                users
            }
            Err(e) => {
                warn!(error = %e, "Directory lookup failed");
                Vec::new()
            }
        }
    }

    fn fetch_users(&self, config: &NotificationConfig) -> Result<Vec<ChatUser>> {
        let url = format!("{}/users.list", config.api_base_url.trim_end_matches('/'));
        let request = if !config.api_token.is_empty() {
            self.client.get(&url).bearer_auth(&config.api_token)
        } else if !config.auth_token.is_empty() {
            self.client.get(&url).query(&[("token", &config.auth_token)])
        } else {
            bail!("No token configured for directory lookup");
        };

        let response = request.send().context("HTTP request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status);
        }

        let parsed: UsersListResponse = response.json().context("Failed to parse users.list")?;
        if !parsed.ok {
            bail!(
                "users.list rejected: {}",
                parsed.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(parsed.members)
    }
}
