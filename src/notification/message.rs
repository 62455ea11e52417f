//! 通知消息定义

use serde::{Deserialize, Serialize};

/// 消息颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Good,
    Warning,
    Danger,
    None,
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Good => "good",
            Color::Warning => "warning",
            Color::Danger => "danger",
            Color::None => "none",
        }
    }

    /// 写入 payload 的颜色值，`None` 不设置颜色条
    pub fn attachment_color(&self) -> Option<&'static str> {
        match self {
            Color::None => None,
            other => Some(other.as_str()),
        }
    }
}

/// 一次发送的完整消息，发送后即丢弃
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub color: Color,
    /// 提交摘要
    pub attachment: Option<String>,
}

impl Message {
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }
}
