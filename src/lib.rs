//! Build Notifier - 把 CI 构建事件转成聊天消息

pub mod build;
pub mod config;
pub mod notification;

pub use build::{BuildContext, CommitEntry, Outcome, TestSummary};
pub use config::{
    migrate, resolve, CommitInfoChoice, GlobalConfig, JobConfig, LegacyJobProperty,
    NotificationConfig, NotifyFlags,
};
pub use notification::{
    BuildEvent, ChatUser, Color, DeliveryClient, Framing, Message, Notifier, NotifyResult,
};
