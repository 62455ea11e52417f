//! 通知核心 - 策略、组装、mention、投递
//!
//! # 流程
//! 1. `policy::decide` 判断是否发送以及口吻
//! 2. `composer::compose` 生成消息（调用 `mention::resolve`）
//! 3. `DeliveryClient::publish` 发送（失败重试一次）
//!
//! # 使用示例
//! ```ignore
//! use build_notifier::notification::Notifier;
//!
//! let notifier = Notifier::new()?;
//! notifier.completed(&context, &config);
//! ```

pub mod composer;
pub mod delivery;
pub mod mention;
pub mod message;
pub mod notifier;
pub mod policy;

pub use composer::compose;
pub use delivery::{ChatUser, DeliveryClient, WebhookPayload};
pub use mention::{MentionSuggestion, PR_AUTHOR_TOKEN, TRIGGERING_USER_TOKEN};
pub use message::{Color, Message};
pub use notifier::{BuildEvent, Notifier, NotifyResult, Publisher};
pub use policy::{decide, Decision, Framing};
