//! 构建事件入口 - 策略 → 组装 → 投递
//!
//! 每个事件同步处理，调用方阻塞直到投递结束（最多一次重试）。
//! 任何失败都不会影响被通知的构建本身。

use anyhow::Result;
use tracing::{debug, info, warn};

use super::composer;
use super::delivery::DeliveryClient;
use super::message::Message;
use super::policy::{self, Framing};
use crate::build::BuildContext;
use crate::config::NotificationConfig;

/// 构建生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEvent {
    Started,
    Completed,
}

/// 处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyResult {
    /// 策略不发送
    Suppressed(Framing),
    /// 已送达
    Sent(Framing),
    /// 投递失败（已重试）
    Failed(Framing),
}

/// 消息发送方
pub trait Publisher: Send + Sync {
    fn publish(&self, message: &Message, config: &NotificationConfig) -> bool;
}

impl Publisher for DeliveryClient {
    fn publish(&self, message: &Message, config: &NotificationConfig) -> bool {
        DeliveryClient::publish(self, message, config)
    }
}

/// 构建通知器
pub struct Notifier<P: Publisher = DeliveryClient> {
    publisher: P,
}

impl Notifier<DeliveryClient> {
    /// 使用默认 HTTP 客户端
    pub fn new() -> Result<Self> {
        Ok(Self::with_publisher(DeliveryClient::new()?))
    }
}

impl<P: Publisher> Notifier<P> {
    pub fn with_publisher(publisher: P) -> Self {
        Self { publisher }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// 构建开始
    pub fn started(&self, context: &BuildContext, config: &NotificationConfig) -> NotifyResult {
        self.handle(BuildEvent::Started, context, config)
    }

    /// 构建完成
    pub fn completed(&self, context: &BuildContext, config: &NotificationConfig) -> NotifyResult {
        self.handle(BuildEvent::Completed, context, config)
    }

    pub fn handle(
        &self,
        event: BuildEvent,
        context: &BuildContext,
        config: &NotificationConfig,
    ) -> NotifyResult {
        let decision = policy::decide(
            context.outcome,
            context.previous_outcome,
            event == BuildEvent::Started,
            &config.flags,
        );

        if !decision.send {
            debug!(
                job = %context.job_name,
                build = context.build_number,
                outcome = %context.outcome,
                framing = ?decision.framing,
                "Notification suppressed by policy"
            );
            return NotifyResult::Suppressed(decision.framing);
        }

        let message = composer::compose(context, decision.framing, config);
        if self.publisher.publish(&message, config) {
            info!(
                job = %context.job_name,
                build = context.build_number,
                color = %message.color,
                "Build notification sent"
            );
            NotifyResult::Sent(decision.framing)
        } else {
            warn!(
                job = %context.job_name,
                build = context.build_number,
                "Build notification could not be delivered"
            );
            NotifyResult::Failed(decision.framing)
        }
    }
}
