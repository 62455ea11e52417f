//! 通知策略 - 根据本次/上次结果和开关决定是否发送以及以何种口吻发送
//!
//! 纯函数：没有 I/O，没有副作用，同样的输入总是得到同样的结果。

use crate::build::Outcome;
use crate::config::NotifyFlags;

/// 通知口吻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Start,
    Normal,
    RepeatedFailure,
    BackToNormal,
}

/// 策略判断结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub send: bool,
    pub framing: Framing,
}

impl Decision {
    fn new(send: bool, framing: Framing) -> Self {
        Self { send, framing }
    }
}

/// 决定是否发送通知
///
/// 规则（按顺序）：
/// 1. 开始事件：取决于 `start_notification`
/// 2. 失败/不稳定之后成功：back to normal，取决于 `notify_back_to_normal`
/// 3. 连续失败：取决于 `notify_repeated_failure`
/// 4. 其他：取决于结果对应的开关
///
/// back to normal 与 `notify_success` 相互独立。
pub fn decide(
    outcome: Outcome,
    previous: Option<Outcome>,
    is_start: bool,
    flags: &NotifyFlags,
) -> Decision {
    if is_start {
        return Decision::new(flags.start_notification, Framing::Start);
    }

    match (outcome, previous) {
        (Outcome::Success, Some(prev)) if prev.is_broken() => {
            Decision::new(flags.notify_back_to_normal, Framing::BackToNormal)
        }
        (Outcome::Failure, Some(Outcome::Failure)) => {
            Decision::new(flags.notify_repeated_failure, Framing::RepeatedFailure)
        }
        _ => {
            let send = match outcome {
                Outcome::Success => flags.notify_success,
                Outcome::Failure => flags.notify_failure,
                Outcome::Unstable => flags.notify_unstable,
                Outcome::Aborted => flags.notify_aborted,
                Outcome::NotBuilt => flags.notify_not_built,
                // 完成事件不应该带 STARTED
                Outcome::Started => false,
            };
            Decision::new(send, Framing::Normal)
        }
    }
}
