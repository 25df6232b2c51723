//! 通知工作者错误类型
//!
//! 区分"数据本身有问题"（格式错误、缺少 user_id——重投递不会变好，
//! 应提交偏移量跳过）与"基础设施瞬时故障"（数据库、Kafka——
//! 不提交偏移量等待重投递）两类错误，消费入口据此决定提交策略。

use thiserror::Error;

use notify_shared::error::NotifyError;
use notify_shared::events::Channel;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("事件负载格式错误: {0}")]
    MalformedPayload(String),

    #[error("事件负载缺少 user_id 字段")]
    MissingUserId,

    #[error("user_id 不是合法的 UUID: {0}")]
    InvalidUserId(String),

    #[error("通知发送失败: 渠道={channel}, 原因={reason}")]
    SendFailed { channel: Channel, reason: String },

    #[error("发送队列已关闭，任务无法入队")]
    QueueClosed,

    #[error(transparent)]
    Shared(#[from] NotifyError),
}

impl WorkerError {
    /// 是否为可重试错误
    ///
    /// 输入数据类错误永远不可重试；共享层错误沿用其自身的判定。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Shared(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}
