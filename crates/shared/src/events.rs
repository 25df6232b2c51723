//! 事件与通知领域模型
//!
//! 定义通知渠道、通知状态以及管道对外发布的结果事件。
//! 入站的领域事件（application.submitted 等）没有统一信封——
//! 它们由各业务服务各自定义，管道只约定负载为 JSON 对象且包含
//! `user_id` 字段，因此入站负载在消费侧以 `serde_json::Map` 解析。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Channel — 通知投递渠道
// ---------------------------------------------------------------------------

/// 通知投递渠道
///
/// 序列化为小写字符串，与模板表和通知表中的 channel 列保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Push,
    Sms,
}

impl Channel {
    /// 数据库列中的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
        }
    }

    /// 从数据库列值解析，未知渠道返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "push" => Some(Self::Push),
            "sms" => Some(Self::Sms),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NotificationStatus — 通知状态机
// ---------------------------------------------------------------------------

/// 通知记录状态
///
/// 状态机：pending -> sent（发送成功）/ pending -> failed（发送失败），
/// sent -> read 由用户侧确认触发。sent / failed / read 均为终态，
/// 记录本身不会自动重试——事件重新投递会创建新记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Read => "read",
        }
    }

    /// 是否为终态（不再发生自动状态迁移）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// 出站结果事件
// ---------------------------------------------------------------------------

/// notification.sent 事件
///
/// 发送成功后发布，以 notification_id 作为消息 key 保证同一条通知的
/// 结果事件落在同一分区。字段名与下游既有消费者约定的 snake_case 一致。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSentEvent {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub channel: Channel,
    pub sent_at: DateTime<Utc>,
}

/// notification.failed 事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFailedEvent {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub channel: Channel,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}
