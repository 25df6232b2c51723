//! 通知领域数据模型
//!
//! 与数据库表一一对应的行结构体。channel / status 列以字符串存储，
//! 读取后通过 `notify_shared::events` 中的枚举解析，避免在 sqlx
//! 层面绑定数据库自定义类型。

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use notify_shared::events::{Channel, NotificationStatus};

// ---------------------------------------------------------------------------
// Template — 消息模板
// ---------------------------------------------------------------------------

/// 消息模板
///
/// 以 (event_type, channel) 为路由键；同一组合允许多条活跃模板，
/// 每条各自产生一次独立发送。模板由外部管理后台维护，
/// 分发器视角下只读。
#[derive(Debug, Clone, FromRow)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub event_type: String,
    pub channel: String,
    pub subject_template: String,
    pub body_template: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// 解析渠道列，未知渠道返回 None（由调用方跳过并告警）
    pub fn channel(&self) -> Option<Channel> {
        Channel::parse(&self.channel)
    }
}

// ---------------------------------------------------------------------------
// UserPreference — 用户通知偏好
// ---------------------------------------------------------------------------

/// 用户通知偏好
///
/// 不存在存储行时等价于全渠道开启、无禁用事件类型——
/// 缺失配置绝不能静默屏蔽用户的通知。
#[derive(Debug, Clone, FromRow)]
pub struct UserPreference {
    pub user_id: Uuid,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub sms_enabled: bool,
    pub disabled_event_types: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    /// 安全默认值：全渠道开启，无禁用事件类型
    pub fn default_for(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email_enabled: true,
            push_enabled: true,
            sms_enabled: true,
            disabled_event_types: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 指定渠道是否开启
    pub fn is_channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email_enabled,
            Channel::Push => self.push_enabled,
            Channel::Sms => self.sms_enabled,
        }
    }

    /// 指定事件类型是否被用户禁用
    pub fn is_event_disabled(&self, event_type: &str) -> bool {
        self.disabled_event_types
            .iter()
            .any(|t| t == event_type)
    }
}

// ---------------------------------------------------------------------------
// DeviceToken — 推送设备令牌
// ---------------------------------------------------------------------------

/// 推送设备令牌
///
/// (user_id, token) 唯一；同一用户可有多个活跃令牌（多设备）。
/// 令牌只会被显式停用，不会被静默覆盖。
#[derive(Debug, Clone, FromRow)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_type: String,
    pub token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification — 通知记录
// ---------------------------------------------------------------------------

/// 通知记录，每次分发尝试一行
///
/// 状态离开 pending 后，sent_at 与 error_message 恰好设置其一。
/// failed 记录不自动重试；事件重新投递会创建新记录。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub template_id: Option<Uuid>,
    pub channel: String,
    pub title: String,
    pub content: String,
    pub data: Option<serde_json::Value>,
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn status(&self) -> Option<NotificationStatus> {
        match self.status.as_str() {
            "pending" => Some(NotificationStatus::Pending),
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            "read" => Some(NotificationStatus::Read),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// OutboxEvent — 事务发件箱行
// ---------------------------------------------------------------------------

/// 事务发件箱中的一行
///
/// 生产方服务在本地事务中写入，发布器周期性扫描 pending 行投递到
/// broker。发布成功标记 published；失败保持 pending 等待下轮。
#[derive(Debug, Clone, FromRow)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// SendNotificationInput — 发送请求
// ---------------------------------------------------------------------------

/// 单渠道通知发送请求
///
/// 事件路由与直接调用共用的入口参数。
#[derive(Debug, Clone)]
pub struct SendNotificationInput {
    pub user_id: Uuid,
    pub channel: Channel,
    pub title: String,
    pub content: String,
    pub template_id: Option<Uuid>,
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preference_enables_everything() {
        let prefs = UserPreference::default_for(Uuid::new_v4());
        assert!(prefs.is_channel_enabled(Channel::Email));
        assert!(prefs.is_channel_enabled(Channel::Push));
        assert!(prefs.is_channel_enabled(Channel::Sms));
        assert!(!prefs.is_event_disabled("application.submitted"));
    }

    #[test]
    fn test_preference_channel_toggle() {
        let mut prefs = UserPreference::default_for(Uuid::new_v4());
        prefs.email_enabled = false;
        assert!(!prefs.is_channel_enabled(Channel::Email));
        assert!(prefs.is_channel_enabled(Channel::Push));
    }

    #[test]
    fn test_preference_disabled_event_types() {
        let mut prefs = UserPreference::default_for(Uuid::new_v4());
        prefs.disabled_event_types = vec!["job.created".to_string()];
        assert!(prefs.is_event_disabled("job.created"));
        assert!(!prefs.is_event_disabled("interview.scheduled"));
    }

    #[test]
    fn test_template_channel_parse() {
        let now = Utc::now();
        let template = Template {
            id: Uuid::new_v4(),
            name: "投递确认邮件".to_string(),
            event_type: "application.submitted".to_string(),
            channel: "email".to_string(),
            subject_template: "投递已收到".to_string(),
            body_template: "您的投递已进入处理流程".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(template.channel(), Some(Channel::Email));

        let unknown = Template {
            channel: "pigeon".to_string(),
            ..template
        };
        assert_eq!(unknown.channel(), None);
    }

    #[test]
    fn test_notification_status_parse() {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            template_id: None,
            channel: "email".to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
            data: None,
            status: "pending".to_string(),
            sent_at: None,
            read_at: None,
            error_message: None,
            created_at: now,
        };
        assert_eq!(notification.status(), Some(NotificationStatus::Pending));
    }
}
