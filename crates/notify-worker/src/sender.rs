//! 渠道发送器
//!
//! 每个渠道一个 [`ChannelSender`] 实现，启动时全部构造完成并注入
//! 发送协程池，运行期不再有懒加载路径。当前的邮件 / 推送 / 短信
//! 实现均为模拟投递：解析目标地址、打印结构化日志、返回生成的
//! 供应商消息 ID。接入真实供应商时只需替换对应实现。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use notify_shared::events::Channel;

use crate::error::WorkerError;
use crate::model::Notification;
use crate::recipient::RecipientDirectory;
use crate::store::DeviceTokenStore;

/// 单次发送的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// 至少一个目标投递成功
    Delivered { provider_message_id: String },
    /// 该用户在此渠道上没有任何可投递目标（如无注册设备）
    NoTargets,
}

/// 渠道发送抽象
///
/// 实现必须幂等安全：同一通知重复发送最多造成重复投递，不得报错。
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, notification: &Notification) -> Result<SendOutcome, WorkerError>;
}

/// 按渠道索引的发送器集合
pub type SenderMap = HashMap<Channel, Arc<dyn ChannelSender>>;

// ---------------------------------------------------------------------------
// EmailSender
// ---------------------------------------------------------------------------

pub struct EmailSender {
    directory: Arc<dyn RecipientDirectory>,
}

impl EmailSender {
    pub fn new(directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, notification: &Notification) -> Result<SendOutcome, WorkerError> {
        let address = self
            .directory
            .email_for(notification.user_id)
            .await
            .map_err(WorkerError::Shared)?;

        let message_id = format!("email-{}", Uuid::new_v4());
        info!(
            notification_id = %notification.id,
            to = %address,
            subject = %notification.title,
            message_id = %message_id,
            "模拟邮件投递"
        );
        Ok(SendOutcome::Delivered {
            provider_message_id: message_id,
        })
    }
}

// ---------------------------------------------------------------------------
// SmsSender
// ---------------------------------------------------------------------------

pub struct SmsSender {
    directory: Arc<dyn RecipientDirectory>,
}

impl SmsSender {
    pub fn new(directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ChannelSender for SmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, notification: &Notification) -> Result<SendOutcome, WorkerError> {
        let phone = self
            .directory
            .phone_for(notification.user_id)
            .await
            .map_err(WorkerError::Shared)?;

        let message_id = format!("sms-{}", Uuid::new_v4());
        info!(
            notification_id = %notification.id,
            to = %phone,
            message_id = %message_id,
            "模拟短信投递"
        );
        Ok(SendOutcome::Delivered {
            provider_message_id: message_id,
        })
    }
}

// ---------------------------------------------------------------------------
// PushSender
// ---------------------------------------------------------------------------

/// 推送发送器
///
/// 对用户的所有活跃设备做多播，逐设备记录结果：
/// - 无活跃设备：[`SendOutcome::NoTargets`]，调用方按成功的空操作处理；
/// - 至少一台成功：整体视为成功；
/// - 全部失败：以第一台设备的错误作为整体失败原因。
pub struct PushSender {
    tokens: Arc<dyn DeviceTokenStore>,
}

impl PushSender {
    pub fn new(tokens: Arc<dyn DeviceTokenStore>) -> Self {
        Self { tokens }
    }

    /// 单设备模拟投递
    async fn deliver_to_device(&self, token: &str) -> Result<String, WorkerError> {
        let message_id = format!("push-{}", Uuid::new_v4());
        info!(token_prefix = %token_prefix(token), message_id = %message_id, "模拟推送投递");
        Ok(message_id)
    }
}

#[async_trait]
impl ChannelSender for PushSender {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(&self, notification: &Notification) -> Result<SendOutcome, WorkerError> {
        let devices = self
            .tokens
            .active_tokens(notification.user_id)
            .await
            .map_err(WorkerError::Shared)?;

        if devices.is_empty() {
            return Ok(SendOutcome::NoTargets);
        }

        let mut first_error: Option<WorkerError> = None;
        let mut delivered: Option<String> = None;

        for device in &devices {
            match self.deliver_to_device(&device.token).await {
                Ok(message_id) => {
                    if delivered.is_none() {
                        delivered = Some(message_id);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match (delivered, first_error) {
            (Some(message_id), _) => Ok(SendOutcome::Delivered {
                provider_message_id: message_id,
            }),
            (None, Some(e)) => Err(e),
            // devices 非空时必然进入上面两个分支
            (None, None) => Err(WorkerError::SendFailed {
                channel: Channel::Push,
                reason: "无可用投递结果".to_string(),
            }),
        }
    }
}

fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}
