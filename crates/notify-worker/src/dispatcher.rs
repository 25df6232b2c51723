//! 事件分发
//!
//! 消费到的业务事件在这里完成 事件 -> 模板 -> 渠道 的路由：先查该
//! 事件类型下的活跃模板（一条也没有就静默结束），再解析收件人、
//! 加载偏好，然后逐模板检查渠道开关、渲染、落库并送入发送队列。
//! 用户关闭的渠道和事件类型都按静默跳过处理，不产生任何记录。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use notify_shared::config::DispatcherConfig;
use notify_shared::events::Channel;

use crate::error::WorkerError;
use crate::model::{Notification, SendNotificationInput, Template};
use crate::pool::{SendJob, SendQueue};
use crate::renderer;
use crate::store::{NotificationStore, PreferenceStore, TemplateStore};

pub struct Dispatcher {
    templates: Arc<dyn TemplateStore>,
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    queue: SendQueue,
    stringify_scalars: bool,
}

impl Dispatcher {
    pub fn new(
        config: &DispatcherConfig,
        templates: Arc<dyn TemplateStore>,
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        queue: SendQueue,
    ) -> Self {
        Self {
            templates,
            preferences,
            notifications,
            queue,
            stringify_scalars: config.stringify_scalars,
        }
    }

    /// 处理一条业务事件
    ///
    /// 返回 Err 仅代表基础设施故障（数据库、队列），调用方应保留
    /// 偏移量等待重投递。负载格式问题在错误类型上不可重试，由消费
    /// 层决定跳过。
    pub async fn process_event(&self, event_type: &str, payload: &[u8]) -> Result<(), WorkerError> {
        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| WorkerError::MalformedPayload(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| WorkerError::MalformedPayload("负载不是 JSON 对象".to_string()))?;

        let templates = self.templates.active_for_event(event_type).await?;
        if templates.is_empty() {
            debug!(event_type, "事件类型未配置模板，跳过");
            return Ok(());
        }

        let user_id = extract_user_id(object)?;

        let preference = self.preferences.get(user_id).await?;
        if preference.is_event_disabled(event_type) {
            debug!(%user_id, event_type, "用户已关闭该事件类型，跳过");
            return Ok(());
        }

        let context = build_context(object, self.stringify_scalars);
        let mut created = 0usize;

        for template in &templates {
            let Some(channel) = template.channel() else {
                warn!(template_id = %template.id, channel = %template.channel, "模板渠道无法识别，跳过");
                continue;
            };
            if !preference.is_channel_enabled(channel) {
                debug!(%user_id, event_type, %channel, "渠道已关闭，跳过");
                continue;
            }
            self.dispatch_template(user_id, channel, template, &value, &context)
                .await?;
            created += 1;
        }

        info!(%user_id, event_type, created, "事件分发完成");
        Ok(())
    }

    /// 直接发送入口
    ///
    /// 供非事件驱动的调用方（如管理接口）使用：跳过模板路由，
    /// 但仍尊重用户的渠道偏好。渠道关闭时返回 None。
    pub async fn send_notification(
        &self,
        input: SendNotificationInput,
    ) -> Result<Option<Notification>, WorkerError> {
        let preference = self.preferences.get(input.user_id).await?;
        if !preference.is_channel_enabled(input.channel) {
            debug!(user_id = %input.user_id, channel = %input.channel, "渠道已关闭，跳过直接发送");
            return Ok(None);
        }

        let notification = self.notifications.create(&input).await?;
        self.enqueue_send(&notification).await;
        Ok(Some(notification))
    }

    /// 单模板分发：渲染、建记录、入队
    async fn dispatch_template(
        &self,
        user_id: Uuid,
        channel: Channel,
        template: &Template,
        payload: &serde_json::Value,
        context: &HashMap<String, String>,
    ) -> Result<Notification, WorkerError> {
        let rendered = renderer::render(
            &template.subject_template,
            &template.body_template,
            context,
        );

        let input = SendNotificationInput {
            user_id,
            channel,
            title: rendered.title,
            content: rendered.body,
            template_id: Some(template.id),
            data: Some(payload.clone()),
        };
        let notification = self.notifications.create(&input).await?;
        self.enqueue_send(&notification).await;
        Ok(notification)
    }

    /// 入队失败不回滚记录，遗留的 pending 由巡检任务兜底置为 failed
    async fn enqueue_send(&self, notification: &Notification) {
        if let Err(e) = self
            .queue
            .enqueue(SendJob {
                notification: notification.clone(),
            })
            .await
        {
            error!(
                notification_id = %notification.id,
                error = %e,
                "发送任务入队失败，记录保持 pending"
            );
        }
    }
}

fn extract_user_id(object: &serde_json::Map<String, serde_json::Value>) -> Result<Uuid, WorkerError> {
    let raw = object
        .get("user_id")
        .and_then(|v| v.as_str())
        .ok_or(WorkerError::MissingUserId)?;
    Uuid::parse_str(raw).map_err(|_| WorkerError::InvalidUserId(raw.to_string()))
}

/// 从事件负载构造渲染上下文
///
/// 只收顶层字符串字段。stringify_scalars 打开时数字与布尔也转为
/// 字符串纳入，嵌套结构始终忽略。
fn build_context(
    object: &serde_json::Map<String, serde_json::Value>,
    stringify_scalars: bool,
) -> HashMap<String, String> {
    let mut context = HashMap::with_capacity(object.len());
    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                context.insert(key.clone(), s.clone());
            }
            serde_json::Value::Number(n) if stringify_scalars => {
                context.insert(key.clone(), n.to_string());
            }
            serde_json::Value::Bool(b) if stringify_scalars => {
                context.insert(key.clone(), b.to_string());
            }
            _ => {}
        }
    }
    context
}
