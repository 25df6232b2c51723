//! 通知管道端到端测试
//!
//! 用内存实现替换 Postgres 存储与 Kafka 投递，走真实的
//! 分发器 -> 发送池 -> 执行器 -> outbox 链路。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use notify_shared::Result;
use notify_shared::config::{DispatcherConfig, OutboxConfig, SendPoolConfig};
use notify_shared::events::{Channel, NotificationStatus};
use notify_shared::kafka::topics;

use notify_worker::dispatcher::Dispatcher;
use notify_worker::error::WorkerError;
use notify_worker::model::{
    DeviceToken, Notification, OutboxEvent, SendNotificationInput, Template, UserPreference,
};
use notify_worker::outbox::OutboxPublisher;
use notify_worker::pool::{SendExecutor, SendJob, SendWorkerPool};
use notify_worker::publisher::EventPublisher;
use notify_worker::sender::{ChannelSender, PushSender, SendOutcome, SenderMap};
use notify_worker::store::{
    DeviceTokenStore, NotificationStore, OutboxStore, PreferenceStore, TemplateStore,
};

// ---------------------------------------------------------------------------
// 内存实现
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemTemplateStore {
    templates: Vec<Template>,
}

#[async_trait]
impl TemplateStore for MemTemplateStore {
    async fn active_for_event(&self, event_type: &str) -> Result<Vec<Template>> {
        Ok(self
            .templates
            .iter()
            .filter(|t| t.event_type == event_type && t.is_active)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct MemPreferenceStore {
    prefs: HashMap<Uuid, UserPreference>,
}

#[async_trait]
impl PreferenceStore for MemPreferenceStore {
    async fn get(&self, user_id: Uuid) -> Result<UserPreference> {
        Ok(self
            .prefs
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserPreference::default_for(user_id)))
    }
}

#[derive(Default)]
struct MemDeviceTokenStore {
    tokens: Vec<DeviceToken>,
}

#[async_trait]
impl DeviceTokenStore for MemDeviceTokenStore {
    async fn active_tokens(&self, user_id: Uuid) -> Result<Vec<DeviceToken>> {
        Ok(self
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.is_active)
            .cloned()
            .collect())
    }
}

/// 与 Postgres 实现保持相同的状态迁移守卫
#[derive(Default)]
struct MemNotificationStore {
    rows: Mutex<HashMap<Uuid, Notification>>,
}

impl MemNotificationStore {
    async fn all(&self) -> Vec<Notification> {
        self.rows.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl NotificationStore for MemNotificationStore {
    async fn create(&self, input: &SendNotificationInput) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            template_id: input.template_id,
            channel: input.channel.as_str().to_string(),
            title: input.title.clone(),
            content: input.content.clone(),
            data: input.data.clone(),
            status: NotificationStatus::Pending.as_str().to_string(),
            sent_at: None,
            read_at: None,
            error_message: None,
            created_at: Utc::now(),
        };
        self.rows
            .lock()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn mark_sent(&self, id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&id) {
            Some(n) if n.status == NotificationStatus::Pending.as_str() => {
                n.status = NotificationStatus::Sent.as_str().to_string();
                n.sent_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&id) {
            Some(n) if n.status == NotificationStatus::Pending.as_str() => {
                n.status = NotificationStatus::Failed.as_str().to_string();
                n.error_message = Some(error.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&id) {
            Some(n) if n.user_id == user_id && n.status == NotificationStatus::Sent.as_str() => {
                n.status = NotificationStatus::Read.as_str().to_string();
                n.read_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().await;
        let mut failed = 0u64;
        for n in rows.values_mut() {
            if n.status == NotificationStatus::Pending.as_str() && n.created_at < cutoff {
                n.status = NotificationStatus::Failed.as_str().to_string();
                failed += 1;
            }
        }
        Ok(failed)
    }
}

#[derive(Default)]
struct MemOutboxStore {
    events: Mutex<Vec<OutboxEvent>>,
}

#[async_trait]
impl OutboxStore for MemOutboxStore {
    async fn enqueue(&self, event_type: &str, payload: serde_json::Value) -> Result<()> {
        self.events.lock().await.push(OutboxEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            payload,
            status: "pending".to_string(),
            created_at: Utc::now(),
            published_at: None,
        });
        Ok(())
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| e.status == "pending")
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, id: Uuid) -> Result<()> {
        let mut events = self.events.lock().await;
        if let Some(e) = events.iter_mut().find(|e| e.id == id) {
            e.status = "published".to_string();
            e.published_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemPublisher {
    published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EventPublisher for MemPublisher {
    async fn publish(&self, topic: &str, key: &str, _payload: &[u8]) -> Result<()> {
        self.published
            .lock()
            .await
            .push((topic.to_string(), key.to_string()));
        Ok(())
    }
}

/// 固定返回结果的发送器，用于触发执行器的失败路径
struct FixedSender {
    channel: Channel,
    outcome: std::result::Result<SendOutcome, String>,
}

#[async_trait]
impl ChannelSender for FixedSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _notification: &Notification) -> std::result::Result<SendOutcome, WorkerError> {
        match &self.outcome {
            Ok(outcome) => Ok(outcome.clone()),
            Err(reason) => Err(WorkerError::SendFailed {
                channel: self.channel,
                reason: reason.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// 组装
// ---------------------------------------------------------------------------

fn template(event_type: &str, channel: Channel) -> Template {
    Template {
        id: Uuid::new_v4(),
        name: format!("{event_type}-{channel}"),
        event_type: event_type.to_string(),
        channel: channel.as_str().to_string(),
        subject_template: "Hello {{.Name}}".to_string(),
        body_template: "Application for {{.JobTitle}}".to_string(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

struct Harness {
    dispatcher: Dispatcher,
    pool: SendWorkerPool,
    notifications: Arc<MemNotificationStore>,
    outbox: Arc<MemOutboxStore>,
}

impl Harness {
    fn new(
        templates: MemTemplateStore,
        preferences: MemPreferenceStore,
        senders: SenderMap,
    ) -> Self {
        let notifications = Arc::new(MemNotificationStore::default());
        let outbox = Arc::new(MemOutboxStore::default());

        let executor = Arc::new(SendExecutor::new(
            senders,
            notifications.clone(),
            outbox.clone(),
        ));
        let pool_config = SendPoolConfig {
            workers: 2,
            queue_capacity: 16,
            shutdown_grace_seconds: 5,
        };
        let (queue, pool) = SendWorkerPool::start(&pool_config, executor);

        let dispatcher = Dispatcher::new(
            &DispatcherConfig {
                stringify_scalars: false,
            },
            Arc::new(templates),
            Arc::new(preferences),
            notifications.clone(),
            queue,
        );

        Self {
            dispatcher,
            pool,
            notifications,
            outbox,
        }
    }

    /// 关闭队列并等待发送池排空，使断言确定化
    async fn drain(self) -> (Arc<MemNotificationStore>, Arc<MemOutboxStore>) {
        drop(self.dispatcher);
        self.pool.shutdown().await;
        (self.notifications, self.outbox)
    }
}

fn all_success_senders() -> SenderMap {
    let mut senders = SenderMap::new();
    for channel in [Channel::Email, Channel::Push, Channel::Sms] {
        senders.insert(
            channel,
            Arc::new(FixedSender {
                channel,
                outcome: Ok(SendOutcome::Delivered {
                    provider_message_id: "msg-1".to_string(),
                }),
            }) as Arc<dyn ChannelSender>,
        );
    }
    senders
}

fn payload(user_id: Uuid) -> Vec<u8> {
    serde_json::json!({
        "user_id": user_id.to_string(),
        "Name": "Ann",
        "JobTitle": "Engineer",
    })
    .to_string()
    .into_bytes()
}

// ---------------------------------------------------------------------------
// 分发路由
// ---------------------------------------------------------------------------

#[tokio::test]
async fn event_with_template_creates_and_sends_notification() {
    let user_id = Uuid::new_v4();
    let harness = Harness::new(
        MemTemplateStore {
            templates: vec![template(topics::APPLICATION_SUBMITTED, Channel::Email)],
        },
        MemPreferenceStore::default(),
        all_success_senders(),
    );

    harness
        .dispatcher
        .process_event(topics::APPLICATION_SUBMITTED, &payload(user_id))
        .await
        .unwrap();

    let (notifications, outbox) = harness.drain().await;
    let rows = notifications.all().await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.user_id, user_id);
    assert_eq!(row.channel, "email");
    assert_eq!(row.title, "Hello Ann");
    assert_eq!(row.content, "Application for Engineer");
    assert_eq!(row.status, "sent");
    assert!(row.sent_at.is_some());

    let events = outbox.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, topics::NOTIFICATION_SENT);
}

#[tokio::test]
async fn event_without_template_is_silently_skipped() {
    let harness = Harness::new(
        MemTemplateStore::default(),
        MemPreferenceStore::default(),
        all_success_senders(),
    );

    harness
        .dispatcher
        .process_event(topics::JOB_CREATED, &payload(Uuid::new_v4()))
        .await
        .unwrap();

    let (notifications, _) = harness.drain().await;
    assert!(notifications.all().await.is_empty());
}

#[tokio::test]
async fn disabled_channel_is_skipped() {
    let user_id = Uuid::new_v4();
    let mut preference = UserPreference::default_for(user_id);
    preference.email_enabled = false;

    let harness = Harness::new(
        MemTemplateStore {
            templates: vec![
                template(topics::JOB_CREATED, Channel::Email),
                template(topics::JOB_CREATED, Channel::Sms),
            ],
        },
        MemPreferenceStore {
            prefs: HashMap::from([(user_id, preference)]),
        },
        all_success_senders(),
    );

    harness
        .dispatcher
        .process_event(topics::JOB_CREATED, &payload(user_id))
        .await
        .unwrap();

    let (notifications, _) = harness.drain().await;
    let rows = notifications.all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].channel, "sms");
}

#[tokio::test]
async fn disabled_event_type_creates_nothing() {
    let user_id = Uuid::new_v4();
    let mut preference = UserPreference::default_for(user_id);
    preference.disabled_event_types = vec![topics::JOB_CREATED.to_string()];

    let harness = Harness::new(
        MemTemplateStore {
            templates: vec![template(topics::JOB_CREATED, Channel::Email)],
        },
        MemPreferenceStore {
            prefs: HashMap::from([(user_id, preference)]),
        },
        all_success_senders(),
    );

    harness
        .dispatcher
        .process_event(topics::JOB_CREATED, &payload(user_id))
        .await
        .unwrap();

    let (notifications, _) = harness.drain().await;
    assert!(notifications.all().await.is_empty());
}

#[tokio::test]
async fn unknown_user_gets_default_preferences() {
    // 没有偏好记录的用户默认全渠道开启
    let harness = Harness::new(
        MemTemplateStore {
            templates: vec![template(topics::MATCH_RECOMMENDED, Channel::Push)],
        },
        MemPreferenceStore::default(),
        all_success_senders(),
    );

    harness
        .dispatcher
        .process_event(topics::MATCH_RECOMMENDED, &payload(Uuid::new_v4()))
        .await
        .unwrap();

    let (notifications, _) = harness.drain().await;
    assert_eq!(notifications.all().await.len(), 1);
}

#[tokio::test]
async fn malformed_payload_is_not_retryable() {
    // 模板存在时才会走到 user_id 校验，事件无模板时静默结束
    let harness = Harness::new(
        MemTemplateStore {
            templates: vec![template(topics::JOB_CREATED, Channel::Email)],
        },
        MemPreferenceStore::default(),
        all_success_senders(),
    );

    let err = harness
        .dispatcher
        .process_event(topics::JOB_CREATED, b"not json")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::MalformedPayload(_)));
    assert!(!err.is_retryable());

    let err = harness
        .dispatcher
        .process_event(topics::JOB_CREATED, br#"{"other":"field"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::MissingUserId));
    assert!(!err.is_retryable());

    let err = harness
        .dispatcher
        .process_event(topics::JOB_CREATED, br#"{"user_id":"nope"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::InvalidUserId(_)));
    assert!(!err.is_retryable());
}

// ---------------------------------------------------------------------------
// 发送执行与部分失败
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_failure_marks_failed_without_failing_event() {
    let user_id = Uuid::new_v4();
    let mut senders = all_success_senders();
    senders.insert(
        Channel::Email,
        Arc::new(FixedSender {
            channel: Channel::Email,
            outcome: Err("smtp unavailable".to_string()),
        }) as Arc<dyn ChannelSender>,
    );

    let harness = Harness::new(
        MemTemplateStore {
            templates: vec![
                template(topics::INTERVIEW_SCHEDULED, Channel::Email),
                template(topics::INTERVIEW_SCHEDULED, Channel::Sms),
            ],
        },
        MemPreferenceStore::default(),
        senders,
    );

    // 单渠道发送失败不影响事件整体结果
    harness
        .dispatcher
        .process_event(topics::INTERVIEW_SCHEDULED, &payload(user_id))
        .await
        .unwrap();

    let (notifications, outbox) = harness.drain().await;
    let rows = notifications.all().await;
    assert_eq!(rows.len(), 2);

    let email = rows.iter().find(|n| n.channel == "email").unwrap();
    assert_eq!(email.status, "failed");
    assert!(
        email
            .error_message
            .as_deref()
            .unwrap()
            .contains("smtp unavailable")
    );

    let sms = rows.iter().find(|n| n.channel == "sms").unwrap();
    assert_eq!(sms.status, "sent");

    let events = outbox.events.lock().await;
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&topics::NOTIFICATION_SENT));
    assert!(types.contains(&topics::NOTIFICATION_FAILED));
}

#[tokio::test]
async fn push_with_no_devices_is_sent_noop() {
    let user_id = Uuid::new_v4();
    let push = PushSender::new(Arc::new(MemDeviceTokenStore::default()));
    let mut senders = SenderMap::new();
    senders.insert(Channel::Push, Arc::new(push) as Arc<dyn ChannelSender>);

    let harness = Harness::new(
        MemTemplateStore {
            templates: vec![template(topics::RESUME_PROCESSED, Channel::Push)],
        },
        MemPreferenceStore::default(),
        senders,
    );

    harness
        .dispatcher
        .process_event(topics::RESUME_PROCESSED, &payload(user_id))
        .await
        .unwrap();

    let (notifications, _) = harness.drain().await;
    let rows = notifications.all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "sent");
}

#[tokio::test]
async fn push_sender_reports_no_targets_without_devices() {
    let push = PushSender::new(Arc::new(MemDeviceTokenStore::default()));
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        template_id: None,
        channel: "push".to_string(),
        title: "t".to_string(),
        content: "c".to_string(),
        data: None,
        status: "pending".to_string(),
        sent_at: None,
        read_at: None,
        error_message: None,
        created_at: Utc::now(),
    };

    let outcome = push.send(&notification).await.unwrap();
    assert_eq!(outcome, SendOutcome::NoTargets);
}

#[tokio::test]
async fn push_multicast_delivers_to_active_devices() {
    let user_id = Uuid::new_v4();
    let tokens = MemDeviceTokenStore {
        tokens: vec![
            DeviceToken {
                id: Uuid::new_v4(),
                user_id,
                device_type: "ios".to_string(),
                token: "token-a".to_string(),
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            DeviceToken {
                id: Uuid::new_v4(),
                user_id,
                device_type: "android".to_string(),
                token: "token-b".to_string(),
                is_active: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        ],
    };
    let push = PushSender::new(Arc::new(tokens));
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        template_id: None,
        channel: "push".to_string(),
        title: "t".to_string(),
        content: "c".to_string(),
        data: None,
        status: "pending".to_string(),
        sent_at: None,
        read_at: None,
        error_message: None,
        created_at: Utc::now(),
    };

    let outcome = push.send(&notification).await.unwrap();
    assert!(matches!(outcome, SendOutcome::Delivered { .. }));
}

// ---------------------------------------------------------------------------
// 生命周期
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_states_are_immutable_except_sent_to_read() {
    let store = MemNotificationStore::default();
    let user_id = Uuid::new_v4();
    let input = SendNotificationInput {
        user_id,
        channel: Channel::Email,
        title: "t".to_string(),
        content: "c".to_string(),
        template_id: None,
        data: None,
    };

    let n = store.create(&input).await.unwrap();
    assert!(store.mark_sent(n.id).await.unwrap());
    // sent 之后唯一合法的迁移是 read
    assert!(!store.mark_failed(n.id, "late").await.unwrap());
    assert!(!store.mark_sent(n.id).await.unwrap());
    assert!(store.mark_read(n.id, user_id).await.unwrap());
    assert!(!store.mark_read(n.id, user_id).await.unwrap());

    let n2 = store.create(&input).await.unwrap();
    assert!(store.mark_failed(n2.id, "boom").await.unwrap());
    assert!(!store.mark_sent(n2.id).await.unwrap());
    // failed 不可标记已读
    assert!(!store.mark_read(n2.id, user_id).await.unwrap());
}

#[tokio::test]
async fn mark_read_requires_owner() {
    let store = MemNotificationStore::default();
    let owner = Uuid::new_v4();
    let input = SendNotificationInput {
        user_id: owner,
        channel: Channel::Email,
        title: "t".to_string(),
        content: "c".to_string(),
        template_id: None,
        data: None,
    };

    let n = store.create(&input).await.unwrap();
    store.mark_sent(n.id).await.unwrap();
    assert!(!store.mark_read(n.id, Uuid::new_v4()).await.unwrap());
    assert!(store.mark_read(n.id, owner).await.unwrap());
}

#[tokio::test]
async fn direct_send_respects_channel_preference() {
    let user_id = Uuid::new_v4();
    let mut preference = UserPreference::default_for(user_id);
    preference.sms_enabled = false;

    let harness = Harness::new(
        MemTemplateStore::default(),
        MemPreferenceStore {
            prefs: HashMap::from([(user_id, preference)]),
        },
        all_success_senders(),
    );

    let skipped = harness
        .dispatcher
        .send_notification(SendNotificationInput {
            user_id,
            channel: Channel::Sms,
            title: "t".to_string(),
            content: "c".to_string(),
            template_id: None,
            data: None,
        })
        .await
        .unwrap();
    assert!(skipped.is_none());

    let created = harness
        .dispatcher
        .send_notification(SendNotificationInput {
            user_id,
            channel: Channel::Email,
            title: "t".to_string(),
            content: "c".to_string(),
            template_id: None,
            data: None,
        })
        .await
        .unwrap();
    assert!(created.is_some());

    let (notifications, _) = harness.drain().await;
    assert_eq!(notifications.all().await.len(), 1);
}

// ---------------------------------------------------------------------------
// outbox
// ---------------------------------------------------------------------------

#[tokio::test]
async fn outbox_publishes_pending_and_marks_published() {
    let store = Arc::new(MemOutboxStore::default());
    store
        .enqueue(topics::NOTIFICATION_SENT, serde_json::json!({"a": 1}))
        .await
        .unwrap();
    store
        .enqueue(topics::NOTIFICATION_FAILED, serde_json::json!({"b": 2}))
        .await
        .unwrap();

    let publisher = Arc::new(MemPublisher::default());
    let outbox = OutboxPublisher::new(
        &OutboxConfig {
            poll_interval_seconds: 1,
            batch_size: 100,
        },
        store.clone(),
        publisher.clone(),
    );

    let published = outbox.publish_pending().await.unwrap();
    assert_eq!(published, 2);

    let events = store.events.lock().await;
    assert!(events.iter().all(|e| e.status == "published"));
    assert!(events.iter().all(|e| e.published_at.is_some()));

    let sent = publisher.published.lock().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, topics::NOTIFICATION_SENT);

    // 再次扫描不应重复投递
    drop(events);
    drop(sent);
    assert_eq!(outbox.publish_pending().await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// 巡检
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_pending_rows_are_failed_by_cutoff() {
    let store = MemNotificationStore::default();
    let input = SendNotificationInput {
        user_id: Uuid::new_v4(),
        channel: Channel::Email,
        title: "t".to_string(),
        content: "c".to_string(),
        template_id: None,
        data: None,
    };

    let stale = store.create(&input).await.unwrap();
    {
        let mut rows = store.rows.lock().await;
        rows.get_mut(&stale.id).unwrap().created_at = Utc::now() - chrono::Duration::hours(1);
    }
    let fresh = store.create(&input).await.unwrap();

    let cutoff = Utc::now() - chrono::Duration::minutes(10);
    assert_eq!(store.fail_stale_pending(cutoff).await.unwrap(), 1);

    let rows = store.all().await;
    let stale_row = rows.iter().find(|n| n.id == stale.id).unwrap();
    let fresh_row = rows.iter().find(|n| n.id == fresh.id).unwrap();
    assert_eq!(stale_row.status, "failed");
    assert_eq!(fresh_row.status, "pending");
}

// ---------------------------------------------------------------------------
// 入队任务直达执行器
// ---------------------------------------------------------------------------

#[tokio::test]
async fn executor_job_for_unconfigured_channel_fails_record() {
    let notifications = Arc::new(MemNotificationStore::default());
    let outbox = Arc::new(MemOutboxStore::default());
    let executor = SendExecutor::new(SenderMap::new(), notifications.clone(), outbox.clone());

    let n = notifications
        .create(&SendNotificationInput {
            user_id: Uuid::new_v4(),
            channel: Channel::Email,
            title: "t".to_string(),
            content: "c".to_string(),
            template_id: None,
            data: None,
        })
        .await
        .unwrap();

    executor.execute(SendJob { notification: n.clone() }).await;

    let rows = notifications.all().await;
    assert_eq!(rows[0].status, "failed");
    let events = outbox.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, topics::NOTIFICATION_FAILED);
}

#[tokio::test]
async fn executor_job_with_unrecognized_channel_fails_record() {
    let notifications = Arc::new(MemNotificationStore::default());
    let outbox = Arc::new(MemOutboxStore::default());
    let executor = SendExecutor::new(SenderMap::new(), notifications.clone(), outbox.clone());

    let mut n = notifications
        .create(&SendNotificationInput {
            user_id: Uuid::new_v4(),
            channel: Channel::Email,
            title: "t".to_string(),
            content: "c".to_string(),
            template_id: None,
            data: None,
        })
        .await
        .unwrap();

    // 模拟渠道列被其他写入方写入未知值的存量数据
    n.channel = "fax".to_string();
    notifications.rows.lock().await.insert(n.id, n.clone());

    executor.execute(SendJob { notification: n }).await;

    // 记录立即落为失败终态，不等 pending 清扫器接管
    let rows = notifications.all().await;
    assert_eq!(rows[0].status, "failed");
    let reason = rows[0].error_message.as_deref().unwrap();
    assert!(reason.contains("未知渠道"), "reason: {reason}");
    // 渠道不可解析，产不出结果事件
    assert!(outbox.events.lock().await.is_empty());
}
