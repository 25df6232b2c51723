//! 发送协程池
//!
//! 发送任务进入有界队列，由固定数量的 worker 消费。队列满时入队方
//! 等待，背压传导回消费侧而不是无界堆积任务。关闭时先停止入队，
//! worker 把队列中剩余任务发完再退出，超过宽限期仍未排空则放弃。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use notify_shared::config::SendPoolConfig;
use notify_shared::events::{Channel, NotificationFailedEvent, NotificationSentEvent};
use notify_shared::kafka::topics;

use crate::error::WorkerError;
use crate::model::Notification;
use crate::sender::{SendOutcome, SenderMap};
use crate::store::{NotificationStore, OutboxStore};

/// 一次渠道发送任务
#[derive(Debug)]
pub struct SendJob {
    pub notification: Notification,
}

/// 任务入队句柄
///
/// 克隆后可被多个分发器共享。所有句柄释放后队列关闭，worker 排空
/// 剩余任务并退出。
#[derive(Clone)]
pub struct SendQueue {
    tx: mpsc::Sender<SendJob>,
}

impl SendQueue {
    pub(crate) fn new(tx: mpsc::Sender<SendJob>) -> Self {
        Self { tx }
    }

    /// 入队发送任务，队列满时等待
    pub async fn enqueue(&self, job: SendJob) -> Result<(), WorkerError> {
        self.tx.send(job).await.map_err(|_| WorkerError::QueueClosed)
    }
}

/// 执行单个发送任务并推进通知状态
///
/// 发送结果（含失败）都落为终态并写入 outbox，执行器本身不向上
/// 抛错：任务一旦出队，重投递已不可能，只能记录。
pub struct SendExecutor {
    senders: SenderMap,
    notifications: Arc<dyn NotificationStore>,
    outbox: Arc<dyn OutboxStore>,
}

impl SendExecutor {
    pub fn new(
        senders: SenderMap,
        notifications: Arc<dyn NotificationStore>,
        outbox: Arc<dyn OutboxStore>,
    ) -> Self {
        Self {
            senders,
            notifications,
            outbox,
        }
    }

    pub async fn execute(&self, job: SendJob) {
        let notification = job.notification;
        let Some(channel) = Channel::parse(&notification.channel) else {
            error!(
                notification_id = %notification.id,
                channel = %notification.channel,
                "通知记录携带未知渠道"
            );
            // 渠道解析不了就没有对应的结果事件，直接把记录落为失败终态，
            // 不留给 pending 清扫器
            let reason = format!("未知渠道: {}", notification.channel);
            if let Err(e) = self.notifications.mark_failed(notification.id, &reason).await {
                error!(notification_id = %notification.id, error = %e, "更新 failed 状态失败");
            }
            return;
        };

        let outcome = match self.senders.get(&channel) {
            Some(sender) => sender.send(&notification).await,
            None => Err(WorkerError::SendFailed {
                channel,
                reason: "渠道未配置发送器".to_string(),
            }),
        };

        match outcome {
            Ok(SendOutcome::Delivered {
                provider_message_id,
            }) => {
                debug!(
                    notification_id = %notification.id,
                    channel = %channel,
                    provider_message_id = %provider_message_id,
                    "发送成功"
                );
                self.finish_sent(&notification, channel).await;
            }
            // 无投递目标按成功的空操作处理，不算用户侧失败
            Ok(SendOutcome::NoTargets) => {
                debug!(
                    notification_id = %notification.id,
                    channel = %channel,
                    "无可投递目标，按已发送处理"
                );
                self.finish_sent(&notification, channel).await;
            }
            Err(e) => {
                warn!(
                    notification_id = %notification.id,
                    channel = %channel,
                    error = %e,
                    "发送失败"
                );
                self.finish_failed(&notification, channel, &e.to_string())
                    .await;
            }
        }
    }

    async fn finish_sent(&self, notification: &Notification, channel: Channel) {
        if let Err(e) = self.notifications.mark_sent(notification.id).await {
            error!(notification_id = %notification.id, error = %e, "更新 sent 状态失败");
            return;
        }

        let event = NotificationSentEvent {
            notification_id: notification.id,
            user_id: notification.user_id,
            channel,
            sent_at: Utc::now(),
        };
        self.enqueue_outbox(topics::NOTIFICATION_SENT, &event).await;
    }

    async fn finish_failed(&self, notification: &Notification, channel: Channel, reason: &str) {
        if let Err(e) = self.notifications.mark_failed(notification.id, reason).await {
            error!(notification_id = %notification.id, error = %e, "更新 failed 状态失败");
            return;
        }

        let event = NotificationFailedEvent {
            notification_id: notification.id,
            user_id: notification.user_id,
            channel,
            error: reason.to_string(),
            failed_at: Utc::now(),
        };
        self.enqueue_outbox(topics::NOTIFICATION_FAILED, &event)
            .await;
    }

    async fn enqueue_outbox<T: serde::Serialize>(&self, event_type: &str, event: &T) {
        let payload = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                error!(event_type, error = %e, "序列化 outbox 事件失败");
                return;
            }
        };
        if let Err(e) = self.outbox.enqueue(event_type, payload).await {
            error!(event_type, error = %e, "写入 outbox 失败");
        }
    }
}

/// 固定大小的发送 worker 池
pub struct SendWorkerPool {
    handles: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl SendWorkerPool {
    /// 启动 worker 池，返回入队句柄与池本体
    pub fn start(config: &SendPoolConfig, executor: Arc<SendExecutor>) -> (SendQueue, Self) {
        let (tx, rx) = mpsc::channel::<SendJob>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&rx);
            let executor = Arc::clone(&executor);
            handles.push(tokio::spawn(async move {
                debug!(worker_id, "发送 worker 启动");
                loop {
                    // 锁只覆盖出队动作，发送过程不持锁
                    let job = rx.lock().await.recv().await;
                    match job {
                        Some(job) => executor.execute(job).await,
                        None => break,
                    }
                }
                debug!(worker_id, "发送 worker 退出");
            }));
        }

        let queue = SendQueue { tx };
        let pool = Self {
            handles,
            grace: Duration::from_secs(config.shutdown_grace_seconds),
        };
        (queue, pool)
    }

    /// 等待 worker 在宽限期内排空队列并退出
    ///
    /// 调用前必须先释放所有 [`SendQueue`] 句柄，否则 worker 不会退出。
    pub async fn shutdown(mut self) {
        let deadline = tokio::time::Instant::now() + self.grace;
        let mut timed_out = false;

        for handle in &mut self.handles {
            if timed_out {
                handle.abort();
                continue;
            }
            match tokio::time::timeout_at(deadline, &mut *handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "发送 worker 异常退出"),
                Err(_) => {
                    warn!(
                        grace_seconds = self.grace.as_secs(),
                        "发送协程池未在宽限期内排空，放弃剩余任务"
                    );
                    timed_out = true;
                    handle.abort();
                }
            }
        }

        if !timed_out {
            info!("发送协程池已排空");
        }
    }
}
