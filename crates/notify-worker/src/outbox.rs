//! outbox 发布器
//!
//! 周期性扫描 outbox 表，把 pending 事件投递到 Kafka 并标记 published。
//! 单条投递失败只记录日志，事件保持 pending 等下一轮重试，不阻塞
//! 同批次的其他事件。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use notify_shared::Result;
use notify_shared::config::OutboxConfig;

use crate::publisher::EventPublisher;
use crate::store::OutboxStore;

pub struct OutboxPublisher {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn EventPublisher>,
    poll_interval: Duration,
    batch_size: i64,
}

impl OutboxPublisher {
    pub fn new(
        config: &OutboxConfig,
        store: Arc<dyn OutboxStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            publisher,
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            batch_size: config.batch_size,
        }
    }

    /// 发布一批待投递事件，返回成功发布的数量
    pub async fn publish_pending(&self) -> Result<usize> {
        let events = self.store.fetch_pending(self.batch_size).await?;
        if events.is_empty() {
            return Ok(0);
        }

        let mut published = 0usize;
        for event in events {
            // event_type 即目标 topic；key 取负载中的 notification_id，
            // 保证同一条通知的结果事件落在同一分区
            let key = event
                .payload
                .get("notification_id")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| event.id.to_string());
            let payload = match serde_json::to_vec(&event.payload) {
                Ok(p) => p,
                Err(e) => {
                    error!(event_id = %event.id, error = %e, "序列化 outbox 负载失败");
                    continue;
                }
            };

            match self
                .publisher
                .publish(&event.event_type, &key, &payload)
                .await
            {
                Ok(()) => {
                    self.store.mark_published(event.id).await?;
                    published += 1;
                }
                Err(e) => {
                    error!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %e,
                        "投递 outbox 事件失败，等待下一轮重试"
                    );
                }
            }
        }

        debug!(published, "outbox 批次发布完成");
        Ok(published)
    }

    /// 周期运行直至收到关闭信号
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!(
            interval_seconds = self.poll_interval.as_secs(),
            "outbox 发布器启动"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("outbox 发布器退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.publish_pending().await {
                        error!(error = %e, "outbox 扫描失败");
                    }
                }
            }
        }
    }
}
