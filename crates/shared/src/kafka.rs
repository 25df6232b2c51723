//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Producer/Consumer 抽象，
//! 统一消息序列化、错误映射和优雅关闭语义，避免各服务重复编写样板代码。
//!
//! 消费侧采用手动提交：处理函数返回 Ok 才提交偏移量，返回 Err 则不提交，
//! 同一偏移量会在后续拉取中重新投递。这是整条管道 at-least-once 语义的根基。

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::NotifyError;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 Kafka topic 名称，防止字符串散落在各服务中导致拼写不一致
pub mod topics {
    /// 入站领域事件 topic
    pub const RESUME_PROCESSED: &str = "resume.processed";
    pub const JOB_CREATED: &str = "job.created";
    pub const MATCH_RECOMMENDED: &str = "match.recommended";
    pub const APPLICATION_SUBMITTED: &str = "application.submitted";
    pub const APPLICATION_STATUS_CHANGED: &str = "application.status_changed";
    pub const INTERVIEW_SCHEDULED: &str = "interview.scheduled";

    /// 出站结果事件 topic
    pub const NOTIFICATION_SENT: &str = "notification.sent";
    pub const NOTIFICATION_FAILED: &str = "notification.failed";

    /// 通知管道订阅的全部入站 topic
    pub const EVENT_TOPICS: &[&str] = &[
        RESUME_PROCESSED,
        JOB_CREATED,
        MATCH_RECOMMENDED,
        APPLICATION_SUBMITTED,
        APPLICATION_STATUS_CHANGED,
        INTERVIEW_SCHEDULED,
    ];
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息
///
/// rdkafka 的 `BorrowedMessage` 带生命周期约束，处理函数需要跨 await 点
/// 持有消息，因此在进入处理函数前提取为拥有所有权的结构体。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl ConsumerMessage {
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg
                .key()
                .and_then(|k| std::str::from_utf8(k).ok())
                .map(String::from),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 封装 `FutureProducer` 并提供类型安全的 JSON 发送方法，
/// 内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// `message.timeout.ms` 设为 5 秒——结果事件与 outbox 投递都有上层
    /// 重试路径兜底，超时后应尽快把错误交还调用方而非无限等待。
    pub fn new(config: &KafkaConfig) -> Result<Self, NotifyError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| NotifyError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 发送原始字节消息
    pub async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(i32, i64), NotifyError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| NotifyError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }

    /// 将值序列化为 JSON 后发送
    ///
    /// 序列化与网络发送拆分为两步，便于独立定位故障原因。
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(i32, i64), NotifyError> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| NotifyError::Kafka(format!("序列化失败: {e}")))?;

        self.send(topic, key, &payload).await
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 一条消息处理完成后对其偏移量的处置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetAction {
    /// 提交偏移量，消息不再投递
    Commit,
    /// 不提交，同一偏移量留待重新投递
    Hold,
}

impl OffsetAction {
    /// 处理成功才提交；任何错误都保留偏移量
    ///
    /// 可重试与否的甄别在业务处理函数内完成，能传播到这里的错误
    /// 一律视为需要重新投递。
    pub fn for_outcome<T>(outcome: &Result<T, NotifyError>) -> Self {
        match outcome {
            Ok(_) => Self::Commit,
            Err(_) => Self::Hold,
        }
    }
}

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer`，提供基于 `watch` channel 的优雅关闭语义，
/// 以及"处理成功才提交偏移量"的消费循环。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者
    ///
    /// `group_id_suffix` 允许同一服务内不同消费逻辑使用独立的消费组，
    /// 例如 "notify-worker.application.submitted"。关闭自动提交，
    /// 偏移量由消费循环在处理成功后显式提交。
    pub fn new(config: &KafkaConfig, group_id_suffix: Option<&str>) -> Result<Self, NotifyError> {
        let group_id = match group_id_suffix {
            Some(suffix) => format!("{}.{}", config.consumer_group, suffix),
            None => config.consumer_group.clone(),
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| NotifyError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(brokers = %config.brokers, group_id, "Kafka 消费者已初始化");
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), NotifyError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| NotifyError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - handler 返回 Ok 时提交该消息的偏移量；提交失败只记录日志，
    ///   处理结果不回滚（接受小概率的重复投递窗口）。
    /// - handler 返回 Err 时不提交，同一偏移量会被重新投递，
    ///   这是整条管道对瞬时故障的主要重试机制。
    /// - 拉取出错时记录日志并等待片刻再继续，不中断循环。
    /// - 关闭信号变为 `true` 时退出循环，正在执行的 handler 会自然完成。
    pub async fn run<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), NotifyError>>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!("Kafka 消费循环已启动");

        loop {
            let next = tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                    continue;
                }

                next = stream.next() => next,
            };

            let Some(next) = next else {
                warn!("Kafka 消息流意外结束");
                break;
            };

            let raw = match next {
                Ok(raw) => raw,
                Err(e) => {
                    error!(error = %e, "接收 Kafka 消息出错");
                    // 避免拉取故障时空转
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let msg = ConsumerMessage::from_borrowed(&raw);
            debug!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                "收到 Kafka 消息"
            );

            let outcome = handler(msg).await;
            match OffsetAction::for_outcome(&outcome) {
                // 提交失败不回滚已完成的处理
                OffsetAction::Commit => {
                    if let Err(e) = self.consumer.commit_message(&raw, CommitMode::Async) {
                        warn!(
                            error = %e,
                            topic = raw.topic(),
                            offset = raw.offset(),
                            "提交偏移量失败，消息可能被重复投递"
                        );
                    }
                }
                OffsetAction::Hold => {
                    if let Err(e) = outcome {
                        error!(
                            error = %e,
                            topic = raw.topic(),
                            offset = raw.offset(),
                            "处理 Kafka 消息失败，不提交偏移量等待重新投递"
                        );
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
