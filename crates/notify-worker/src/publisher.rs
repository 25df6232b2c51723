//! 出站事件发布
//!
//! 发送结果事件（notification.sent / notification.failed）统一经由
//! outbox 表落库，再由 [`crate::outbox::OutboxPublisher`] 异步投递到
//! Kafka。此处只抽象最终的投递动作，便于测试替换。

use async_trait::async_trait;

use notify_shared::Result;
use notify_shared::kafka::KafkaProducer;

/// 事件投递抽象
///
/// 生产实现为 Kafka producer，测试中可替换为内存实现。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// 将序列化后的事件负载投递到指定主题，key 用于分区路由
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()>;
}

/// 基于 Kafka 的投递实现
pub struct KafkaEventPublisher {
    producer: KafkaProducer,
}

impl KafkaEventPublisher {
    pub fn new(producer: KafkaProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        self.producer.send(topic, key, payload).await?;
        Ok(())
    }
}
