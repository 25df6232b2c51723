//! 入站事件消费
//!
//! 每个入站 topic 一个独立的消费循环（独立消费组后缀、独立 tokio
//! 任务），全部汇入同一个分发器。这里是错误分类的边界：
//!
//! - 不可重试错误（负载格式、缺失收件人）记录日志后按处理成功上报，
//!   让偏移量越过这条消息，坏消息不能阻塞分区；
//! - 可重试错误（数据库、Kafka 等基础设施故障）原样向上抛，偏移量
//!   不提交，消息等待重新投递。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use notify_shared::config::KafkaConfig;
use notify_shared::error::NotifyError;
use notify_shared::kafka::{ConsumerMessage, KafkaConsumer, topics};

use crate::dispatcher::Dispatcher;
use crate::error::WorkerError;

pub struct TopicConsumer {
    handles: Vec<JoinHandle<()>>,
}

impl TopicConsumer {
    /// 为每个入站 topic 启动一个消费任务
    pub fn start(
        config: &KafkaConfig,
        dispatcher: Arc<Dispatcher>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, NotifyError> {
        let mut handles = Vec::with_capacity(topics::EVENT_TOPICS.len());

        for &topic in topics::EVENT_TOPICS {
            let consumer = KafkaConsumer::new(config, Some(topic))?;
            consumer.subscribe(&[topic])?;

            let dispatcher = Arc::clone(&dispatcher);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                info!(topic, "入站 topic 消费任务启动");
                consumer
                    .run(shutdown, |msg| handle_message(&dispatcher, msg))
                    .await;
            }));
        }

        Ok(Self { handles })
    }

    /// 等待所有消费任务退出
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "消费任务异常退出");
            }
        }
    }
}

/// 单条消息的处理与错误分类
async fn handle_message(dispatcher: &Dispatcher, msg: ConsumerMessage) -> Result<(), NotifyError> {
    match dispatcher.process_event(&msg.topic, &msg.payload).await {
        Ok(()) => Ok(()),
        Err(WorkerError::Shared(inner)) if inner.is_retryable() => Err(inner),
        Err(e) => {
            // 重新投递也不会变好的消息，提交偏移量跳过
            warn!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                error = %e,
                "丢弃不可重试的事件"
            );
            Ok(())
        }
    }
}
