//! notify-worker 服务入口
//!
//! 启动顺序：配置 -> 日志 -> 数据库 -> 存储与发送器 -> 发送协程池 ->
//! 分发器 -> 消费 / outbox / 巡检任务。所有发送器在启动时构造完成并
//! 注入，运行期没有懒加载路径。
//!
//! 关闭顺序与启动相反：先通过 watch 通道叫停消费循环与后台任务，
//! 再释放队列句柄让发送池排空，最后关闭数据库连接。

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};

use notify_shared::config::AppConfig;
use notify_shared::database::Database;
use notify_shared::events::Channel;
use notify_shared::kafka::KafkaProducer;
use notify_shared::observability;
use notify_shared::retry::RetryPolicy;

use notify_worker::consumer::TopicConsumer;
use notify_worker::dispatcher::Dispatcher;
use notify_worker::outbox::OutboxPublisher;
use notify_worker::pool::{SendExecutor, SendWorkerPool};
use notify_worker::publisher::KafkaEventPublisher;
use notify_worker::recipient::{PlaceholderDirectory, RecipientDirectory};
use notify_worker::sender::{ChannelSender, EmailSender, PushSender, SenderMap, SmsSender};
use notify_worker::store::{
    PgDeviceTokenStore, PgNotificationStore, PgOutboxStore, PgPreferenceStore, PgTemplateStore,
};
use notify_worker::sweeper::PendingSweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("notify-worker").context("加载配置失败")?;
    observability::init_tracing(&config.observability)?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "notify-worker 启动"
    );

    // 数据库可能比服务晚就绪，带退避重试建连
    let db = RetryPolicy::default()
        .run("database.connect", |e| e.is_retryable(), || {
            Database::connect(&config.database)
        })
        .await
        .context("连接数据库失败")?;
    db.health_check().await.context("数据库健康检查失败")?;

    // 存储层
    let templates = Arc::new(PgTemplateStore::new(db.clone()));
    let preferences = Arc::new(PgPreferenceStore::new(db.clone()));
    let device_tokens = Arc::new(PgDeviceTokenStore::new(db.clone()));
    let notifications = Arc::new(PgNotificationStore::new(db.clone()));
    let outbox_store = Arc::new(PgOutboxStore::new(db.clone()));

    // 渠道发送器，启动时一次性注入
    let directory: Arc<dyn RecipientDirectory> =
        Arc::new(PlaceholderDirectory::new(&config.recipient));
    let mut senders: SenderMap = SenderMap::new();
    senders.insert(
        Channel::Email,
        Arc::new(EmailSender::new(Arc::clone(&directory))) as Arc<dyn ChannelSender>,
    );
    senders.insert(
        Channel::Push,
        Arc::new(PushSender::new(device_tokens)) as Arc<dyn ChannelSender>,
    );
    senders.insert(
        Channel::Sms,
        Arc::new(SmsSender::new(directory)) as Arc<dyn ChannelSender>,
    );

    // 发送协程池
    let executor = Arc::new(SendExecutor::new(
        senders,
        notifications.clone(),
        outbox_store.clone(),
    ));
    let (queue, pool) = SendWorkerPool::start(&config.send_pool, executor);

    let dispatcher = Arc::new(Dispatcher::new(
        &config.dispatcher,
        templates,
        preferences,
        notifications.clone(),
        queue,
    ));

    // 关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 入站消费
    let consumer = TopicConsumer::start(&config.kafka, dispatcher, shutdown_rx.clone())
        .context("启动 Kafka 消费任务失败")?;

    // outbox 发布器
    let producer = KafkaProducer::new(&config.kafka).context("创建 Kafka 生产者失败")?;
    let outbox = OutboxPublisher::new(
        &config.outbox,
        outbox_store,
        Arc::new(KafkaEventPublisher::new(producer)),
    );
    let outbox_handle = tokio::spawn(outbox.run(shutdown_rx.clone()));

    // pending 巡检
    let sweeper = PendingSweeper::new(&config.sweeper, notifications);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    info!("notify-worker 就绪");

    tokio::signal::ctrl_c()
        .await
        .context("监听退出信号失败")?;
    info!("收到退出信号，开始优雅关闭");

    if shutdown_tx.send(true).is_err() {
        error!("发送关闭信号失败，所有任务已退出");
    }

    consumer.join().await;
    if let Err(e) = outbox_handle.await {
        error!(error = %e, "outbox 发布器异常退出");
    }
    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "巡检任务异常退出");
    }

    // 消费循环已停，不再有新任务入队，排空发送池
    pool.shutdown().await;

    db.close().await;
    info!("notify-worker 已退出");
    Ok(())
}
