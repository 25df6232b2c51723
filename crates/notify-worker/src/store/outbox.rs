//! 事件 outbox 存储
//!
//! 出站事件先与业务写入同库落盘，再由后台发布器投递到 Kafka，
//! 避免"数据库已更新但事件丢失"的窗口。

use async_trait::async_trait;
use uuid::Uuid;

use notify_shared::Result;
use notify_shared::database::Database;

use crate::model::OutboxEvent;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// 追加一条待发布事件
    async fn enqueue(&self, event_type: &str, payload: serde_json::Value) -> Result<()>;

    /// 按写入顺序取一批待发布事件
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>>;

    /// 标记事件已发布
    async fn mark_published(&self, id: Uuid) -> Result<()>;
}

pub struct PgOutboxStore {
    db: Database,
}

impl PgOutboxStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn enqueue(&self, event_type: &str, payload: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_outbox (id, event_type, payload, status, created_at)
            VALUES ($1, $2, $3, 'pending', NOW())
            "#,
        )
        // v7 与写入时间同序，扫描批次天然按事件产生顺序排列
        .bind(Uuid::now_v7())
        .bind(event_type)
        .bind(payload)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, event_type, payload, status, created_at, published_at
            FROM event_outbox
            WHERE status = 'pending'
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(events)
    }

    async fn mark_published(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE event_outbox
            SET status = 'published', published_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}
