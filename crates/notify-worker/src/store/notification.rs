//! 通知记录的生命周期存储
//!
//! 状态机：pending -> sent | failed，sent -> read。所有状态迁移都在
//! SQL 的 WHERE 条件中校验前置状态，非法迁移表现为 0 行受影响，
//! 终态记录因此天然不可改写。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use notify_shared::Result;
use notify_shared::database::Database;
use notify_shared::events::NotificationStatus;

use crate::model::{Notification, SendNotificationInput};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// 写入 pending 状态的新通知记录
    async fn create(&self, input: &SendNotificationInput) -> Result<Notification>;

    /// pending -> sent，返回是否实际迁移
    async fn mark_sent(&self, id: Uuid) -> Result<bool>;

    /// pending -> failed，记录失败原因
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool>;

    /// sent -> read，仅允许记录归属者操作
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool>;

    /// 将早于 cutoff 仍处于 pending 的记录批量置为 failed，返回迁移行数
    async fn fail_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

pub struct PgNotificationStore {
    db: Database,
}

impl PgNotificationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, input: &SendNotificationInput) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications
                (id, user_id, template_id, channel, title, content, data, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING id, user_id, template_id, channel, title, content, data,
                      status, sent_at, read_at, error_message, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(input.template_id)
        .bind(input.channel.as_str())
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.data)
        .bind(NotificationStatus::Pending.as_str())
        .fetch_one(self.db.pool())
        .await?;

        Ok(notification)
    }

    async fn mark_sent(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, sent_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(NotificationStatus::Sent.as_str())
        .bind(id)
        .bind(NotificationStatus::Pending.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, error_message = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(NotificationStatus::Failed.as_str())
        .bind(error)
        .bind(id)
        .bind(NotificationStatus::Pending.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, read_at = NOW()
            WHERE id = $2 AND user_id = $3 AND status = $4
            "#,
        )
        .bind(NotificationStatus::Read.as_str())
        .bind(id)
        .bind(user_id)
        .bind(NotificationStatus::Sent.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, error_message = '发送超时：长时间停留在 pending'
            WHERE status = $2 AND created_at < $3
            "#,
        )
        .bind(NotificationStatus::Failed.as_str())
        .bind(NotificationStatus::Pending.as_str())
        .bind(cutoff)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
