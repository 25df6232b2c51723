//! 设备令牌查询

use async_trait::async_trait;
use uuid::Uuid;

use notify_shared::Result;
use notify_shared::database::Database;

use crate::model::DeviceToken;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    /// 用户所有活跃设备的令牌，可能为空
    async fn active_tokens(&self, user_id: Uuid) -> Result<Vec<DeviceToken>>;
}

pub struct PgDeviceTokenStore {
    db: Database,
}

impl PgDeviceTokenStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeviceTokenStore for PgDeviceTokenStore {
    async fn active_tokens(&self, user_id: Uuid) -> Result<Vec<DeviceToken>> {
        let tokens = sqlx::query_as::<_, DeviceToken>(
            r#"
            SELECT id, user_id, device_type, token, is_active, created_at, updated_at
            FROM device_tokens
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(tokens)
    }
}
