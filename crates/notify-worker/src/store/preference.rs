//! 用户通知偏好查询

use async_trait::async_trait;
use uuid::Uuid;

use notify_shared::Result;
use notify_shared::database::Database;

use crate::model::UserPreference;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// 查询用户偏好
    ///
    /// 用户未配置过偏好时返回全渠道开启的默认值，而非报错。
    /// 静默用户需要显式写入关闭配置。
    async fn get(&self, user_id: Uuid) -> Result<UserPreference>;
}

pub struct PgPreferenceStore {
    db: Database,
}

impl PgPreferenceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn get(&self, user_id: Uuid) -> Result<UserPreference> {
        let preference = sqlx::query_as::<_, UserPreference>(
            r#"
            SELECT user_id, email_enabled, push_enabled, sms_enabled,
                   disabled_event_types, created_at, updated_at
            FROM user_notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(preference.unwrap_or_else(|| UserPreference::default_for(user_id)))
    }
}
