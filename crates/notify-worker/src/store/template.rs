//! 通知模板查询

use async_trait::async_trait;

use notify_shared::Result;
use notify_shared::database::Database;

use crate::model::Template;

/// 模板只读存储
///
/// 模板的增删改由管理端负责，本服务只做查询。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// 该事件类型下所有启用中的模板，每条模板各自产生一次发送
    async fn active_for_event(&self, event_type: &str) -> Result<Vec<Template>>;
}

pub struct PgTemplateStore {
    db: Database,
}

impl PgTemplateStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn active_for_event(&self, event_type: &str) -> Result<Vec<Template>> {
        let templates = sqlx::query_as::<_, Template>(
            r#"
            SELECT id, name, event_type, channel, subject_template, body_template,
                   is_active, created_at, updated_at
            FROM notification_templates
            WHERE event_type = $1 AND is_active = TRUE
            ORDER BY channel, updated_at DESC
            "#,
        )
        .bind(event_type)
        .fetch_all(self.db.pool())
        .await?;

        Ok(templates)
    }
}
