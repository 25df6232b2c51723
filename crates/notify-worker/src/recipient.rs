//! 收件人联系方式解析
//!
//! 邮件与短信渠道需要把 user_id 解析为具体的联系地址。联系方式由
//! 用户档案服务持有而非本服务，这里以 trait 抽象解析过程，生产环境
//! 替换为真实的服务调用。

use async_trait::async_trait;
use uuid::Uuid;

use notify_shared::Result;
use notify_shared::config::RecipientConfig;

/// user_id -> 联系方式 的解析抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn email_for(&self, user_id: Uuid) -> Result<String>;
    async fn phone_for(&self, user_id: Uuid) -> Result<String>;
}

/// 基于配置的占位实现
///
/// 根据 user_id 生成确定性的占位地址，保证整条管道在没有用户档案
/// 服务的环境下可以端到端运行。
// TODO: 接入 user-service 的 gRPC 档案查询后替换此实现
pub struct PlaceholderDirectory {
    email_domain: String,
    phone: String,
}

impl PlaceholderDirectory {
    pub fn new(config: &RecipientConfig) -> Self {
        Self {
            email_domain: config.placeholder_email_domain.clone(),
            phone: config.placeholder_phone.clone(),
        }
    }
}

#[async_trait]
impl RecipientDirectory for PlaceholderDirectory {
    async fn email_for(&self, user_id: Uuid) -> Result<String> {
        Ok(format!("user-{}@{}", user_id, self.email_domain))
    }

    async fn phone_for(&self, _user_id: Uuid) -> Result<String> {
        Ok(self.phone.clone())
    }
}
