//! 持久层
//!
//! 按聚合拆分的存储 trait 与对应的 Postgres 实现。trait 作为测试缝隙，
//! 管道测试注入内存实现而不依赖数据库。SQL 全部使用运行期查询。

mod device_token;
mod notification;
mod outbox;
mod preference;
mod template;

pub use device_token::{DeviceTokenStore, PgDeviceTokenStore};
pub use notification::{NotificationStore, PgNotificationStore};
pub use outbox::{OutboxStore, PgOutboxStore};
pub use preference::{PgPreferenceStore, PreferenceStore};
pub use template::{PgTemplateStore, TemplateStore};

#[cfg(test)]
pub(crate) use notification::MockNotificationStore;
#[cfg(test)]
pub(crate) use preference::MockPreferenceStore;
#[cfg(test)]
pub(crate) use template::MockTemplateStore;
