//! 共享库
//!
//! 包含通知系统各服务共用的配置、错误处理、数据库连接、Kafka 封装、
//! 重试策略与事件模型等基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod kafka;
pub mod observability;
pub mod retry;

pub use error::{NotifyError, Result};
