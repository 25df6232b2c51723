//! 通知工作者服务
//!
//! 消费各业务服务发布的领域事件（投递提交、面试安排、职位推荐等），
//! 根据模板与用户偏好决定是否通知、如何通知，渲染消息后经
//! 邮件 / 推送 / 短信渠道异步发出，并逐次跟踪投递结果。
//!
//! 偏移量只在事件处理成功后提交，配合渠道发送的异步隔离，
//! 整条管道提供 at-least-once 投递语义。

pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod outbox;
pub mod pool;
pub mod publisher;
pub mod recipient;
pub mod renderer;
pub mod sender;
pub mod store;
pub mod sweeper;
