//! 指数退避重试
//!
//! 用于单次处理尝试内部的瞬时故障恢复（建连失败、供应商限流等）。
//! 与消费管道的重投递机制是两层：这里重试耗尽后该次尝试整体失败，
//! 后续由通知终态或 Kafka 重投递接手。

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::NotifyError;

/// 重试策略
///
/// 等待时间按 multiplier 逐次放大，封顶于 max_delay，避免重试风暴。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数，不含首次执行
    pub max_retries: u32,
    /// 首次重试前的等待时间
    pub initial_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
    /// 退避倍数
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待时间（attempt 从 0 起）
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as f64) as u64)
    }

    /// 执行操作，可重试错误按策略退避重试
    ///
    /// `is_retryable` 返回 false 的错误立即向上传播；重试次数耗尽后
    /// 返回最后一次的错误。
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        is_retryable: impl Fn(&NotifyError) -> bool,
        mut operation: F,
    ) -> Result<T, NotifyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NotifyError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation = operation_name, attempt, "操作在重试后成功");
                    }
                    return Ok(value);
                }
                Err(err) if !is_retryable(&err) => {
                    warn!(operation = operation_name, error = %err, "错误不可重试");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_retries => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "重试次数耗尽"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "操作失败，退避后重试"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
