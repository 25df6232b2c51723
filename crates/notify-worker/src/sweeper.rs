//! pending 巡检
//!
//! 发送任务在入队后、完成前进程崩溃会遗留 pending 记录。巡检任务
//! 周期性把停留超过阈值的 pending 批量置为 failed，保证记录最终
//! 收敛到终态。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use notify_shared::Result;
use notify_shared::config::SweeperConfig;

use crate::store::NotificationStore;

pub struct PendingSweeper {
    store: Arc<dyn NotificationStore>,
    poll_interval: Duration,
    stale_after: chrono::Duration,
}

impl PendingSweeper {
    pub fn new(config: &SweeperConfig, store: Arc<dyn NotificationStore>) -> Self {
        Self {
            store,
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            stale_after: chrono::Duration::seconds(config.stale_after_seconds),
        }
    }

    /// 执行一轮巡检，返回置为 failed 的记录数
    pub async fn sweep(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.stale_after;
        let failed = self.store.fail_stale_pending(cutoff).await?;
        if failed > 0 {
            warn!(failed, "巡检发现遗留的 pending 记录，已置为 failed");
        }
        Ok(failed)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!(
            interval_seconds = self.poll_interval.as_secs(),
            stale_after_seconds = self.stale_after.num_seconds(),
            "pending 巡检任务启动"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("pending 巡检任务退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "pending 巡检失败");
                    }
                }
            }
        }
    }
}
