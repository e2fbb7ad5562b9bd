use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::AppResult;

use super::FollowReconciler;

/// 周期性驱动订阅同步
pub struct PeriodicScheduler {
    reconciler: Arc<FollowReconciler>,
    interval: Duration,
    initial_delay: Duration,
}

impl PeriodicScheduler {
    pub fn new(reconciler: Arc<FollowReconciler>, interval: Duration, initial_delay: Duration) -> Self {
        Self {
            reconciler,
            interval,
            initial_delay,
        }
    }

    /// 同步一轮、休眠、再同步，永不正常返回
    ///
    /// 某一轮返回错误（存储不可用等）时直接返回该错误，由进程退出交给外部重启。
    pub async fn run(&self) -> AppResult<Infallible> {
        if !self.initial_delay.is_zero() {
            info!(delay_secs = self.initial_delay.as_secs(), "等待首轮同步");
            tokio::time::sleep(self.initial_delay).await;
        }

        loop {
            if let Err(e) = self.reconciler.run_pass().await {
                error!(error = %e, "同步轮次失败，调度器退出");
                return Err(e);
            }

            info!(interval_secs = self.interval.as_secs(), "等待下一轮同步");
            tokio::time::sleep(self.interval).await;
        }
    }
}
