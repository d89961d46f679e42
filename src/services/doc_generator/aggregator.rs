//! 结果汇总
//!
//! 进程级共享，由 `AppState` 持有；每次批处理结束时整体取出。

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use super::types::FileOutcome;

/// 批处理结果收集器
#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcomes: Mutex<Vec<FileOutcome>>,
    /// 保证批处理之间不交错
    batch: AsyncMutex<()>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&self, outcome: FileOutcome) {
        self.outcomes.lock().push(outcome);
    }

    /// 取出全部结果并清空
    pub fn drain(&self) -> Vec<FileOutcome> {
        std::mem::take(&mut *self.outcomes.lock())
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.lock().is_empty()
    }

    /// 独占一次批处理，守卫释放前其他批处理等待
    pub async fn begin_batch(&self) -> MutexGuard<'_, ()> {
        self.batch.lock().await
    }
}
