//! 应用状态管理
//!
//! 定义在请求处理器之间共享的状态。

use std::sync::Arc;

use crate::services::doc_generator::ResultAggregator;

/// 应用共享状态
///
/// 使用 Arc 包裹以便在多个处理器之间安全共享
#[derive(Clone)]
pub struct AppState {
    /// 文档批处理结果汇总（每批结束时取空）
    pub aggregator: Arc<ResultAggregator>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new() -> Self {
        Self {
            aggregator: Arc::new(ResultAggregator::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// 创建可共享的应用状态
pub fn create_shared_state() -> Arc<AppState> {
    Arc::new(AppState::new())
}
