// ==========================================
// 运输调度排车系统 - 引擎层错误类型
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误
///
/// 只有取数阶段的失败会终止整个排车过程,
/// 单个行程 / 运输段的失败记入报告后继续
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("取数失败: {0}")]
    FetchFailed(String),

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("资源占用表锁获取失败: {0}")]
    ReservationLock(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type EngineResult<T> = Result<T, EngineError>;
