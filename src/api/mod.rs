// ==========================================
// 运输调度排车系统 - API 层
// ==========================================
// 职责: 提供排车入口, 供命令行与上层服务调用
// ==========================================

pub mod dispatch_api;
pub mod error;

// 重导出核心类型
pub use dispatch_api::DispatchApi;
pub use error::{ApiError, ApiResult};
