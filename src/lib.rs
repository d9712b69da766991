// ==========================================
// 运输调度排车系统 - 核心库
// ==========================================
// 职责: 运输段按日拼车、车辆/司机匹配、约束校验、派车单生成
// 技术栈: Rust + SQLite
// 系统定位: 排车决策支持 (未能自动指派的派车单留待人工处理)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 排车参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 排车入口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CheckingMode, ConstraintFamily, OperationType, RunSheetStatus};

// 领域实体
pub use domain::{Leg, LoadVector, RunSheet, TransportPlan, Trip, Vehicle};

// 引擎
pub use engine::{
    AllocationOrchestrator, AllocationReport, CancellationFlag, ConstraintValidator,
    ReservationTable, ResourceMatcher, RunSheetAssembler, TripConsolidator,
};

// 仓储
pub use repository::{DispatchRepository, InMemoryDispatchRepository, SqliteDispatchRepository};

// API
pub use api::{ApiError, DispatchApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "运输调度排车系统";
