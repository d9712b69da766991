// ==========================================
// 运输调度排车系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、约束规则记录
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod capacity;
pub mod leg;
pub mod resource;
pub mod rules;
pub mod run_sheet;
pub mod trip;
pub mod types;

// 重导出核心类型
pub use capacity::{CapacityConstraint, LoadVector};
pub use leg::{Leg, TimeWindow};
pub use resource::{Address, Driver, DriverFilter, LoadType, Vehicle};
pub use rules::{
    AdHocFactor, DailyWindow, Effectivity, PlateCodingRule, RouteRef, TruckBan, ZoningRule,
};
pub use run_sheet::{Consolidation, NewRunSheet, RunSheet, RunSheetEntry, TransportPlan};
pub use trip::{ConsolidationDraft, Trip};
pub use types::{
    AdHocImpact, CheckingMode, ConstraintFamily, HandlingMethod, OperationType, ResourceKind,
    RunSheetStatus,
};
