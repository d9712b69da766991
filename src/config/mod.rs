// ==========================================
// 运输调度排车系统 - 配置层
// ==========================================
// 职责: 排车参数管理,支持 config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod planning_config;
pub mod planning_config_reader;

// 重导出核心配置
pub use config_manager::{config_keys, ConfigManager};
pub use planning_config::{ConstraintToggles, HandlingSetting, PlanningConfig};
pub use planning_config_reader::PlanningConfigReader;
