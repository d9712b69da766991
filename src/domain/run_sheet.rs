// ==========================================
// 运输调度排车系统 - 派车单领域模型
// ==========================================
// 红线: 一车 + 一司机 + 一日 = 一张未定稿派车单
// ==========================================

use crate::domain::types::{OperationType, RunSheetStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// TransportPlan - 运输计划 (排车入口)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportPlan {
    pub plan_id: String,
    pub horizon_start: Option<NaiveDate>,
    pub horizon_end: Option<NaiveDate>,
    pub depot_address_id: Option<String>,
}

// ==========================================
// RunSheet - 派车单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSheet {
    pub run_sheet_id: String,
    pub vehicle_id: Option<String>, // 未找到车辆时为空, 留待人工指派
    pub driver_id: Option<String>,
    pub run_date: NaiveDate,
    pub status: RunSheetStatus,
    pub depot_address_id: Option<String>,
    pub consolidation_id: Option<String>,
    pub plan_id: Option<String>,
}

/// 新建派车单请求
#[derive(Debug, Clone, PartialEq)]
pub struct NewRunSheet {
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub run_date: NaiveDate,
    pub depot_address_id: Option<String>,
    pub consolidation_id: Option<String>,
    pub plan_id: Option<String>,
}

// ==========================================
// RunSheetEntry - 派车单明细 (有序运输段引用)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSheetEntry {
    pub run_sheet_id: String,
    pub leg_id: String,
    pub position: i32,
    pub operation_type: OperationType,
}

// ==========================================
// Consolidation - 拼单记录
// ==========================================
// 创建后归计费/运营子系统所有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consolidation {
    pub consolidation_id: String,
    pub load_type: String,
    pub run_date: NaiveDate,
    pub job_ids: Vec<String>,
    pub leg_ids: Vec<String>,
}
