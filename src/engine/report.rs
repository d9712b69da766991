// ==========================================
// 运输调度排车系统 - 排车结果报告
// ==========================================
// 红线: 单个行程/运输段的失败只记入报告, 不中断排车
// ==========================================

use serde::{Deserialize, Serialize};

/// 跳过原因: 排车被取消
pub const SKIP_CANCELLED: &str = "CANCELLED";
/// 跳过原因: 超过排车时限
pub const SKIP_DEADLINE_EXCEEDED: &str = "DEADLINE_EXCEEDED";

/// 被跳过的运输段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedLeg {
    pub leg_id: String,
    pub reason: String,
}

/// 行程/运输段级错误 (key 为 trip_id 或 leg_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationError {
    pub key: String,
    pub message: String,
}

/// 本次排车创建的拼单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSummary {
    pub consolidation_id: String,
    pub run_sheet_id: String,
    pub load_type: String,
    pub leg_count: usize,
}

// ==========================================
// AllocationReport - 排车结果报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub plan_id: String,
    pub created_with_vehicle: usize,
    pub created_without_vehicle: usize,
    pub reused: usize,
    pub attached_leg_count: usize,
    pub skipped: Vec<SkippedLeg>,
    pub errors: Vec<AllocationError>,
    pub consolidations_created: Vec<ConsolidationSummary>,
    pub connectors_added: usize,
    pub cancelled: bool,
    pub trace: Vec<String>,
}

impl AllocationReport {
    pub fn new(plan_id: &str) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            ..Self::default()
        }
    }

    pub fn skip(&mut self, leg_id: &str, reason: impl Into<String>) {
        self.skipped.push(SkippedLeg {
            leg_id: leg_id.to_string(),
            reason: reason.into(),
        });
    }

    pub fn error(&mut self, key: &str, message: impl Into<String>) {
        self.errors.push(AllocationError {
            key: key.to_string(),
            message: message.into(),
        });
    }

    pub fn trace(&mut self, line: impl Into<String>) {
        self.trace.push(line.into());
    }

    /// 本次新建的派车单总数
    pub fn created_total(&self) -> usize {
        self.created_with_vehicle + self.created_without_vehicle
    }
}
