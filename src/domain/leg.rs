// ==========================================
// 运输调度排车系统 - 运输段领域模型
// ==========================================
// 红线: 运输段一经分配只属于一张派车单 (run_sheet_id 回写)
// 红线: 引擎不删除运输段
// ==========================================

use crate::domain::capacity::LoadVector;
use crate::domain::types::OperationType;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

// ==========================================
// TimeWindow - 时间窗
// ==========================================
// 两端均可缺省, 缺省端视为不设限
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        if let Some(start) = self.start {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if at > end {
                return false;
            }
        }
        true
    }
}

// ==========================================
// Leg - 运输段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    // ===== 主键 =====
    pub leg_id: String,

    // ===== 计划 =====
    pub scheduled_date: Option<NaiveDate>,
    pub sequence_no: i32,

    // ===== 起止地点 =====
    pub pick_address_id: String,
    pub drop_address_id: String,
    pub pick_mode: Option<String>, // 提货装货方式 (对应装卸参数)
    pub drop_mode: Option<String>, // 卸货方式
    pub pick_window: TimeWindow,
    pub drop_window: TimeWindow,
    pub distance_km: Option<f64>,  // 外部给定里程

    // ===== 货物 =====
    pub load: LoadVector,
    pub hazardous: bool,
    pub required_vehicle_type: Option<String>,

    // ===== 归属 =====
    pub parent_job_id: Option<String>,
    pub load_type: Option<String>, // 上级作业声明的货物类型
    pub operation_type: OperationType,
    pub run_sheet_id: Option<String>,
}

impl Leg {
    /// 运输段的有效排程日期
    ///
    /// 优先使用 scheduled_date, 缺省时回退到提货时间窗起点的日期
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.scheduled_date
            .or_else(|| self.pick_window.start.map(|t| t.date()))
    }

    /// 时间窗归一化排序值: 提货窗起点距当日零点的分钟数, 无时间窗排最后
    pub fn window_sort_key(&self) -> i64 {
        match self.pick_window.start {
            Some(t) => i64::from(t.time().num_seconds_from_midnight() / 60),
            None => i64::MAX,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.run_sheet_id.is_some()
    }

    pub fn is_connector(&self) -> bool {
        self.operation_type.is_connector()
    }

    /// 构造一条合成衔接段 (无货物、无上级作业)
    pub fn connector(
        leg_id: String,
        operation_type: OperationType,
        date: NaiveDate,
        from_address_id: &str,
        to_address_id: &str,
        run_sheet_id: &str,
    ) -> Self {
        Self {
            leg_id,
            scheduled_date: Some(date),
            sequence_no: 0,
            pick_address_id: from_address_id.to_string(),
            drop_address_id: to_address_id.to_string(),
            pick_mode: None,
            drop_mode: None,
            pick_window: TimeWindow::unbounded(),
            drop_window: TimeWindow::unbounded(),
            distance_km: None,
            load: LoadVector::zero(),
            hazardous: false,
            required_vehicle_type: None,
            parent_job_id: None,
            load_type: None,
            operation_type,
            run_sheet_id: Some(run_sheet_id.to_string()),
        }
    }
}
