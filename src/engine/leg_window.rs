// ==========================================
// 运输调度排车系统 - 运输段取数与按日分组
// ==========================================
// 职责: 解析计划周期 -> 拉取未分配货运段 -> 按有效日期分组
// 红线: 无法确定日期口径时整体失败 (FetchFailed)
// ==========================================

use crate::domain::leg::Leg;
use crate::domain::run_sheet::TransportPlan;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::DispatchRepository;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 计划周期 [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 解析计划周期
///
/// 只给出一端时按单日处理; 两端都缺省时返回 None
pub fn resolve_horizon(plan: &TransportPlan) -> Option<Horizon> {
    match (plan.horizon_start, plan.horizon_end) {
        (Some(start), Some(end)) if start <= end => Some(Horizon { start, end }),
        (Some(start), Some(end)) => Some(Horizon {
            start: end,
            end: start,
        }),
        (Some(day), None) | (None, Some(day)) => Some(Horizon {
            start: day,
            end: day,
        }),
        (None, None) => None,
    }
}

// ==========================================
// LegWindow - 运输段窗口
// ==========================================
pub struct LegWindow;

impl LegWindow {
    /// 拉取计划周期内的未分配货运段, 按日期分组
    ///
    /// # 返回
    /// - BTreeMap: 日期升序; 组内保持仓储返回顺序
    pub fn fetch_by_date(
        repo: &dyn DispatchRepository,
        plan: &TransportPlan,
    ) -> EngineResult<BTreeMap<NaiveDate, Vec<Leg>>> {
        let horizon = resolve_horizon(plan).ok_or_else(|| {
            EngineError::FetchFailed(format!("计划 {} 缺少可用的日期字段", plan.plan_id))
        })?;

        let legs = repo
            .fetch_eligible_legs(horizon.start, horizon.end)
            .map_err(|e| EngineError::FetchFailed(format!("查询运输段失败: {}", e)))?;

        let grouped = group_by_date(legs);
        debug!(
            plan_id = %plan.plan_id,
            start = %horizon.start,
            end = %horizon.end,
            days = grouped.len(),
            "运输段按日分组完成"
        );
        Ok(grouped)
    }
}

/// 按有效日期分组; 无有效日期的运输段被丢弃并告警
pub fn group_by_date(legs: Vec<Leg>) -> BTreeMap<NaiveDate, Vec<Leg>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<Leg>> = BTreeMap::new();
    for leg in legs {
        match leg.effective_date() {
            Some(date) => grouped.entry(date).or_default().push(leg),
            None => warn!(leg_id = %leg.leg_id, "运输段缺少排程日期与提货时间窗, 已忽略"),
        }
    }
    grouped
}
