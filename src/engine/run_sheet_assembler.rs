// ==========================================
// 运输调度排车系统 - 派车单组装引擎
// ==========================================
// 红线: 一车 + 一司机 + 一日 = 一张未定稿派车单
// 红线: 衔接段在所有货运段挂载之后统一生成, 重复生成不产生重复记录
// ==========================================
// 职责:
// - 创建或复用派车单
// - 挂载货运段 (明细 + 运输段回写)
// - 生成衔接段: 场站->首个提货点 / 跨作业衔接 / 末个卸货点->场站
// ==========================================

use crate::config::PlanningConfig;
use crate::domain::leg::Leg;
use crate::domain::resource::{Driver, Vehicle};
use crate::domain::run_sheet::{NewRunSheet, RunSheet, TransportPlan};
use crate::domain::types::OperationType;
use crate::engine::error::EngineResult;
use crate::repository::{DispatchRepository, RepositoryError};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 衔接段规格 (类型, 起点, 终点)
type ConnectorSpec = (OperationType, String, String);

// ==========================================
// RunSheetAssembler
// ==========================================
pub struct RunSheetAssembler {
    repo: Arc<dyn DispatchRepository>,
    config: Arc<PlanningConfig>,
}

impl RunSheetAssembler {
    pub fn new(repo: Arc<dyn DispatchRepository>, config: Arc<PlanningConfig>) -> Self {
        Self { repo, config }
    }

    /// 场站: 车辆常驻场站 > 计划场站 > 配置默认场站
    pub fn resolve_depot(&self, vehicle: Option<&Vehicle>, plan: &TransportPlan) -> Option<String> {
        vehicle
            .and_then(|v| v.home_depot_address_id.clone())
            .or_else(|| plan.depot_address_id.clone())
            .or_else(|| self.config.default_depot_address_id.clone())
    }

    /// 创建或复用派车单
    ///
    /// # 规则
    /// - 车辆当日已有未定稿派车单且司机一致时复用
    /// - 否则新建 (缺失的车辆/司机留空); 车辆冲突由存储唯一约束拒绝
    ///
    /// # 返回
    /// (派车单, 是否复用)
    #[instrument(skip(self, vehicle, driver, plan), fields(
        vehicle_id = ?vehicle.map(|v| v.vehicle_id.as_str()),
        driver_id = ?driver.map(|d| d.driver_id.as_str()),
        plan_id = %plan.plan_id
    ))]
    pub fn create_or_reuse(
        &self,
        run_date: NaiveDate,
        vehicle: Option<&Vehicle>,
        driver: Option<&Driver>,
        consolidation_id: Option<&str>,
        plan: &TransportPlan,
    ) -> EngineResult<(RunSheet, bool)> {
        if let Some(v) = vehicle {
            if let Some(existing) = self
                .repo
                .find_open_run_sheet_for_vehicle(&v.vehicle_id, run_date)?
            {
                let driver_id = driver.map(|d| d.driver_id.as_str());
                if driver_id.is_some() && existing.driver_id.as_deref() == driver_id {
                    debug!(run_sheet_id = %existing.run_sheet_id, "复用已有派车单");
                    return Ok((existing, true));
                }
            }
        }

        let new_sheet = NewRunSheet {
            vehicle_id: vehicle.map(|v| v.vehicle_id.clone()),
            driver_id: driver.map(|d| d.driver_id.clone()),
            run_date,
            depot_address_id: self.resolve_depot(vehicle, plan),
            consolidation_id: consolidation_id.map(str::to_string),
            plan_id: Some(plan.plan_id.clone()),
        };
        let sheet = self.repo.create_run_sheet(&new_sheet)?;
        debug!(run_sheet_id = %sheet.run_sheet_id, "新建派车单");
        Ok((sheet, false))
    }

    /// 挂载货运段
    ///
    /// # 返回
    /// - true: 新挂载
    /// - false: 已在派车单中
    pub fn attach(&self, run_sheet_id: &str, leg: &Leg) -> EngineResult<bool> {
        let added =
            self.repo
                .append_run_sheet_entry(run_sheet_id, &leg.leg_id, OperationType::Cargo)?;
        self.repo.mark_leg_assigned(&leg.leg_id, run_sheet_id)?;
        Ok(added)
    }

    /// 生成衔接段
    ///
    /// 已有衔接段与本次计算结果一致时不做任何写入;
    /// 不一致时整体替换
    ///
    /// # 返回
    /// 新写入的衔接段数量
    #[instrument(skip(self))]
    pub fn add_connectors(&self, run_sheet_id: &str) -> EngineResult<usize> {
        let sheet = self
            .repo
            .get_run_sheet(run_sheet_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "run_sheet".to_string(),
                id: run_sheet_id.to_string(),
            })?;

        let entries = self.repo.list_run_sheet_entries(run_sheet_id)?;
        let cargo_ids: Vec<String> = entries
            .iter()
            .filter(|e| !e.operation_type.is_connector())
            .map(|e| e.leg_id.clone())
            .collect();
        let connector_ids: Vec<String> = entries
            .iter()
            .filter(|e| e.operation_type.is_connector())
            .map(|e| e.leg_id.clone())
            .collect();

        let mut cargo = self.repo.get_legs(&cargo_ids)?;
        if cargo.is_empty() {
            return Ok(0);
        }
        // 稳定排序: 同 sequence_no 保持挂载顺序
        cargo.sort_by_key(|l| l.sequence_no);

        let depot = sheet.depot_address_id.as_deref();
        let (wanted, route_plan) = plan_connectors(&cargo, depot);

        let existing: Vec<ConnectorSpec> = self
            .repo
            .get_legs(&connector_ids)?
            .into_iter()
            .map(|l| (l.operation_type, l.pick_address_id, l.drop_address_id))
            .collect();
        if existing == wanted {
            debug!(connectors = existing.len(), "衔接段未变化");
            return Ok(0);
        }

        let connectors: Vec<Leg> = wanted
            .iter()
            .enumerate()
            .map(|(idx, (op, from, to))| {
                Leg::connector(
                    format!("{}-C{:02}", run_sheet_id, idx + 1),
                    *op,
                    sheet.run_date,
                    from,
                    to,
                    run_sheet_id,
                )
            })
            .collect();

        let route: Vec<(String, OperationType)> = route_plan
            .into_iter()
            .map(|step| match step {
                RouteStep::Cargo(leg_id) => (leg_id, OperationType::Cargo),
                RouteStep::Connector(idx) => {
                    (connectors[idx].leg_id.clone(), connectors[idx].operation_type)
                }
            })
            .collect();

        self.repo.rewrite_route(run_sheet_id, &connectors, &route)?;
        info!(
            run_sheet_id,
            replaced = existing.len(),
            added = connectors.len(),
            "衔接段已生成"
        );
        Ok(connectors.len())
    }
}

enum RouteStep {
    Cargo(String),
    Connector(usize),
}

/// 计算衔接段与完整路线顺序
///
/// 起终点相同的衔接段省略; 无场站时不生成首尾衔接段
fn plan_connectors(cargo: &[Leg], depot: Option<&str>) -> (Vec<ConnectorSpec>, Vec<RouteStep>) {
    let mut specs: Vec<ConnectorSpec> = Vec::new();
    let mut route = Vec::new();

    fn push(
        specs: &mut Vec<ConnectorSpec>,
        route: &mut Vec<RouteStep>,
        op: OperationType,
        from: &str,
        to: &str,
    ) {
        if from != to {
            specs.push((op, from.to_string(), to.to_string()));
            route.push(RouteStep::Connector(specs.len() - 1));
        }
    }

    if let (Some(depot), Some(first)) = (depot, cargo.first()) {
        push(&mut specs, &mut route, OperationType::DepotToPick, depot, &first.pick_address_id);
    }
    for (i, leg) in cargo.iter().enumerate() {
        route.push(RouteStep::Cargo(leg.leg_id.clone()));
        if let Some(next) = cargo.get(i + 1) {
            if leg.parent_job_id != next.parent_job_id {
                push(
                    &mut specs,
                    &mut route,
                    OperationType::InterJob,
                    &leg.drop_address_id,
                    &next.pick_address_id,
                );
            }
        }
    }
    if let (Some(depot), Some(last)) = (depot, cargo.last()) {
        push(&mut specs, &mut route, OperationType::DropToDepot, &last.drop_address_id, depot);
    }
    (specs, route)
}
