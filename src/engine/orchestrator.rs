// ==========================================
// 运输调度排车系统 - 排车编排器
// ==========================================
// 用途: 协调取数、拼车、资源匹配、约束校验、派车单组装
// 红线: 只有取数失败终止排车; 行程级失败记入报告后继续
// 红线: 衔接段在全部货运段挂载完成后统一生成
// ==========================================
// 流程: 取数 -> 按日分组 -> 每日 {拼车 -> 每个行程 [匹配车辆 -> 匹配司机
//       -> 逐段校验 -> 组装派车单]} -> 生成衔接段 -> 回写计划关联 -> 报告
// ==========================================

use crate::config::PlanningConfig;
use crate::domain::leg::Leg;
use crate::domain::resource::{Driver, Vehicle};
use crate::domain::run_sheet::{Consolidation, TransportPlan};
use crate::domain::trip::Trip;
use crate::domain::types::CheckingMode;
use crate::engine::constraint::ConstraintValidator;
use crate::engine::consolidator::TripConsolidator;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::leg_window::LegWindow;
use crate::engine::report::{
    AllocationReport, ConsolidationSummary, SKIP_CANCELLED, SKIP_DEADLINE_EXCEEDED,
};
use crate::engine::reservation::{Lease, LeaseHolder, ReservationTable};
use crate::engine::resource_matcher::ResourceMatcher;
use crate::engine::run_sheet_assembler::RunSheetAssembler;
use crate::repository::DispatchRepository;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// CancellationFlag - 协作式取消标志
// ==========================================
// 在行程之间检查; 已开始的行程会完整执行
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 单次排车过程的可变状态
struct PassState {
    pass_id: String,
    deadline: Option<Instant>,
    report: AllocationReport,
    touched_run_sheets: Vec<String>,
    stop_reason: Option<&'static str>,
}

impl PassState {
    fn touch(&mut self, run_sheet_id: &str) {
        if !self.touched_run_sheets.iter().any(|id| id == run_sheet_id) {
            self.touched_run_sheets.push(run_sheet_id.to_string());
        }
    }
}

// ==========================================
// AllocationOrchestrator - 排车编排器
// ==========================================
pub struct AllocationOrchestrator {
    repo: Arc<dyn DispatchRepository>,
    config: Arc<PlanningConfig>,
    consolidator: TripConsolidator,
    validator: Arc<ConstraintValidator>,
    matcher: ResourceMatcher,
    assembler: RunSheetAssembler,
    reservations: Arc<ReservationTable>,
    cancel: CancellationFlag,
}

impl AllocationOrchestrator {
    /// 创建新的编排器实例 (独占资源占用表)
    ///
    /// # 参数
    /// - repo: 排车仓储
    /// - config: 排车参数
    pub fn new(repo: Arc<dyn DispatchRepository>, config: Arc<PlanningConfig>) -> Self {
        Self::with_reservations(repo, config, Arc::new(ReservationTable::new()))
    }

    /// 创建共享资源占用表的编排器实例
    pub fn with_reservations(
        repo: Arc<dyn DispatchRepository>,
        config: Arc<PlanningConfig>,
        reservations: Arc<ReservationTable>,
    ) -> Self {
        let validator = Arc::new(ConstraintValidator::new(repo.clone(), config.clone()));
        Self {
            consolidator: TripConsolidator::new(&config),
            matcher: ResourceMatcher::new(
                repo.clone(),
                validator.clone(),
                reservations.clone(),
                config.clone(),
            ),
            assembler: RunSheetAssembler::new(repo.clone(), config.clone()),
            validator,
            reservations,
            cancel: CancellationFlag::new(),
            repo,
            config,
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn reservations(&self) -> Arc<ReservationTable> {
        self.reservations.clone()
    }

    /// 为运输计划执行一次完整排车
    ///
    /// # 参数
    /// - plan_id: 运输计划ID
    /// - consolidate: 是否按货物类型拼单
    ///
    /// # 返回
    /// - Ok(AllocationReport): 排车结果 (含行程级错误)
    /// - Err(EngineError::InvalidConfig): 排车参数未通过校验, 不做任何写入
    /// - Err(EngineError::FetchFailed): 计划不存在 / 周期无法解析 / 取数失败
    #[instrument(skip(self))]
    pub fn allocate_for_plan(
        &self,
        plan_id: &str,
        consolidate: bool,
    ) -> EngineResult<AllocationReport> {
        self.config.validate().map_err(EngineError::InvalidConfig)?;

        // ==========================================
        // 步骤1: 取数
        // ==========================================
        let plan = self
            .repo
            .get_plan(plan_id)
            .map_err(|e| EngineError::FetchFailed(format!("查询计划失败: {}", e)))?
            .ok_or_else(|| EngineError::FetchFailed(format!("计划不存在: {}", plan_id)))?;
        let by_date = LegWindow::fetch_by_date(self.repo.as_ref(), &plan)?;
        let load_types = self
            .repo
            .get_load_types()
            .map_err(|e| EngineError::FetchFailed(format!("查询货物类型失败: {}", e)))?;

        let mut pass = PassState {
            pass_id: Uuid::new_v4().to_string(),
            deadline: self
                .config
                .pass_deadline_secs
                .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
            report: AllocationReport::new(plan_id),
            touched_run_sheets: Vec::new(),
            stop_reason: None,
        };

        info!(
            pass_id = %pass.pass_id,
            days = by_date.len(),
            legs = by_date.values().map(Vec::len).sum::<usize>(),
            "开始排车"
        );

        // ==========================================
        // 步骤2: 按日拼车并逐个行程排车
        // ==========================================
        for (run_date, legs) in by_date {
            let trips = self
                .consolidator
                .consolidate(run_date, legs, &load_types, consolidate);
            debug!(%run_date, trips = trips.len(), "拼车完成");

            for trip in &trips {
                if pass.stop_reason.is_none() {
                    pass.stop_reason = self.check_stop(pass.deadline);
                }
                if let Some(reason) = pass.stop_reason {
                    for leg in &trip.legs {
                        pass.report.skip(&leg.leg_id, reason);
                    }
                    continue;
                }

                if let Err(e) = self.allocate_trip(&plan, trip, &mut pass) {
                    warn!(trip_id = %trip.trip_id, error = %e, "行程排车失败");
                    pass.report.error(&trip.trip_id, e.to_string());
                }
            }
        }
        if let Some(reason) = pass.stop_reason {
            info!(reason, "排车提前结束");
            pass.report.cancelled = true;
        }

        // ==========================================
        // 步骤3: 生成衔接段
        // ==========================================
        for run_sheet_id in pass.touched_run_sheets.clone() {
            match self.assembler.add_connectors(&run_sheet_id) {
                Ok(added) => pass.report.connectors_added += added,
                Err(e) => {
                    warn!(%run_sheet_id, error = %e, "衔接段生成失败");
                    pass.report.error(&run_sheet_id, e.to_string());
                }
            }
        }

        // 落库后的派车单本身即占用记录, 批次租约可整体清理
        if let Err(e) = self.reservations.release_pass(&pass.pass_id) {
            warn!(error = %e, "批次租约清理失败");
        }

        let report = pass.report;
        info!(
            created_with_vehicle = report.created_with_vehicle,
            created_without_vehicle = report.created_without_vehicle,
            reused = report.reused,
            attached = report.attached_leg_count,
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            connectors = report.connectors_added,
            "排车完成"
        );
        Ok(report)
    }

    fn check_stop(&self, deadline: Option<Instant>) -> Option<&'static str> {
        if self.cancel.is_cancelled() {
            return Some(SKIP_CANCELLED);
        }
        match deadline {
            Some(d) if Instant::now() >= d => Some(SKIP_DEADLINE_EXCEEDED),
            _ => None,
        }
    }

    /// 单个行程排车; 结束时释放本行程未提交的租约
    fn allocate_trip(
        &self,
        plan: &TransportPlan,
        trip: &Trip,
        pass: &mut PassState,
    ) -> EngineResult<()> {
        let holder = LeaseHolder::new(&pass.pass_id, &trip.trip_id);
        let mut leases: Vec<Lease> = Vec::new();
        let outcome = self.assign_trip(plan, trip, &holder, &mut leases, pass);
        for lease in &leases {
            self.reservations.release(lease)?;
        }
        outcome
    }

    fn assign_trip(
        &self,
        plan: &TransportPlan,
        trip: &Trip,
        holder: &LeaseHolder,
        leases: &mut Vec<Lease>,
        pass: &mut PassState,
    ) -> EngineResult<()> {
        // ===== 匹配车辆与司机 =====
        let (vehicle, driver) = self.match_resources(plan, trip, holder, leases, pass)?;

        // ===== 逐段校验 =====
        let accepted = match &vehicle {
            Some(v) => self.validate_legs(v, trip, &mut pass.report)?,
            None => trip.legs.iter().collect(),
        };
        if accepted.is_empty() {
            pass.report
                .trace(format!("{}: 全部运输段未通过校验", trip.trip_id));
            return Ok(());
        }

        // ===== 组装派车单 =====
        // 拼单记录在派车单落库之后才写入, 派车单失败时不留孤立拼单
        let consolidation_id = trip
            .consolidation
            .as_ref()
            .map(|_| Uuid::new_v4().to_string());
        let (sheet, reused) = self.assembler.create_or_reuse(
            trip.run_date,
            vehicle.as_ref(),
            driver.as_ref(),
            consolidation_id.as_deref(),
            plan,
        )?;
        if reused {
            pass.report.reused += 1;
        } else if sheet.vehicle_id.is_some() {
            pass.report.created_with_vehicle += 1;
        } else {
            pass.report.created_without_vehicle += 1;
        }

        for leg in &accepted {
            if self.assembler.attach(&sheet.run_sheet_id, leg)? {
                pass.report.attached_leg_count += 1;
            }
        }
        for lease in leases.iter() {
            self.reservations.commit(lease)?;
        }
        self.repo
            .link_run_sheet_to_plan(&plan.plan_id, &sheet.run_sheet_id)?;
        pass.touch(&sheet.run_sheet_id);

        // ===== 拼单落库 =====
        if let (Some(draft), Some(consolidation_id)) = (&trip.consolidation, consolidation_id) {
            let record = Consolidation {
                consolidation_id,
                load_type: draft.load_type.clone(),
                run_date: draft.run_date,
                job_ids: draft.job_ids.clone(),
                leg_ids: accepted.iter().map(|l| l.leg_id.clone()).collect(),
            };
            self.repo.persist_consolidation(&record)?;
            pass.report.consolidations_created.push(ConsolidationSummary {
                consolidation_id: record.consolidation_id,
                run_sheet_id: sheet.run_sheet_id.clone(),
                load_type: record.load_type,
                leg_count: accepted.len(),
            });
        }

        debug!(
            trip_id = %trip.trip_id,
            run_sheet_id = %sheet.run_sheet_id,
            reused,
            legs = accepted.len(),
            "行程排车完成"
        );
        Ok(())
    }

    fn match_resources(
        &self,
        plan: &TransportPlan,
        trip: &Trip,
        holder: &LeaseHolder,
        leases: &mut Vec<Lease>,
        pass: &mut PassState,
    ) -> EngineResult<(Option<Vehicle>, Option<Driver>)> {
        let Some(found) = self.matcher.find_vehicle(trip, &plan.plan_id, holder)? else {
            pass.report
                .trace(format!("{}: 无可用车辆, 派车单留待人工指派", trip.trip_id));
            return Ok((None, None));
        };
        for (vehicle_id, reason) in &found.rejected {
            pass.report.trace(format!(
                "{}: 车辆 {} 被拒绝: {}",
                trip.trip_id, vehicle_id, reason
            ));
        }
        leases.push(found.lease.clone());

        if let Some(sheet) = &found.reusable_sheet {
            pass.report.trace(format!(
                "{}: 车辆 {} 复用本计划派车单 {}",
                trip.trip_id, found.vehicle.vehicle_id, sheet.run_sheet_id
            ));
        }
        let driver_match = match found.reused_driver {
            Some(m) => Some(m),
            None => self.matcher.find_driver(trip, &found.vehicle, holder)?,
        };
        let driver = match driver_match {
            Some(m) => {
                leases.push(m.lease.clone());
                Some(m.driver)
            }
            None => {
                pass.report
                    .trace(format!("{}: 无可用司机", trip.trip_id));
                None
            }
        };
        Ok((Some(found.vehicle), driver))
    }

    /// 逐段校验, 返回可挂载的运输段
    ///
    /// STRICT: 被拒绝的运输段记为跳过; WARNING: 拒绝原因只记入 trace
    fn validate_legs<'t>(
        &self,
        vehicle: &Vehicle,
        trip: &'t Trip,
        report: &mut AllocationReport,
    ) -> EngineResult<Vec<&'t Leg>> {
        let Some(first) = trip.legs.first() else {
            return Ok(Vec::new());
        };
        let start = self.validator.planned_start(first, trip.run_date);
        let outcomes = self.validator.validate_each_leg(vehicle, trip, start)?;
        let strict = self.config.checking_mode == CheckingMode::Strict;

        let mut accepted = Vec::with_capacity(trip.legs.len());
        for (leg, (leg_id, outcome)) in trip.legs.iter().zip(outcomes) {
            for warning in &outcome.warnings {
                report.trace(format!("{}: WARN {}", leg_id, warning));
            }
            if outcome.ok || !strict {
                accepted.push(leg);
            } else {
                let reason = outcome.reason.unwrap_or_default();
                debug!(%leg_id, %reason, "运输段未通过校验");
                report.skip(&leg_id, reason);
            }
        }
        Ok(accepted)
    }
}
