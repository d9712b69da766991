// ==========================================
// 运输调度排车系统 - 车辆/司机匹配引擎
// ==========================================
// 红线: 不返回载量不足的车辆
// 红线: 找不到资源不是错误 (返回 None, 由派车单留待人工指派)
// ==========================================
// 车辆: 自有 -> 车型 -> 当日未被占用 -> 载量充足 -> 约束校验 -> 获取租约
// 司机: 在岗 -> 危险品资质 -> 同承运商 -> 当日未被占用 -> 获取租约
// 复用: 车辆已有本计划派车单时只能沿用该单司机; 该单无司机或司机不可用则跳过车辆
// 候选顺序: updated_at 倒序 (最近维护的资源优先)
// ==========================================

use crate::config::PlanningConfig;
use crate::domain::capacity::CapacityConstraint;
use crate::domain::resource::{Driver, DriverFilter, Vehicle};
use crate::domain::run_sheet::RunSheet;
use crate::domain::trip::Trip;
use crate::domain::types::ResourceKind;
use crate::engine::constraint::{ConstraintValidator, ValidationOutcome, ValidationTarget};
use crate::engine::error::EngineResult;
use crate::engine::reservation::{Lease, LeaseHolder, ReservationTable};
use crate::repository::DispatchRepository;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 车辆匹配结果
#[derive(Debug, Clone)]
pub struct VehicleMatch {
    pub vehicle: Vehicle,
    pub lease: Lease,
    pub validation: ValidationOutcome,
    /// 车辆当日已有的本计划派车单 (复用)
    pub reusable_sheet: Option<RunSheet>,
    /// 复用时沿用的司机, 租约已获取
    pub reused_driver: Option<DriverMatch>,
    /// 被约束拒绝的前序候选 (vehicle_id, reason)
    pub rejected: Vec<(String, String)>,
}

/// 司机匹配结果
#[derive(Debug, Clone)]
pub struct DriverMatch {
    pub driver: Driver,
    pub lease: Lease,
}

// ==========================================
// ResourceMatcher
// ==========================================
pub struct ResourceMatcher {
    repo: Arc<dyn DispatchRepository>,
    validator: Arc<ConstraintValidator>,
    reservations: Arc<ReservationTable>,
    config: Arc<PlanningConfig>,
}

impl ResourceMatcher {
    pub fn new(
        repo: Arc<dyn DispatchRepository>,
        validator: Arc<ConstraintValidator>,
        reservations: Arc<ReservationTable>,
        config: Arc<PlanningConfig>,
    ) -> Self {
        Self {
            repo,
            validator,
            reservations,
            config,
        }
    }

    /// 为行程查找可用车辆
    ///
    /// # 参数
    /// - trip: 行程
    /// - plan_id: 所属计划 (同计划已有派车单不视为占用)
    /// - holder: 租约持有者
    ///
    /// # 返回
    /// - Some(VehicleMatch): 首个通过全部检查的车辆, 租约已获取
    /// - None: 无可用车辆
    #[instrument(skip(self, trip, holder), fields(
        trip_id = %trip.trip_id,
        run_date = %trip.run_date,
        vehicle_type = ?trip.vehicle_type
    ))]
    pub fn find_vehicle(
        &self,
        trip: &Trip,
        plan_id: &str,
        holder: &LeaseHolder,
    ) -> EngineResult<Option<VehicleMatch>> {
        let candidates = self.repo.get_vehicles(trip.vehicle_type.as_deref(), true)?;
        let demand = trip.total_load();
        let start = match trip.legs.first() {
            Some(first) => self.validator.planned_start(first, trip.run_date),
            None => trip.run_date.and_time(self.config.default_start_time),
        };
        let mut rejected = Vec::new();

        for vehicle in candidates {
            let vehicle_id = vehicle.vehicle_id.as_str();

            if self.repo.run_sheet_exists_for(
                ResourceKind::Vehicle,
                vehicle_id,
                trip.run_date,
                Some(plan_id),
            )? {
                debug!(vehicle_id, "车辆当日已有未定稿派车单");
                continue;
            }
            // 其余未定稿派车单只可能属于本计划
            let reusable_sheet = self
                .repo
                .find_open_run_sheet_for_vehicle(vehicle_id, trip.run_date)?;
            if let Some(sheet) = &reusable_sheet {
                if sheet.driver_id.is_none() {
                    debug!(vehicle_id, run_sheet_id = %sheet.run_sheet_id, "本计划派车单未指派司机, 不可复用");
                    continue;
                }
            }
            if self.reservations.is_held_by_other(
                ResourceKind::Vehicle,
                vehicle_id,
                trip.run_date,
                holder,
            )? {
                debug!(vehicle_id, "车辆已被其他行程占用");
                continue;
            }

            let shortfall = demand.shortfall_dimensions(&vehicle.capacity);
            if !shortfall.is_empty() {
                debug!(vehicle_id, ?shortfall, "车辆载量不足");
                continue;
            }

            let validation =
                self.validator
                    .validate(&vehicle, ValidationTarget::Trip(trip), start)?;
            if !validation.ok {
                let reason = validation.reason.clone().unwrap_or_default();
                debug!(vehicle_id, %reason, "车辆未通过约束校验");
                rejected.push((vehicle.vehicle_id.clone(), reason));
                continue;
            }

            let Some(lease) = self.reservations.try_acquire(
                ResourceKind::Vehicle,
                vehicle_id,
                trip.run_date,
                holder,
            )?
            else {
                continue;
            };

            let reused_driver = match reusable_sheet.as_ref().and_then(|s| s.driver_id.as_deref()) {
                Some(driver_id) => {
                    match self.match_driver(trip, &vehicle, Some(driver_id), Some(plan_id), holder)? {
                        Some(m) => Some(m),
                        None => {
                            debug!(vehicle_id, driver_id, "原派车单司机不可用, 跳过车辆");
                            self.reservations.release(&lease)?;
                            continue;
                        }
                    }
                }
                None => None,
            };

            debug!(vehicle_id, reused = reusable_sheet.is_some(), "车辆匹配成功");
            return Ok(Some(VehicleMatch {
                vehicle,
                lease,
                validation,
                reusable_sheet,
                reused_driver,
                rejected,
            }));
        }

        debug!(rejected = rejected.len(), "无可用车辆");
        Ok(None)
    }

    /// 为行程与已选车辆查找司机
    ///
    /// 当日已有任何未定稿派车单的司机 (含本计划) 均视为占用:
    /// 车辆没有可复用的派车单时, 司机不能再出现在第二张派车单上
    #[instrument(skip(self, trip, vehicle, holder), fields(
        trip_id = %trip.trip_id,
        vehicle_id = %vehicle.vehicle_id
    ))]
    pub fn find_driver(
        &self,
        trip: &Trip,
        vehicle: &Vehicle,
        holder: &LeaseHolder,
    ) -> EngineResult<Option<DriverMatch>> {
        self.match_driver(trip, vehicle, None, None, holder)
    }

    fn match_driver(
        &self,
        trip: &Trip,
        vehicle: &Vehicle,
        only: Option<&str>,
        exclude_plan: Option<&str>,
        holder: &LeaseHolder,
    ) -> EngineResult<Option<DriverMatch>> {
        let filter = DriverFilter {
            active_only: true,
            hazmat_required: trip.any_hazardous(),
            carrier_id: vehicle.carrier_id.clone(),
        };

        for driver in self.repo.get_drivers(&filter)? {
            let driver_id = driver.driver_id.as_str();
            if only.is_some_and(|id| id != driver_id) {
                continue;
            }
            if self.repo.run_sheet_exists_for(
                ResourceKind::Driver,
                driver_id,
                trip.run_date,
                exclude_plan,
            )? {
                debug!(driver_id, "司机当日已有未定稿派车单");
                continue;
            }
            let Some(lease) = self.reservations.try_acquire(
                ResourceKind::Driver,
                driver_id,
                trip.run_date,
                holder,
            )?
            else {
                debug!(driver_id, "司机已被其他行程占用");
                continue;
            };
            return Ok(Some(DriverMatch { driver, lease }));
        }
        Ok(None)
    }
}
