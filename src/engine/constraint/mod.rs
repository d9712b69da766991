// ==========================================
// 运输调度排车系统 - 约束校验引擎
// ==========================================
// 红线: 所有拒绝必须输出 reason
// 红线: 引擎不拼 SQL, 规则经由仓储读取
// ==========================================
// 职责: 评估 (车辆, 运输段/行程, 计划时刻) 是否满足六类约束
// 顺序: 时间窗 -> 地址可作业日 -> 区域分类 -> 尾号限行 -> 货车禁行 -> 临时交通因素
// 模式: STRICT 首个拒绝即返回; WARNING 拒绝降级为告警; DISABLED 不检查
// ==========================================

pub mod address_availability;
pub mod adhoc_factor;
pub mod plate_coding;
pub mod time_window;
pub mod truck_ban;
pub mod zoning;

use crate::config::PlanningConfig;
use crate::domain::leg::Leg;
use crate::domain::resource::{Address, Vehicle};
use crate::domain::rules::{AdHocFactor, PlateCodingRule, RouteRef, TruckBan, ZoningRule};
use crate::domain::trip::Trip;
use crate::domain::types::{CheckingMode, ConstraintFamily};
use crate::repository::{DispatchRepository, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub use time_window::LegTimeline;

// ==========================================
// ValidationOutcome - 校验结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub reason: Option<String>,
    pub delay_minutes: i64,
    pub alternatives: Vec<RouteRef>,
    pub warnings: Vec<String>,
    pub trace: Vec<String>,
}

impl ValidationOutcome {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    fn rejected(reason: String, alternatives: Vec<RouteRef>) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            alternatives,
            ..Self::default()
        }
    }
}

/// 校验对象
#[derive(Debug, Clone, Copy)]
pub enum ValidationTarget<'a> {
    Leg(&'a Leg),
    Trip(&'a Trip),
}

/// 单个约束族的判定
#[derive(Debug, Clone, PartialEq)]
pub enum FamilyVerdict {
    Pass,
    Reject {
        reason: String,
        alternatives: Vec<RouteRef>,
    },
    Delay {
        minutes: i64,
        note: String,
    },
}

impl FamilyVerdict {
    pub(crate) fn reject(reason: String) -> Self {
        FamilyVerdict::Reject {
            reason,
            alternatives: Vec::new(),
        }
    }
}

/// 一个日期上生效的规则集合 (未启用的约束族不取数)
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub zoning: Vec<ZoningRule>,
    pub plate_coding: Vec<PlateCodingRule>,
    pub truck_bans: Vec<TruckBan>,
    pub adhoc_factors: Vec<AdHocFactor>,
}

/// 单个运输段的校验上下文
pub struct CheckContext<'a> {
    pub vehicle: &'a Vehicle,
    pub leg: &'a Leg,
    pub scheduled_time: NaiveDateTime,
    pub pick: Option<&'a Address>,
    pub drop: Option<&'a Address>,
    pub rules: &'a RuleSet,
    pub config: &'a PlanningConfig,
}

// ==========================================
// ConstraintValidator - 约束校验引擎
// ==========================================
pub struct ConstraintValidator {
    repo: Arc<dyn DispatchRepository>,
    config: Arc<PlanningConfig>,
}

impl ConstraintValidator {
    pub fn new(repo: Arc<dyn DispatchRepository>, config: Arc<PlanningConfig>) -> Self {
        Self { repo, config }
    }

    fn is_active(&self) -> bool {
        self.config.checking_mode != CheckingMode::Disabled && self.config.constraints.any_enabled()
    }

    /// 运输段的计划出发时刻: 提货时间窗起点, 缺省为当日默认出发时刻
    pub fn planned_start(&self, leg: &Leg, run_date: NaiveDate) -> NaiveDateTime {
        leg.pick_window
            .start
            .unwrap_or_else(|| run_date.and_time(self.config.default_start_time))
    }

    /// 校验候选分配
    ///
    /// # 参数
    /// - vehicle: 候选车辆
    /// - target: 单个运输段或整个行程
    /// - scheduled_time: 到达 (首个) 提货点的时刻
    ///
    /// # 返回
    /// - DISABLED 或全部开关关闭: (true, None, 0, [])
    pub fn validate(
        &self,
        vehicle: &Vehicle,
        target: ValidationTarget<'_>,
        scheduled_time: NaiveDateTime,
    ) -> RepositoryResult<ValidationOutcome> {
        if !self.is_active() {
            return Ok(ValidationOutcome::accepted());
        }
        match target {
            ValidationTarget::Leg(leg) => {
                let rules = self.load_rules(scheduled_time.date())?;
                let (outcome, _) = self.check_leg(vehicle, leg, scheduled_time, &rules)?;
                Ok(self.apply_delay_threshold(outcome))
            }
            ValidationTarget::Trip(trip) => {
                let per_leg = self.validate_chain(vehicle, &trip.legs, scheduled_time)?;
                Ok(self.merge_trip(per_leg))
            }
        }
    }

    /// 按行程顺序逐段校验, 计划时刻链式推进
    ///
    /// 每段开始于 max(上一段完成时刻, 本段提货时间窗起点);
    /// 首段开始于 scheduled_time
    pub fn validate_each_leg(
        &self,
        vehicle: &Vehicle,
        trip: &Trip,
        scheduled_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<(String, ValidationOutcome)>> {
        if !self.is_active() {
            return Ok(trip
                .legs
                .iter()
                .map(|l| (l.leg_id.clone(), ValidationOutcome::accepted()))
                .collect());
        }
        let per_leg = self.validate_chain(vehicle, &trip.legs, scheduled_time)?;
        Ok(per_leg
            .into_iter()
            .map(|(id, outcome)| (id, self.apply_delay_threshold(outcome)))
            .collect())
    }

    fn validate_chain(
        &self,
        vehicle: &Vehicle,
        legs: &[Leg],
        scheduled_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<(String, ValidationOutcome)>> {
        let rules = self.load_rules(scheduled_time.date())?;
        let mut results = Vec::with_capacity(legs.len());
        let mut cursor: Option<NaiveDateTime> = None;

        for leg in legs {
            let start = match cursor {
                None => scheduled_time,
                Some(prev_completion) => match leg.pick_window.start {
                    Some(window_start) if window_start > prev_completion => window_start,
                    _ => prev_completion,
                },
            };
            let (outcome, completion) = self.check_leg(vehicle, leg, start, &rules)?;
            // 推演溢出时下一段沿用本段起点
            let delay = TimeDelta::try_minutes(outcome.delay_minutes);
            cursor = Some(
                completion
                    .zip(delay)
                    .and_then(|(c, d)| c.checked_add_signed(d))
                    .unwrap_or(start),
            );
            results.push((leg.leg_id.clone(), outcome));
        }
        Ok(results)
    }

    /// 单段校验, 返回 (结果, 完成时刻); 时间推演溢出时完成时刻为 None
    fn check_leg(
        &self,
        vehicle: &Vehicle,
        leg: &Leg,
        scheduled_time: NaiveDateTime,
        rules: &RuleSet,
    ) -> RepositoryResult<(ValidationOutcome, Option<NaiveDateTime>)> {
        let pick = self.repo.get_address(&leg.pick_address_id)?;
        let drop = self.repo.get_address(&leg.drop_address_id)?;
        let ctx = CheckContext {
            vehicle,
            leg,
            scheduled_time,
            pick: pick.as_ref(),
            drop: drop.as_ref(),
            rules,
            config: &self.config,
        };
        let completion = time_window::timeline(&ctx).map(|t| t.completion);

        let strict = self.config.checking_mode == CheckingMode::Strict;
        let mut outcome = ValidationOutcome::accepted();

        for family in ConstraintFamily::ALL {
            if !self.config.constraints.is_enabled(family) {
                continue;
            }
            let verdict = match family {
                ConstraintFamily::TimeWindow => time_window::check(&ctx),
                ConstraintFamily::AddressAvailability => address_availability::check(&ctx),
                ConstraintFamily::Zoning => zoning::check(&ctx),
                ConstraintFamily::PlateCoding => plate_coding::check(&ctx),
                ConstraintFamily::TruckBan => truck_ban::check(&ctx),
                ConstraintFamily::AdHocFactor => adhoc_factor::check(&ctx),
            };
            match verdict {
                FamilyVerdict::Pass => {
                    outcome.trace.push(format!("{}[{}]: PASS", family, leg.leg_id));
                }
                FamilyVerdict::Delay { minutes, note } => {
                    outcome.delay_minutes = outcome.delay_minutes.saturating_add(minutes);
                    outcome
                        .trace
                        .push(format!("{}[{}]: DELAY {}min ({})", family, leg.leg_id, minutes, note));
                }
                FamilyVerdict::Reject {
                    reason,
                    alternatives,
                } => {
                    let reason = format!("{}: leg={} {}", family, leg.leg_id, reason);
                    outcome.trace.push(format!("{}[{}]: REJECT", family, leg.leg_id));
                    outcome.alternatives.extend(alternatives);
                    if strict {
                        debug!(vehicle_id = %vehicle.vehicle_id, leg_id = %leg.leg_id, %reason, "约束拒绝");
                        outcome.ok = false;
                        outcome.reason = Some(reason);
                        return Ok((outcome, completion));
                    }
                    outcome.warnings.push(reason);
                }
            }
        }
        Ok((outcome, completion))
    }

    /// 临时因素累计延误超过阈值: STRICT 拒绝, WARNING 告警
    fn apply_delay_threshold(&self, mut outcome: ValidationOutcome) -> ValidationOutcome {
        if !outcome.ok || outcome.delay_minutes <= self.config.max_adhoc_delay_minutes {
            return outcome;
        }
        let reason = format!(
            "{}: 累计延误 {}min 超过阈值 {}min",
            ConstraintFamily::AdHocFactor,
            outcome.delay_minutes,
            self.config.max_adhoc_delay_minutes
        );
        match self.config.checking_mode {
            CheckingMode::Strict => {
                outcome.ok = false;
                outcome.reason = Some(reason);
            }
            _ => outcome.warnings.push(reason),
        }
        outcome
    }

    /// 合并行程内各段结果
    fn merge_trip(&self, per_leg: Vec<(String, ValidationOutcome)>) -> ValidationOutcome {
        let mut merged = ValidationOutcome::accepted();
        for (_, outcome) in per_leg {
            merged.delay_minutes += outcome.delay_minutes;
            merged.trace.extend(outcome.trace);
            merged.warnings.extend(outcome.warnings);
            merged.alternatives.extend(outcome.alternatives);
            if !outcome.ok {
                merged.ok = false;
                merged.reason = outcome.reason;
                return merged;
            }
        }
        self.apply_delay_threshold(merged)
    }

    fn load_rules(&self, date: NaiveDate) -> RepositoryResult<RuleSet> {
        let toggles = &self.config.constraints;
        let mut rules = RuleSet::default();
        if toggles.is_enabled(ConstraintFamily::Zoning) {
            rules.zoning = self.repo.get_zoning_rules()?;
        }
        if toggles.is_enabled(ConstraintFamily::PlateCoding) {
            rules.plate_coding = self.repo.get_plate_coding_rules(date)?;
        }
        if toggles.is_enabled(ConstraintFamily::TruckBan) {
            rules.truck_bans = self.repo.get_truck_bans(date)?;
        }
        if toggles.is_enabled(ConstraintFamily::AdHocFactor) {
            rules.adhoc_factors = self.repo.get_adhoc_factors(date)?;
        }
        Ok(rules)
    }
}
