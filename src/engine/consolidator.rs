// ==========================================
// 运输调度排车系统 - 拼车引擎
// ==========================================
// 红线: 危险品段只能与危险品段同车
// 红线: 装箱不超过默认载量上限 (拼单组除外, 由车辆匹配兜底)
// ==========================================
// 职责: 将一天的运输段分组为行程
// 输入: 当日运输段 + 货物类型规则 + 是否拼单
// 输出: 有序行程列表 (同输入同输出)
// ==========================================

use crate::config::PlanningConfig;
use crate::domain::capacity::{CapacityConstraint, LoadVector};
use crate::domain::leg::Leg;
use crate::domain::resource::LoadType;
use crate::domain::trip::{ConsolidationDraft, Trip};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

// ==========================================
// Trait: TripPacker - 装箱策略
// ==========================================
pub trait TripPacker: Send + Sync {
    /// 将已排序的运输段装入若干行程
    ///
    /// # 参数
    /// - legs: 已排序、车型一致的运输段
    /// - ceiling: 单个行程的累计载量上限
    fn pack(&self, legs: Vec<Leg>, ceiling: &LoadVector) -> Vec<Vec<Leg>>;
}

/// 贪心装箱: 以下一个未装段开新行程, 顺序扫描剩余段, 能装则装
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyTripPacker;

impl TripPacker for GreedyTripPacker {
    fn pack(&self, legs: Vec<Leg>, ceiling: &LoadVector) -> Vec<Vec<Leg>> {
        let mut slots: Vec<Option<Leg>> = legs.into_iter().map(Some).collect();
        let mut trips = Vec::new();

        for i in 0..slots.len() {
            let Some(first) = slots[i].take() else {
                continue;
            };
            let hazardous = first.hazardous;
            let mut load = first.load;
            let mut trip = vec![first];

            for slot in slots.iter_mut().skip(i + 1) {
                let fits = match slot {
                    Some(candidate) => {
                        candidate.hazardous == hazardous
                            && load.can_add_load(&candidate.load, ceiling)
                    }
                    None => false,
                };
                if fits {
                    if let Some(candidate) = slot.take() {
                        load += candidate.load;
                        trip.push(candidate);
                    }
                }
            }
            trips.push(trip);
        }
        trips
    }
}

// ==========================================
// TripConsolidator - 拼车引擎
// ==========================================
pub struct TripConsolidator<P = GreedyTripPacker>
where
    P: TripPacker,
{
    packer: P,
    ceiling: LoadVector,
}

impl TripConsolidator<GreedyTripPacker> {
    pub fn new(config: &PlanningConfig) -> Self {
        Self::with_packer(config, GreedyTripPacker)
    }
}

impl<P> TripConsolidator<P>
where
    P: TripPacker,
{
    pub fn with_packer(config: &PlanningConfig, packer: P) -> Self {
        Self {
            packer,
            ceiling: config.default_ceiling,
        }
    }

    /// 将一天的运输段分组为行程
    ///
    /// # 规则
    /// 1) consolidate=true 时, 可拼单货物类型的运输段合并为一个行程并生成拼单草稿;
    ///    与组内首段车型或危险品标志不一致的段退回普通装箱
    /// 2) 剩余运输段按要求车型分组
    /// 3) 组内排序: 危险品优先 -> sequence_no -> 提货时间窗 (稳定排序)
    /// 4) 按载量上限装箱
    #[instrument(skip(self, legs, load_types), fields(legs_count = legs.len()))]
    pub fn consolidate(
        &self,
        run_date: NaiveDate,
        legs: Vec<Leg>,
        load_types: &[LoadType],
        consolidate: bool,
    ) -> Vec<Trip> {
        let mut trips = Vec::new();
        let mut remainder = legs;

        if consolidate {
            let consolidatable: HashSet<&str> = load_types
                .iter()
                .filter(|t| t.allow_consolidation)
                .map(|t| t.load_type.as_str())
                .collect();
            let (groups, rest) = partition_by_load_type(remainder, &consolidatable);
            remainder = rest;

            for (load_type, group) in groups {
                let (mut merged, fallback) = split_incompatible(group);
                remainder.extend(fallback);
                sort_for_route(&mut merged);

                let trip = build_trip(run_date, trips.len(), merged, None);
                let job_ids = trip.parent_jobs();
                debug!(
                    load_type = %load_type,
                    legs = trip.legs.len(),
                    jobs = job_ids.len(),
                    "拼单成组"
                );
                trips.push(Trip {
                    consolidation: Some(ConsolidationDraft {
                        load_type,
                        run_date,
                        job_ids,
                    }),
                    ..trip
                });
            }
        }

        // 退回的段需要回到原有顺序, 保证分组结果稳定
        remainder.sort_by(|a, b| {
            a.sequence_no
                .cmp(&b.sequence_no)
                .then_with(|| a.leg_id.cmp(&b.leg_id))
        });

        let mut by_type: BTreeMap<Option<String>, Vec<Leg>> = BTreeMap::new();
        for leg in remainder {
            by_type
                .entry(leg.required_vehicle_type.clone())
                .or_default()
                .push(leg);
        }

        for (vehicle_type, mut group) in by_type {
            sort_for_packing(&mut group);
            for packed in self.packer.pack(group, &self.ceiling) {
                let trip = build_trip(run_date, trips.len(), packed, vehicle_type.clone());
                trips.push(trip);
            }
        }

        debug!(run_date = %run_date, trips = trips.len(), "拼车完成");
        trips
    }
}

/// 按可拼单货物类型拆分 (组按首次出现顺序)
fn partition_by_load_type(
    legs: Vec<Leg>,
    consolidatable: &HashSet<&str>,
) -> (Vec<(String, Vec<Leg>)>, Vec<Leg>) {
    let mut groups: Vec<(String, Vec<Leg>)> = Vec::new();
    let mut rest = Vec::new();
    for leg in legs {
        let load_type = match leg.load_type.as_deref() {
            Some(t) if consolidatable.contains(t) => t.to_string(),
            _ => {
                rest.push(leg);
                continue;
            }
        };
        match groups.iter_mut().find(|(t, _)| *t == load_type) {
            Some((_, group)) => group.push(leg),
            None => groups.push((load_type, vec![leg])),
        }
    }
    (groups, rest)
}

/// 以组内首段为准, 拆出车型或危险品标志不一致的段
fn split_incompatible(group: Vec<Leg>) -> (Vec<Leg>, Vec<Leg>) {
    let Some(lead) = group.first() else {
        return (Vec::new(), Vec::new());
    };
    let lead_type = lead.required_vehicle_type.clone();
    let lead_hazardous = lead.hazardous;
    group
        .into_iter()
        .partition(|l| l.required_vehicle_type == lead_type && l.hazardous == lead_hazardous)
}

fn sort_for_packing(legs: &mut [Leg]) {
    legs.sort_by(|a, b| {
        b.hazardous
            .cmp(&a.hazardous)
            .then(a.sequence_no.cmp(&b.sequence_no))
            .then(a.window_sort_key().cmp(&b.window_sort_key()))
    });
}

fn sort_for_route(legs: &mut [Leg]) {
    legs.sort_by(|a, b| {
        a.sequence_no
            .cmp(&b.sequence_no)
            .then(a.window_sort_key().cmp(&b.window_sort_key()))
    });
}

fn build_trip(
    run_date: NaiveDate,
    index: usize,
    legs: Vec<Leg>,
    vehicle_type: Option<String>,
) -> Trip {
    let vehicle_type = vehicle_type.or_else(|| {
        legs.first()
            .and_then(|l| l.required_vehicle_type.clone())
    });
    let hazardous = legs.first().map(|l| l.hazardous).unwrap_or(false);
    Trip {
        trip_id: format!("TRIP-{}-{:03}", run_date.format("%Y%m%d"), index + 1),
        run_date,
        vehicle_type,
        hazardous,
        legs,
        consolidation: None,
    }
}
