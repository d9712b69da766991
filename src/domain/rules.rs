// ==========================================
// 运输调度排车系统 - 约束规则记录
// ==========================================
// 用途: 区域分类 / 尾号限行 / 货车禁行 / 临时交通因素
// 红线: 规则由外部维护, 引擎只读
// ==========================================

use crate::domain::types::AdHocImpact;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// RouteRef - 路线 (起点地址 -> 终点地址)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteRef {
    pub from_address_id: String,
    pub to_address_id: String,
}

impl RouteRef {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from_address_id: from.to_string(),
            to_address_id: to.to_string(),
        }
    }

    /// 双向匹配: A->B 与 B->A 视为同一路线
    pub fn matches(&self, from: &str, to: &str) -> bool {
        (self.from_address_id == from && self.to_address_id == to)
            || (self.from_address_id == to && self.to_address_id == from)
    }
}

/// 日期生效区间 (两端可缺省)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effectivity {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Effectivity {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |f| date >= f) && self.to.map_or(true, |t| date <= t)
    }
}

/// 一天内的时段 [start, end]; start > end 表示跨零点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            t >= self.start && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }
}

// ==========================================
// ZoningRule - 区域分类要求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoningRule {
    pub rule_id: String,
    pub required_tag: String,
    pub vehicle_type: Option<String>, // None 表示对所有车型生效
    pub active: bool,
}

impl ZoningRule {
    pub fn applies_to(&self, vehicle_type: &str) -> bool {
        self.active
            && self
                .vehicle_type
                .as_deref()
                .map_or(true, |t| t == vehicle_type)
    }
}

// ==========================================
// PlateCodingRule - 尾号限行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateCodingRule {
    pub rule_id: String,
    pub weekday: Weekday,
    pub restricted_digits: Vec<u8>,
    pub window: Option<DailyWindow>, // None 表示全天
    pub effectivity: Effectivity,
    pub active: bool,
}

// ==========================================
// TruckBan - 货车禁行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckBan {
    pub ban_id: String,
    pub name: String,
    pub vehicle_types: Vec<String>, // 为空表示所有车型
    pub all_day: bool,
    pub window: Option<DailyWindow>,
    pub weight_threshold_kg: Option<f64>,
    pub banned_addresses: Vec<String>,
    pub banned_routes: Vec<RouteRef>,
    pub alternative_routes: Vec<RouteRef>,
    pub effectivity: Effectivity,
    pub active: bool,
}

impl TruckBan {
    pub fn applies_to(&self, vehicle_type: &str) -> bool {
        self.vehicle_types.is_empty() || self.vehicle_types.iter().any(|t| t == vehicle_type)
    }

    pub fn is_active_at(&self, t: NaiveTime) -> bool {
        if self.all_day {
            return true;
        }
        self.window.map_or(true, |w| w.contains(t))
    }
}

// ==========================================
// AdHocFactor - 临时交通因素
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdHocFactor {
    pub factor_id: String,
    pub description: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub exempt_vehicle_types: Vec<String>,
    pub affected_addresses: Vec<String>,
    pub affected_routes: Vec<RouteRef>,
    pub impact: AdHocImpact,
    pub active: bool,
}

impl AdHocFactor {
    pub fn is_active_at(&self, at: NaiveDateTime) -> bool {
        self.active && at >= self.starts_at && at <= self.ends_at
    }

    pub fn exempts(&self, vehicle_type: &str) -> bool {
        self.exempt_vehicle_types.iter().any(|t| t == vehicle_type)
    }
}
