// ==========================================
// 运输调度排车系统 - 排车参数
// ==========================================
// 职责: 一次排车调用所需的全部参数 (约束开关、检查模式、默认车速/载量、延误阈值)
// 红线: 显式传入各引擎构造函数, 不读全局状态
// ==========================================

use crate::domain::capacity::LoadVector;
use crate::domain::types::{CheckingMode, ConstraintFamily, HandlingMethod};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ConstraintToggles - 约束开关
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintToggles {
    pub master_enabled: bool,
    pub time_window: bool,
    pub address_availability: bool,
    pub zoning: bool,
    pub plate_coding: bool,
    pub truck_ban: bool,
    pub adhoc_factor: bool,
}

impl ConstraintToggles {
    pub fn all_enabled() -> Self {
        Self {
            master_enabled: true,
            time_window: true,
            address_availability: true,
            zoning: true,
            plate_coding: true,
            truck_ban: true,
            adhoc_factor: true,
        }
    }

    pub fn all_disabled() -> Self {
        Self {
            master_enabled: false,
            time_window: false,
            address_availability: false,
            zoning: false,
            plate_coding: false,
            truck_ban: false,
            adhoc_factor: false,
        }
    }

    /// 总开关关闭时任何约束族都视为关闭
    pub fn is_enabled(&self, family: ConstraintFamily) -> bool {
        if !self.master_enabled {
            return false;
        }
        match family {
            ConstraintFamily::TimeWindow => self.time_window,
            ConstraintFamily::AddressAvailability => self.address_availability,
            ConstraintFamily::Zoning => self.zoning,
            ConstraintFamily::PlateCoding => self.plate_coding,
            ConstraintFamily::TruckBan => self.truck_ban,
            ConstraintFamily::AdHocFactor => self.adhoc_factor,
        }
    }

    pub fn any_enabled(&self) -> bool {
        ConstraintFamily::ALL.iter().any(|f| self.is_enabled(*f))
    }
}

impl Default for ConstraintToggles {
    fn default() -> Self {
        Self::all_enabled()
    }
}

// ==========================================
// HandlingSetting - 装卸时长参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandlingSetting {
    pub method: HandlingMethod,
    pub base_minutes: f64,
    #[serde(default)]
    pub per_m3_minutes: f64,
    #[serde(default)]
    pub per_tonne_minutes: f64,
    #[serde(default)]
    pub max_minutes: Option<f64>,
}

impl HandlingSetting {
    pub fn fixed(base_minutes: f64) -> Self {
        Self {
            method: HandlingMethod::Fixed,
            base_minutes,
            per_m3_minutes: 0.0,
            per_tonne_minutes: 0.0,
            max_minutes: None,
        }
    }

    /// 计算装/卸货时长 (分钟)
    ///
    /// - FIXED: base
    /// - VOLUME_BASED: base + 体积 × per_m3
    /// - WEIGHT_BASED: base + 吨数 × per_tonne
    /// - COMBINED: base + 两项之和
    /// - 设置 max_minutes 时取上限
    pub fn duration_minutes(&self, load: &LoadVector) -> f64 {
        let tonnes = load.weight_kg / 1000.0;
        let raw = match self.method {
            HandlingMethod::Fixed => self.base_minutes,
            HandlingMethod::VolumeBased => self.base_minutes + load.volume_m3 * self.per_m3_minutes,
            HandlingMethod::WeightBased => self.base_minutes + tonnes * self.per_tonne_minutes,
            HandlingMethod::Combined => {
                self.base_minutes
                    + load.volume_m3 * self.per_m3_minutes
                    + tonnes * self.per_tonne_minutes
            }
        };
        let capped = match self.max_minutes {
            Some(max) => raw.min(max),
            None => raw,
        };
        capped.max(0.0)
    }
}

impl Default for HandlingSetting {
    fn default() -> Self {
        Self::fixed(30.0)
    }
}

// ==========================================
// PlanningConfig - 排车参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    pub constraints: ConstraintToggles,
    pub checking_mode: CheckingMode,
    pub default_speed_kph: f64,
    pub road_distance_factor: f64,    // 直线距离 -> 道路距离系数
    pub default_ceiling: LoadVector,  // 未选车时的装箱上限
    pub max_adhoc_delay_minutes: i64, // 临时因素累计延误阈值
    pub default_handling: HandlingSetting,
    pub handling_by_mode: HashMap<String, HandlingSetting>,
    pub default_depot_address_id: Option<String>,
    pub default_start_time: NaiveTime, // 运输段无提货时间窗时的计划出发时刻
    pub pass_deadline_secs: Option<u64>,
}

impl PlanningConfig {
    /// 查找装卸方式对应的参数, 未配置时回退到默认值
    pub fn handling_for(&self, mode: Option<&str>) -> &HandlingSetting {
        mode.and_then(|m| self.handling_by_mode.get(m))
            .unwrap_or(&self.default_handling)
    }

    /// 校验参数有效性
    ///
    /// # 验证规则
    /// 1. 默认车速、道路系数必须为正
    /// 2. 默认装箱上限各维度必须为正
    /// 3. 延误阈值不能为负
    /// 4. 装卸参数不能为负
    pub fn validate(&self) -> Result<(), String> {
        if !(self.default_speed_kph.is_finite() && self.default_speed_kph > 0.0) {
            return Err(format!("默认车速必须为正: {}", self.default_speed_kph));
        }
        if !(self.road_distance_factor.is_finite() && self.road_distance_factor > 0.0) {
            return Err(format!("道路距离系数必须为正: {}", self.road_distance_factor));
        }
        let c = &self.default_ceiling;
        if c.weight_kg <= 0.0 || c.volume_m3 <= 0.0 || c.pallets <= 0.0 {
            return Err(format!(
                "默认装箱上限必须为正: weight_kg={}, volume_m3={}, pallets={}",
                c.weight_kg, c.volume_m3, c.pallets
            ));
        }
        if self.max_adhoc_delay_minutes < 0 {
            return Err(format!(
                "临时因素延误阈值不能为负: {}",
                self.max_adhoc_delay_minutes
            ));
        }
        let settings = std::iter::once(("default", &self.default_handling)).chain(
            self.handling_by_mode
                .iter()
                .map(|(k, v)| (k.as_str(), v)),
        );
        for (mode, s) in settings {
            if s.base_minutes < 0.0 || s.per_m3_minutes < 0.0 || s.per_tonne_minutes < 0.0 {
                return Err(format!("装卸参数不能为负: mode={}", mode));
            }
        }
        Ok(())
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            constraints: ConstraintToggles::all_enabled(),
            checking_mode: CheckingMode::Strict,
            default_speed_kph: 40.0,
            road_distance_factor: 1.3,
            default_ceiling: LoadVector::new(10_000.0, 40.0, 18.0),
            max_adhoc_delay_minutes: 120,
            default_handling: HandlingSetting::default(),
            handling_by_mode: HashMap::new(),
            default_depot_address_id: None,
            default_start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            pass_deadline_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_switch_overrides_family_switch() {
        let mut toggles = ConstraintToggles::all_enabled();
        assert!(toggles.is_enabled(ConstraintFamily::PlateCoding));
        toggles.master_enabled = false;
        assert!(!toggles.is_enabled(ConstraintFamily::PlateCoding));
        assert!(!toggles.any_enabled());
    }

    #[test]
    fn test_handling_duration_methods() {
        let load = LoadVector::new(2000.0, 5.0, 2.0);
        let combined = HandlingSetting {
            method: HandlingMethod::Combined,
            base_minutes: 10.0,
            per_m3_minutes: 2.0,
            per_tonne_minutes: 5.0,
            max_minutes: None,
        };
        assert_eq!(combined.duration_minutes(&load), 30.0);

        let capped = HandlingSetting {
            max_minutes: Some(25.0),
            ..combined
        };
        assert_eq!(capped.duration_minutes(&load), 25.0);

        let by_weight = HandlingSetting {
            method: HandlingMethod::WeightBased,
            ..combined
        };
        assert_eq!(by_weight.duration_minutes(&load), 20.0);
    }

    #[test]
    fn test_validate_rejects_bad_speed() {
        let mut config = PlanningConfig::default();
        assert!(config.validate().is_ok());
        config.default_speed_kph = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_handling_for_falls_back_to_default() {
        let mut config = PlanningConfig::default();
        config
            .handling_by_mode
            .insert("PALLET".to_string(), HandlingSetting::fixed(45.0));
        assert_eq!(config.handling_for(Some("PALLET")).base_minutes, 45.0);
        assert_eq!(config.handling_for(Some("LOOSE")).base_minutes, 30.0);
        assert_eq!(config.handling_for(None).base_minutes, 30.0);
    }
}
