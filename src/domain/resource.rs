// ==========================================
// 运输调度排车系统 - 资源领域模型
// ==========================================
// 用途: 车辆、司机、地址、货物类型 (均为外部维护, 引擎只读)
// ==========================================

use crate::domain::capacity::LoadVector;
use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// Vehicle - 车辆
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub vehicle_type: String,
    pub capacity: LoadVector,             // 额定载量
    pub internally_owned: bool,           // 仅自有车辆可参与排车
    pub license_plate: String,
    pub carrier_id: Option<String>,       // 所属承运商
    pub average_speed_kph: Option<f64>,   // 平均车速 (缺省用配置默认值)
    pub gross_weight_kg: Option<f64>,     // 车辆总重 (禁行重量阈值比较)
    pub plate_coding_exempt: bool,        // 车型是否豁免尾号限行
    pub home_depot_address_id: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl Vehicle {
    /// 车牌最后一个数字字符
    pub fn plate_last_digit(&self) -> Option<u8> {
        self.license_plate
            .chars()
            .rev()
            .find(|c| c.is_ascii_digit())
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
    }
}

// ==========================================
// Driver - 司机
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: String,
    pub name: String,
    pub active: bool,
    pub hazmat_endorsed: bool,
    pub carrier_id: Option<String>,
    pub updated_at: NaiveDateTime,
}

/// 司机查询条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverFilter {
    pub active_only: bool,
    pub hazmat_required: bool,
    pub carrier_id: Option<String>,
}

// ==========================================
// Address - 地址
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub address_id: String,
    pub address_type: String,
    /// 周一..周日 是否允许作业; None 表示未维护
    pub day_flags: [Option<bool>; 7],
    /// 区域分类标签; None 表示该地址类型未定义此字段
    pub zoning_tags: Option<Vec<String>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Address {
    /// 指定星期的作业许可标志
    pub fn day_flag(&self, weekday: Weekday) -> Option<bool> {
        self.day_flags[weekday.num_days_from_monday() as usize]
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

// ==========================================
// LoadType - 货物类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadType {
    pub load_type: String,
    pub allow_consolidation: bool,
}
