// ==========================================
// 运输调度排车系统 - 载量领域模型
// ==========================================
// 红线: 车辆载量约束优先于拼车合并
// 用途: 行程累计载量、车辆额定载量、默认装载上限
// ==========================================

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

// ==========================================
// LoadVector - 三维载量
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadVector {
    pub weight_kg: f64, // 重量 (千克)
    pub volume_m3: f64, // 体积 (立方米)
    pub pallets: f64,   // 托盘数
}

impl LoadVector {
    pub fn new(weight_kg: f64, volume_m3: f64, pallets: f64) -> Self {
        Self {
            weight_kg,
            volume_m3,
            pallets,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

impl Add for LoadVector {
    type Output = LoadVector;

    fn add(self, rhs: LoadVector) -> LoadVector {
        LoadVector {
            weight_kg: self.weight_kg + rhs.weight_kg,
            volume_m3: self.volume_m3 + rhs.volume_m3,
            pallets: self.pallets + rhs.pallets,
        }
    }
}

impl AddAssign for LoadVector {
    fn add_assign(&mut self, rhs: LoadVector) {
        *self = *self + rhs;
    }
}

// ==========================================
// Trait: CapacityConstraint
// ==========================================
// 用途: 拼车装箱与车辆匹配的载量检查接口
pub trait CapacityConstraint {
    /// 当前载量加上 extra 后是否仍不超过 ceiling
    fn can_add_load(&self, extra: &LoadVector, ceiling: &LoadVector) -> bool;

    /// 该载量(需求)能否被 capacity 满足
    ///
    /// 只检查需求非零的维度: 车辆某维度额定为 0 但需求也为 0 时不视为不足
    fn fits_within(&self, capacity: &LoadVector) -> bool;

    /// 列出不满足的维度名称
    fn shortfall_dimensions(&self, capacity: &LoadVector) -> Vec<&'static str>;
}

impl CapacityConstraint for LoadVector {
    fn can_add_load(&self, extra: &LoadVector, ceiling: &LoadVector) -> bool {
        let next = *self + *extra;
        next.weight_kg <= ceiling.weight_kg
            && next.volume_m3 <= ceiling.volume_m3
            && next.pallets <= ceiling.pallets
    }

    fn fits_within(&self, capacity: &LoadVector) -> bool {
        self.shortfall_dimensions(capacity).is_empty()
    }

    fn shortfall_dimensions(&self, capacity: &LoadVector) -> Vec<&'static str> {
        let mut dims = Vec::new();
        if self.weight_kg > 0.0 && capacity.weight_kg < self.weight_kg {
            dims.push("weight_kg");
        }
        if self.volume_m3 > 0.0 && capacity.volume_m3 < self.volume_m3 {
            dims.push("volume_m3");
        }
        if self.pallets > 0.0 && capacity.pallets < self.pallets {
            dims.push("pallets");
        }
        dims
    }
}
