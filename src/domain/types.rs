// ==========================================
// 运输调度排车系统 - 领域类型定义
// ==========================================
// 职责: 枚举类型与显示/解析约定
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 作业类型 (Operation Type)
// ==========================================
// 区分真实货运段与系统合成的衔接段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Cargo,             // 真实货运段
    DepotToPick,       // 场站 -> 首个提货点
    InterJob,          // 跨作业衔接
    DropToDepot,       // 末个卸货点 -> 场站
}

impl OperationType {
    /// 是否为合成的衔接段
    pub fn is_connector(&self) -> bool {
        !matches!(self, OperationType::Cargo)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Cargo => write!(f, "CARGO"),
            OperationType::DepotToPick => write!(f, "DEPOT_TO_PICK"),
            OperationType::InterJob => write!(f, "INTER_JOB"),
            OperationType::DropToDepot => write!(f, "DROP_TO_DEPOT"),
        }
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CARGO" => Ok(OperationType::Cargo),
            "DEPOT_TO_PICK" => Ok(OperationType::DepotToPick),
            "INTER_JOB" => Ok(OperationType::InterJob),
            "DROP_TO_DEPOT" => Ok(OperationType::DropToDepot),
            other => Err(format!("未知作业类型: {}", other)),
        }
    }
}

// ==========================================
// 派车单状态 (Run Sheet Status)
// ==========================================
// 顺序有意义: 低于 Finalized 的派车单均视为占用资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunSheetStatus {
    Draft,
    Open,
    Finalized,
}

impl RunSheetStatus {
    pub fn is_finalized(&self) -> bool {
        *self >= RunSheetStatus::Finalized
    }
}

impl fmt::Display for RunSheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunSheetStatus::Draft => write!(f, "DRAFT"),
            RunSheetStatus::Open => write!(f, "OPEN"),
            RunSheetStatus::Finalized => write!(f, "FINALIZED"),
        }
    }
}

impl FromStr for RunSheetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Ok(RunSheetStatus::Draft),
            "OPEN" => Ok(RunSheetStatus::Open),
            "FINALIZED" => Ok(RunSheetStatus::Finalized),
            other => Err(format!("未知派车单状态: {}", other)),
        }
    }
}

// ==========================================
// 约束检查模式 (Checking Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckingMode {
    Strict,   // 违规即阻断
    Warning,  // 违规仅告警
    Disabled, // 不检查
}

impl Default for CheckingMode {
    fn default() -> Self {
        CheckingMode::Strict
    }
}

impl fmt::Display for CheckingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckingMode::Strict => write!(f, "STRICT"),
            CheckingMode::Warning => write!(f, "WARNING"),
            CheckingMode::Disabled => write!(f, "DISABLED"),
        }
    }
}

impl FromStr for CheckingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STRICT" => Ok(CheckingMode::Strict),
            "WARNING" => Ok(CheckingMode::Warning),
            "DISABLED" => Ok(CheckingMode::Disabled),
            other => Err(format!("未知检查模式: {}", other)),
        }
    }
}

// ==========================================
// 约束族 (Constraint Family)
// ==========================================
// 声明顺序即评估顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintFamily {
    TimeWindow,
    AddressAvailability,
    Zoning,
    PlateCoding,
    TruckBan,
    AdHocFactor,
}

impl ConstraintFamily {
    pub const ALL: [ConstraintFamily; 6] = [
        ConstraintFamily::TimeWindow,
        ConstraintFamily::AddressAvailability,
        ConstraintFamily::Zoning,
        ConstraintFamily::PlateCoding,
        ConstraintFamily::TruckBan,
        ConstraintFamily::AdHocFactor,
    ];
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintFamily::TimeWindow => write!(f, "TIME_WINDOW"),
            ConstraintFamily::AddressAvailability => write!(f, "ADDRESS_AVAILABILITY"),
            ConstraintFamily::Zoning => write!(f, "ZONING"),
            ConstraintFamily::PlateCoding => write!(f, "PLATE_CODING"),
            ConstraintFamily::TruckBan => write!(f, "TRUCK_BAN"),
            ConstraintFamily::AdHocFactor => write!(f, "ADHOC_FACTOR"),
        }
    }
}

// ==========================================
// 装卸时长计算方法 (Handling Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlingMethod {
    Fixed,       // 固定时长
    VolumeBased, // 按体积
    WeightBased, // 按重量
    Combined,    // 体积 + 重量
}

impl fmt::Display for HandlingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlingMethod::Fixed => write!(f, "FIXED"),
            HandlingMethod::VolumeBased => write!(f, "VOLUME_BASED"),
            HandlingMethod::WeightBased => write!(f, "WEIGHT_BASED"),
            HandlingMethod::Combined => write!(f, "COMBINED"),
        }
    }
}

// ==========================================
// 临时交通因素影响 (Ad-Hoc Impact)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum AdHocImpact {
    CompleteBlockage,
    PartialBlockage { delay_minutes: i64 },
}

impl fmt::Display for AdHocImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdHocImpact::CompleteBlockage => write!(f, "COMPLETE_BLOCKAGE"),
            AdHocImpact::PartialBlockage { delay_minutes } => {
                write!(f, "PARTIAL_BLOCKAGE({}min)", delay_minutes)
            }
        }
    }
}

// ==========================================
// 资源类型 (Resource Kind)
// ==========================================
// 用于资源占用租约与冲突查询
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Vehicle,
    Driver,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Vehicle => write!(f, "VEHICLE"),
            ResourceKind::Driver => write!(f, "DRIVER"),
        }
    }
}
