// ==========================================
// 运输调度排车系统 - 配置管理器
// ==========================================
// 职责: 排车参数加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::planning_config::{HandlingSetting, PlanningConfig};
use crate::config::planning_config_reader::PlanningConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::CheckingMode;
use async_trait::async_trait;
use chrono::NaiveTime;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 排车报告附带本次使用的配置, 便于追溯
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 类型化读取 =====

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        Ok(match self.get_config_value(key)? {
            Some(v) => match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    tracing::warn!(config_key = key, raw_value = %v, "布尔配置格式错误，使用默认值");
                    default
                }
            },
            None => default,
        })
    }

    fn get_f64(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        Ok(match self.get_config_value(key)? {
            Some(v) => v.trim().parse::<f64>().unwrap_or_else(|_| {
                tracing::warn!(config_key = key, raw_value = %v, "数值配置格式错误，使用默认值");
                default
            }),
            None => default,
        })
    }

    fn get_i64(&self, key: &str, default: i64) -> Result<i64, Box<dyn Error>> {
        Ok(match self.get_config_value(key)? {
            Some(v) => v.trim().parse::<i64>().unwrap_or_else(|_| {
                tracing::warn!(config_key = key, raw_value = %v, "整数配置格式错误，使用默认值");
                default
            }),
            None => default,
        })
    }

    fn get_optional_string(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

// ==========================================
// PlanningConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PlanningConfigReader for ConfigManager {
    async fn load_planning_config(&self) -> Result<PlanningConfig, Box<dyn Error>> {
        let defaults = PlanningConfig::default();
        let mut config = defaults.clone();

        // ===== 约束开关 =====
        config.constraints.master_enabled =
            self.get_bool(config_keys::CONSTRAINT_MASTER_ENABLED, true)?;
        config.constraints.time_window = self.get_bool(config_keys::CHECK_TIME_WINDOW, true)?;
        config.constraints.address_availability =
            self.get_bool(config_keys::CHECK_ADDRESS_AVAILABILITY, true)?;
        config.constraints.zoning = self.get_bool(config_keys::CHECK_ZONING, true)?;
        config.constraints.plate_coding = self.get_bool(config_keys::CHECK_PLATE_CODING, true)?;
        config.constraints.truck_ban = self.get_bool(config_keys::CHECK_TRUCK_BAN, true)?;
        config.constraints.adhoc_factor = self.get_bool(config_keys::CHECK_ADHOC_FACTOR, true)?;

        if let Some(mode) = self.get_optional_string(config_keys::CHECKING_MODE)? {
            config.checking_mode = mode.parse::<CheckingMode>().unwrap_or_else(|e| {
                tracing::warn!(config_key = config_keys::CHECKING_MODE, error = %e, "检查模式配置错误，使用 STRICT");
                CheckingMode::Strict
            });
        }

        // ===== 车速 / 载量 / 阈值 =====
        config.default_speed_kph =
            self.get_f64(config_keys::DEFAULT_SPEED_KPH, defaults.default_speed_kph)?;
        config.road_distance_factor =
            self.get_f64(config_keys::ROAD_DISTANCE_FACTOR, defaults.road_distance_factor)?;
        config.default_ceiling.weight_kg = self.get_f64(
            config_keys::DEFAULT_MAX_WEIGHT_KG,
            defaults.default_ceiling.weight_kg,
        )?;
        config.default_ceiling.volume_m3 = self.get_f64(
            config_keys::DEFAULT_MAX_VOLUME_M3,
            defaults.default_ceiling.volume_m3,
        )?;
        config.default_ceiling.pallets = self.get_f64(
            config_keys::DEFAULT_MAX_PALLETS,
            defaults.default_ceiling.pallets,
        )?;
        config.max_adhoc_delay_minutes = self.get_i64(
            config_keys::MAX_ADHOC_DELAY_MINUTES,
            defaults.max_adhoc_delay_minutes,
        )?;

        // ===== 装卸参数 (JSON) =====
        if let Some(raw) = self.get_optional_string(config_keys::DEFAULT_HANDLING)? {
            match serde_json::from_str::<HandlingSetting>(&raw) {
                Ok(setting) => config.default_handling = setting,
                Err(e) => tracing::warn!(
                    config_key = config_keys::DEFAULT_HANDLING,
                    error = %e,
                    "默认装卸参数格式错误，使用默认值"
                ),
            }
        }
        if let Some(raw) = self.get_optional_string(config_keys::HANDLING_BY_MODE)? {
            match serde_json::from_str::<HashMap<String, HandlingSetting>>(&raw) {
                Ok(map) => config.handling_by_mode = map,
                Err(e) => tracing::warn!(
                    config_key = config_keys::HANDLING_BY_MODE,
                    error = %e,
                    "装卸方式参数格式错误，忽略"
                ),
            }
        }

        // ===== 场站 / 出发时刻 / 截止时间 =====
        config.default_depot_address_id =
            self.get_optional_string(config_keys::DEFAULT_DEPOT_ADDRESS_ID)?;
        if let Some(raw) = self.get_optional_string(config_keys::DEFAULT_START_TIME)? {
            match NaiveTime::parse_from_str(&raw, "%H:%M") {
                Ok(t) => config.default_start_time = t,
                Err(e) => tracing::warn!(
                    config_key = config_keys::DEFAULT_START_TIME,
                    error = %e,
                    "默认出发时刻格式错误 (HH:MM)，使用默认值"
                ),
            }
        }
        config.pass_deadline_secs = self
            .get_optional_string(config_keys::PASS_DEADLINE_SECS)?
            .and_then(|v| v.parse::<u64>().ok());

        config.validate()?;
        Ok(config)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 约束开关
    pub const CONSTRAINT_MASTER_ENABLED: &str = "constraint_master_enabled";
    pub const CHECK_TIME_WINDOW: &str = "check_time_window";
    pub const CHECK_ADDRESS_AVAILABILITY: &str = "check_address_availability";
    pub const CHECK_ZONING: &str = "check_zoning";
    pub const CHECK_PLATE_CODING: &str = "check_plate_coding";
    pub const CHECK_TRUCK_BAN: &str = "check_truck_ban";
    pub const CHECK_ADHOC_FACTOR: &str = "check_adhoc_factor";
    pub const CHECKING_MODE: &str = "constraint_checking_mode"; // STRICT / WARNING / DISABLED

    // 车速与距离
    pub const DEFAULT_SPEED_KPH: &str = "default_speed_kph";
    pub const ROAD_DISTANCE_FACTOR: &str = "road_distance_factor";

    // 默认装箱上限
    pub const DEFAULT_MAX_WEIGHT_KG: &str = "default_max_weight_kg";
    pub const DEFAULT_MAX_VOLUME_M3: &str = "default_max_volume_m3";
    pub const DEFAULT_MAX_PALLETS: &str = "default_max_pallets";

    // 临时因素
    pub const MAX_ADHOC_DELAY_MINUTES: &str = "max_adhoc_delay_minutes";

    // 装卸参数 (JSON)
    pub const DEFAULT_HANDLING: &str = "default_handling";
    pub const HANDLING_BY_MODE: &str = "handling_by_mode";

    // 场站与排车过程
    pub const DEFAULT_DEPOT_ADDRESS_ID: &str = "default_depot_address_id";
    pub const DEFAULT_START_TIME: &str = "default_start_time"; // HH:MM
    pub const PASS_DEADLINE_SECS: &str = "pass_deadline_secs";
}
