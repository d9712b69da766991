// ==========================================
// 运输调度排车系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建表脚本 (测试与命令行入口共用)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 日期/时间的存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const TIME_FORMAT: &str = "%H:%M";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化排车所需的全部表（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(DISPATCH_SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const DISPATCH_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ===== 配置 =====
CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);
INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 主数据 (外部维护) =====
CREATE TABLE IF NOT EXISTS transport_plan (
    plan_id TEXT PRIMARY KEY,
    horizon_start TEXT,
    horizon_end TEXT,
    depot_address_id TEXT
);

CREATE TABLE IF NOT EXISTS address (
    address_id TEXT PRIMARY KEY,
    address_type TEXT NOT NULL,
    allow_mon INTEGER,
    allow_tue INTEGER,
    allow_wed INTEGER,
    allow_thu INTEGER,
    allow_fri INTEGER,
    allow_sat INTEGER,
    allow_sun INTEGER,
    zoning_tags_json TEXT,
    latitude REAL,
    longitude REAL
);

CREATE TABLE IF NOT EXISTS vehicle_type (
    vehicle_type TEXT PRIMARY KEY,
    plate_coding_exempt INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS vehicle (
    vehicle_id TEXT PRIMARY KEY,
    vehicle_type TEXT NOT NULL,
    capacity_weight_kg REAL NOT NULL DEFAULT 0,
    capacity_volume_m3 REAL NOT NULL DEFAULT 0,
    capacity_pallets REAL NOT NULL DEFAULT 0,
    internally_owned INTEGER NOT NULL DEFAULT 1,
    license_plate TEXT NOT NULL,
    carrier_id TEXT,
    average_speed_kph REAL,
    gross_weight_kg REAL,
    home_depot_address_id TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS driver (
    driver_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    hazmat_endorsed INTEGER NOT NULL DEFAULT 0,
    carrier_id TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS load_type (
    load_type TEXT PRIMARY KEY,
    allow_consolidation INTEGER NOT NULL DEFAULT 0
);

-- ===== 运输段 =====
CREATE TABLE IF NOT EXISTS leg (
    leg_id TEXT PRIMARY KEY,
    scheduled_date TEXT,
    sequence_no INTEGER NOT NULL DEFAULT 0,
    pick_address_id TEXT NOT NULL,
    drop_address_id TEXT NOT NULL,
    pick_mode TEXT,
    drop_mode TEXT,
    pick_window_start TEXT,
    pick_window_end TEXT,
    drop_window_start TEXT,
    drop_window_end TEXT,
    distance_km REAL,
    weight_kg REAL NOT NULL DEFAULT 0,
    volume_m3 REAL NOT NULL DEFAULT 0,
    pallets REAL NOT NULL DEFAULT 0,
    hazardous INTEGER NOT NULL DEFAULT 0,
    required_vehicle_type TEXT,
    parent_job_id TEXT,
    load_type TEXT,
    operation_type TEXT NOT NULL DEFAULT 'CARGO',
    run_sheet_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_leg_scheduled_date ON leg(scheduled_date);

-- ===== 派车单 =====
CREATE TABLE IF NOT EXISTS run_sheet (
    run_sheet_id TEXT PRIMARY KEY,
    vehicle_id TEXT,
    driver_id TEXT,
    run_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'DRAFT',
    depot_address_id TEXT,
    consolidation_id TEXT,
    plan_id TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
-- 同一车辆同一天最多一张未定稿派车单
CREATE UNIQUE INDEX IF NOT EXISTS uq_run_sheet_vehicle_date_open
    ON run_sheet(vehicle_id, run_date)
    WHERE vehicle_id IS NOT NULL AND status <> 'FINALIZED';

CREATE TABLE IF NOT EXISTS run_sheet_entry (
    run_sheet_id TEXT NOT NULL REFERENCES run_sheet(run_sheet_id) ON DELETE CASCADE,
    leg_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    operation_type TEXT NOT NULL,
    PRIMARY KEY (run_sheet_id, leg_id)
);

CREATE TABLE IF NOT EXISTS consolidation (
    consolidation_id TEXT PRIMARY KEY,
    load_type TEXT NOT NULL,
    run_date TEXT NOT NULL,
    job_ids_json TEXT NOT NULL,
    leg_ids_json TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS plan_run_sheet (
    plan_id TEXT NOT NULL,
    run_sheet_id TEXT NOT NULL,
    PRIMARY KEY (plan_id, run_sheet_id)
);

-- ===== 约束规则 =====
CREATE TABLE IF NOT EXISTS zoning_rule (
    rule_id TEXT PRIMARY KEY,
    required_tag TEXT NOT NULL,
    vehicle_type TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS plate_coding_rule (
    rule_id TEXT PRIMARY KEY,
    weekday INTEGER NOT NULL,
    restricted_digits_json TEXT NOT NULL,
    window_start TEXT,
    window_end TEXT,
    effective_from TEXT,
    effective_to TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS truck_ban (
    ban_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    vehicle_types_json TEXT NOT NULL DEFAULT '[]',
    all_day INTEGER NOT NULL DEFAULT 0,
    window_start TEXT,
    window_end TEXT,
    weight_threshold_kg REAL,
    banned_addresses_json TEXT NOT NULL DEFAULT '[]',
    banned_routes_json TEXT NOT NULL DEFAULT '[]',
    alternative_routes_json TEXT NOT NULL DEFAULT '[]',
    effective_from TEXT,
    effective_to TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS adhoc_factor (
    factor_id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    starts_at TEXT NOT NULL,
    ends_at TEXT NOT NULL,
    exempt_vehicle_types_json TEXT NOT NULL DEFAULT '[]',
    affected_addresses_json TEXT NOT NULL DEFAULT '[]',
    affected_routes_json TEXT NOT NULL DEFAULT '[]',
    impact_kind TEXT NOT NULL,
    delay_minutes INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent_on_empty_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
