// ==========================================
// 运输调度排车系统 - 约束规则仓储
// ==========================================
// 职责: 区域分类 / 尾号限行 / 货车禁行 / 临时交通因素 的读取
// 约定: 查询只返回指定日期当天生效的规则
// ==========================================

use crate::domain::rules::{
    AdHocFactor, DailyWindow, Effectivity, PlateCodingRule, RouteRef, TruckBan, ZoningRule,
};
use crate::domain::types::AdHocImpact;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{
    fmt_date, fmt_datetime, fmt_opt_date, fmt_opt_time, parse_datetime, parse_json,
    parse_opt_date, parse_opt_time, to_json,
};
use chrono::{Datelike, NaiveDate, Weekday};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

fn weekday_from_index(col: usize, idx: i64) -> rusqlite::Result<Weekday> {
    match idx {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            col,
            Type::Integer,
            format!("星期取值越界: {}", other).into(),
        )),
    }
}

fn daily_window(
    start_col: usize,
    start: Option<String>,
    end_col: usize,
    end: Option<String>,
) -> rusqlite::Result<Option<DailyWindow>> {
    let start = parse_opt_time(start_col, start)?;
    let end = parse_opt_time(end_col, end)?;
    Ok(match (start, end) {
        (Some(start), Some(end)) => Some(DailyWindow { start, end }),
        _ => None,
    })
}

fn map_plate_rule_row(row: &Row<'_>) -> rusqlite::Result<PlateCodingRule> {
    let digits: String = row.get(2)?;
    Ok(PlateCodingRule {
        rule_id: row.get(0)?,
        weekday: weekday_from_index(1, row.get(1)?)?,
        restricted_digits: parse_json(2, &digits)?,
        window: daily_window(3, row.get(3)?, 4, row.get(4)?)?,
        effectivity: Effectivity {
            from: parse_opt_date(5, row.get(5)?)?,
            to: parse_opt_date(6, row.get(6)?)?,
        },
        active: row.get(7)?,
    })
}

fn map_truck_ban_row(row: &Row<'_>) -> rusqlite::Result<TruckBan> {
    let vehicle_types: String = row.get(2)?;
    let banned_addresses: String = row.get(7)?;
    let banned_routes: String = row.get(8)?;
    let alternative_routes: String = row.get(9)?;
    Ok(TruckBan {
        ban_id: row.get(0)?,
        name: row.get(1)?,
        vehicle_types: parse_json(2, &vehicle_types)?,
        all_day: row.get(3)?,
        window: daily_window(4, row.get(4)?, 5, row.get(5)?)?,
        weight_threshold_kg: row.get(6)?,
        banned_addresses: parse_json(7, &banned_addresses)?,
        banned_routes: parse_json::<Vec<RouteRef>>(8, &banned_routes)?,
        alternative_routes: parse_json::<Vec<RouteRef>>(9, &alternative_routes)?,
        effectivity: Effectivity {
            from: parse_opt_date(10, row.get(10)?)?,
            to: parse_opt_date(11, row.get(11)?)?,
        },
        active: row.get(12)?,
    })
}

fn map_adhoc_row(row: &Row<'_>) -> rusqlite::Result<AdHocFactor> {
    let starts_at: String = row.get(2)?;
    let ends_at: String = row.get(3)?;
    let exempt: String = row.get(4)?;
    let addresses: String = row.get(5)?;
    let routes: String = row.get(6)?;
    let impact_kind: String = row.get(7)?;
    let delay_minutes: i64 = row.get(8)?;
    let impact = match impact_kind.as_str() {
        "COMPLETE_BLOCKAGE" => AdHocImpact::CompleteBlockage,
        "PARTIAL_BLOCKAGE" => AdHocImpact::PartialBlockage { delay_minutes },
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                7,
                Type::Text,
                format!("未知影响类型: {}", other).into(),
            ))
        }
    };
    Ok(AdHocFactor {
        factor_id: row.get(0)?,
        description: row.get(1)?,
        starts_at: parse_datetime(2, &starts_at)?,
        ends_at: parse_datetime(3, &ends_at)?,
        exempt_vehicle_types: parse_json(4, &exempt)?,
        affected_addresses: parse_json(5, &addresses)?,
        affected_routes: parse_json::<Vec<RouteRef>>(6, &routes)?,
        impact,
        active: row.get(9)?,
    })
}

// ==========================================
// RuleRepository - 约束规则仓储
// ==========================================
pub struct RuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 查询 =====

    pub fn find_active_zoning_rules(&self) -> RepositoryResult<Vec<ZoningRule>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT rule_id, required_tag, vehicle_type, active FROM zoning_rule WHERE active = 1 ORDER BY rule_id",
        )?;
        let rules = stmt
            .query_map([], |row| {
                Ok(ZoningRule {
                    rule_id: row.get(0)?,
                    required_tag: row.get(1)?,
                    vehicle_type: row.get(2)?,
                    active: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<ZoningRule>>>()?;
        Ok(rules)
    }

    /// 查询 date 当天生效的尾号限行规则 (星期 + 生效区间)
    pub fn find_plate_coding_rules(&self, date: NaiveDate) -> RepositoryResult<Vec<PlateCodingRule>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT rule_id, weekday, restricted_digits_json, window_start, window_end,
                   effective_from, effective_to, active
            FROM plate_coding_rule
            WHERE active = 1
              AND weekday = ?1
              AND (effective_from IS NULL OR effective_from <= ?2)
              AND (effective_to IS NULL OR effective_to >= ?2)
            ORDER BY rule_id
            "#,
        )?;
        let rules = stmt
            .query_map(
                params![date.weekday().num_days_from_monday(), fmt_date(date)],
                map_plate_rule_row,
            )?
            .collect::<rusqlite::Result<Vec<PlateCodingRule>>>()?;
        Ok(rules)
    }

    pub fn find_truck_bans(&self, date: NaiveDate) -> RepositoryResult<Vec<TruckBan>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ban_id, name, vehicle_types_json, all_day, window_start, window_end,
                   weight_threshold_kg, banned_addresses_json, banned_routes_json,
                   alternative_routes_json, effective_from, effective_to, active
            FROM truck_ban
            WHERE active = 1
              AND (effective_from IS NULL OR effective_from <= ?1)
              AND (effective_to IS NULL OR effective_to >= ?1)
            ORDER BY ban_id
            "#,
        )?;
        let bans = stmt
            .query_map(params![fmt_date(date)], map_truck_ban_row)?
            .collect::<rusqlite::Result<Vec<TruckBan>>>()?;
        Ok(bans)
    }

    /// 查询与 date 当天有时间交集的临时交通因素
    pub fn find_adhoc_factors(&self, date: NaiveDate) -> RepositoryResult<Vec<AdHocFactor>> {
        let conn = self.get_conn()?;
        let day_start = format!("{} 00:00:00", fmt_date(date));
        let day_end = format!("{} 23:59:59", fmt_date(date));
        let mut stmt = conn.prepare(
            r#"
            SELECT factor_id, description, starts_at, ends_at, exempt_vehicle_types_json,
                   affected_addresses_json, affected_routes_json, impact_kind, delay_minutes, active
            FROM adhoc_factor
            WHERE active = 1 AND starts_at <= ?2 AND ends_at >= ?1
            ORDER BY starts_at, factor_id
            "#,
        )?;
        let factors = stmt
            .query_map(params![day_start, day_end], map_adhoc_row)?
            .collect::<rusqlite::Result<Vec<AdHocFactor>>>()?;
        Ok(factors)
    }

    // ===== 规则录入 (外部维护 / 测试) =====

    pub fn insert_zoning_rule(&self, rule: &ZoningRule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO zoning_rule (rule_id, required_tag, vehicle_type, active) VALUES (?1, ?2, ?3, ?4)",
            params![rule.rule_id, rule.required_tag, rule.vehicle_type, rule.active],
        )?;
        Ok(())
    }

    pub fn insert_plate_coding_rule(&self, rule: &PlateCodingRule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO plate_coding_rule (
                rule_id, weekday, restricted_digits_json, window_start, window_end,
                effective_from, effective_to, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                rule.rule_id,
                rule.weekday.num_days_from_monday(),
                to_json(&rule.restricted_digits)?,
                fmt_opt_time(rule.window.map(|w| w.start)),
                fmt_opt_time(rule.window.map(|w| w.end)),
                fmt_opt_date(rule.effectivity.from),
                fmt_opt_date(rule.effectivity.to),
                rule.active,
            ],
        )?;
        Ok(())
    }

    pub fn insert_truck_ban(&self, ban: &TruckBan) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO truck_ban (
                ban_id, name, vehicle_types_json, all_day, window_start, window_end,
                weight_threshold_kg, banned_addresses_json, banned_routes_json,
                alternative_routes_json, effective_from, effective_to, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                ban.ban_id,
                ban.name,
                to_json(&ban.vehicle_types)?,
                ban.all_day,
                fmt_opt_time(ban.window.map(|w| w.start)),
                fmt_opt_time(ban.window.map(|w| w.end)),
                ban.weight_threshold_kg,
                to_json(&ban.banned_addresses)?,
                to_json(&ban.banned_routes)?,
                to_json(&ban.alternative_routes)?,
                fmt_opt_date(ban.effectivity.from),
                fmt_opt_date(ban.effectivity.to),
                ban.active,
            ],
        )?;
        Ok(())
    }

    pub fn insert_adhoc_factor(&self, factor: &AdHocFactor) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let (impact_kind, delay_minutes) = match factor.impact {
            AdHocImpact::CompleteBlockage => ("COMPLETE_BLOCKAGE", 0),
            AdHocImpact::PartialBlockage { delay_minutes } => ("PARTIAL_BLOCKAGE", delay_minutes),
        };
        conn.execute(
            r#"
            INSERT INTO adhoc_factor (
                factor_id, description, starts_at, ends_at, exempt_vehicle_types_json,
                affected_addresses_json, affected_routes_json, impact_kind, delay_minutes, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                factor.factor_id,
                factor.description,
                fmt_datetime(factor.starts_at),
                fmt_datetime(factor.ends_at),
                to_json(&factor.exempt_vehicle_types)?,
                to_json(&factor.affected_addresses)?,
                to_json(&factor.affected_routes)?,
                impact_kind,
                delay_minutes,
                factor.active,
            ],
        )?;
        Ok(())
    }
}
