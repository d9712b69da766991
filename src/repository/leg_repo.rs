// ==========================================
// 运输调度排车系统 - 运输段数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 引擎不删除货运段 (仅衔接段可被替换)
// ==========================================

use crate::domain::capacity::LoadVector;
use crate::domain::leg::{Leg, TimeWindow};
use crate::domain::types::OperationType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{
    fmt_date, fmt_opt_date, fmt_opt_datetime, parse_enum, parse_opt_date, parse_opt_datetime,
};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex};

pub(crate) const LEG_COLUMNS: &str = r#"
    leg_id, scheduled_date, sequence_no, pick_address_id, drop_address_id,
    pick_mode, drop_mode, pick_window_start, pick_window_end,
    drop_window_start, drop_window_end, distance_km,
    weight_kg, volume_m3, pallets, hazardous, required_vehicle_type,
    parent_job_id, load_type, operation_type, run_sheet_id
"#;

pub(crate) fn map_leg_row(row: &Row<'_>) -> rusqlite::Result<Leg> {
    let operation_type: String = row.get(19)?;
    Ok(Leg {
        leg_id: row.get(0)?,
        scheduled_date: parse_opt_date(1, row.get(1)?)?,
        sequence_no: row.get(2)?,
        pick_address_id: row.get(3)?,
        drop_address_id: row.get(4)?,
        pick_mode: row.get(5)?,
        drop_mode: row.get(6)?,
        pick_window: TimeWindow::new(
            parse_opt_datetime(7, row.get(7)?)?,
            parse_opt_datetime(8, row.get(8)?)?,
        ),
        drop_window: TimeWindow::new(
            parse_opt_datetime(9, row.get(9)?)?,
            parse_opt_datetime(10, row.get(10)?)?,
        ),
        distance_km: row.get(11)?,
        load: LoadVector::new(row.get(12)?, row.get(13)?, row.get(14)?),
        hazardous: row.get(15)?,
        required_vehicle_type: row.get(16)?,
        parent_job_id: row.get(17)?,
        load_type: row.get(18)?,
        operation_type: parse_enum::<OperationType>(19, &operation_type)?,
        run_sheet_id: row.get(20)?,
    })
}

pub(crate) fn insert_leg_on(conn: &Connection, leg: &Leg) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO leg ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            LEG_COLUMNS
        ),
        params![
            leg.leg_id,
            fmt_opt_date(leg.scheduled_date),
            leg.sequence_no,
            leg.pick_address_id,
            leg.drop_address_id,
            leg.pick_mode,
            leg.drop_mode,
            fmt_opt_datetime(leg.pick_window.start),
            fmt_opt_datetime(leg.pick_window.end),
            fmt_opt_datetime(leg.drop_window.start),
            fmt_opt_datetime(leg.drop_window.end),
            leg.distance_km,
            leg.load.weight_kg,
            leg.load.volume_m3,
            leg.load.pallets,
            leg.hazardous,
            leg.required_vehicle_type,
            leg.parent_job_id,
            leg.load_type,
            leg.operation_type.to_string(),
            leg.run_sheet_id,
        ],
    )
}

// ==========================================
// LegRepository - 运输段仓储
// ==========================================
pub struct LegRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LegRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入运输段 (上游订单处理 / 衔接段合成)
    pub fn insert(&self, leg: &Leg) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_leg_on(&conn, leg)?;
        Ok(())
    }

    /// 查询日期区间内未分配的货运段
    ///
    /// # 排序
    /// 有效日期 -> sequence_no -> leg_id, 保证同输入结果可复现
    pub fn find_unassigned_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<Leg>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM leg
            WHERE run_sheet_id IS NULL
              AND operation_type = 'CARGO'
              AND COALESCE(scheduled_date, substr(pick_window_start, 1, 10)) BETWEEN ?1 AND ?2
            ORDER BY COALESCE(scheduled_date, substr(pick_window_start, 1, 10)), sequence_no, leg_id
            "#,
            LEG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let legs = stmt
            .query_map(params![fmt_date(start), fmt_date(end)], map_leg_row)?
            .collect::<rusqlite::Result<Vec<Leg>>>()?;
        Ok(legs)
    }

    /// 按 ID 批量查询 (返回顺序与 leg_ids 一致, 缺失的 ID 被忽略)
    pub fn find_by_ids(&self, leg_ids: &[String]) -> RepositoryResult<Vec<Leg>> {
        if leg_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let placeholders = vec!["?"; leg_ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM leg WHERE leg_id IN ({})",
            LEG_COLUMNS, placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(leg_ids.iter()), map_leg_row)?
            .collect::<rusqlite::Result<Vec<Leg>>>()?;

        let mut ordered = Vec::with_capacity(found.len());
        for id in leg_ids {
            if let Some(leg) = found.iter().find(|l| &l.leg_id == id) {
                ordered.push(leg.clone());
            }
        }
        Ok(ordered)
    }

    /// 回写派车单归属
    pub fn mark_assigned(&self, leg_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE leg SET run_sheet_id = ?1 WHERE leg_id = ?2",
            params![run_sheet_id, leg_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "leg".to_string(),
                id: leg_id.to_string(),
            });
        }
        Ok(())
    }
}
