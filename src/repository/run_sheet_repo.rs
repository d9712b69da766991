// ==========================================
// 运输调度排车系统 - 派车单数据仓储
// ==========================================
// 职责: 运输计划 / 派车单 / 派车单明细 / 拼单记录 的读写
// 红线: 同一车辆同一天最多一张未定稿派车单 (由唯一索引兜底)
// ==========================================

use crate::domain::leg::Leg;
use crate::domain::run_sheet::{
    Consolidation, NewRunSheet, RunSheet, RunSheetEntry, TransportPlan,
};
use crate::domain::types::{OperationType, ResourceKind, RunSheetStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::leg_repo::insert_leg_on;
use crate::repository::row_codec::{
    fmt_date, fmt_opt_date, parse_date, parse_enum, parse_json, parse_opt_date, to_json,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const RUN_SHEET_COLUMNS: &str = "run_sheet_id, vehicle_id, driver_id, run_date, status, depot_address_id, consolidation_id, plan_id";

fn map_run_sheet_row(row: &Row<'_>) -> rusqlite::Result<RunSheet> {
    let run_date: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(RunSheet {
        run_sheet_id: row.get(0)?,
        vehicle_id: row.get(1)?,
        driver_id: row.get(2)?,
        run_date: parse_date(3, &run_date)?,
        status: parse_enum::<RunSheetStatus>(4, &status)?,
        depot_address_id: row.get(5)?,
        consolidation_id: row.get(6)?,
        plan_id: row.get(7)?,
    })
}

fn map_entry_row(row: &Row<'_>) -> rusqlite::Result<RunSheetEntry> {
    let operation_type: String = row.get(3)?;
    Ok(RunSheetEntry {
        run_sheet_id: row.get(0)?,
        leg_id: row.get(1)?,
        position: row.get(2)?,
        operation_type: parse_enum::<OperationType>(3, &operation_type)?,
    })
}

// ==========================================
// RunSheetRepository - 派车单仓储
// ==========================================
pub struct RunSheetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RunSheetRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 运输计划 =====

    pub fn find_plan(&self, plan_id: &str) -> RepositoryResult<Option<TransportPlan>> {
        let conn = self.get_conn()?;
        let plan = conn
            .query_row(
                "SELECT plan_id, horizon_start, horizon_end, depot_address_id FROM transport_plan WHERE plan_id = ?1",
                params![plan_id],
                |row| {
                    Ok(TransportPlan {
                        plan_id: row.get(0)?,
                        horizon_start: parse_opt_date(1, row.get(1)?)?,
                        horizon_end: parse_opt_date(2, row.get(2)?)?,
                        depot_address_id: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(plan)
    }

    pub fn insert_plan(&self, plan: &TransportPlan) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO transport_plan (plan_id, horizon_start, horizon_end, depot_address_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                plan.plan_id,
                fmt_opt_date(plan.horizon_start),
                fmt_opt_date(plan.horizon_end),
                plan.depot_address_id,
            ],
        )?;
        Ok(())
    }

    // ===== 派车单 =====

    /// 资源在 date 是否被未定稿派车单占用
    pub fn exists_for(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        date: NaiveDate,
        exclude_plan: Option<&str>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let column = match kind {
            ResourceKind::Vehicle => "vehicle_id",
            ResourceKind::Driver => "driver_id",
        };
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM run_sheet
            WHERE {} = ?1
              AND run_date = ?2
              AND status <> 'FINALIZED'
              AND (?3 IS NULL OR plan_id IS NULL OR plan_id <> ?3)
            "#,
            column
        );
        let count: i64 = conn.query_row(
            &sql,
            params![resource_id, fmt_date(date), exclude_plan],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn find_open_by_vehicle(
        &self,
        vehicle_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<RunSheet>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM run_sheet
            WHERE vehicle_id = ?1 AND run_date = ?2
              AND status <> 'FINALIZED'
            ORDER BY created_at, run_sheet_id
            LIMIT 1
            "#,
            RUN_SHEET_COLUMNS
        );
        let sheet = conn
            .query_row(
                &sql,
                params![vehicle_id, fmt_date(date)],
                map_run_sheet_row,
            )
            .optional()?;
        Ok(sheet)
    }

    pub fn find_by_id(&self, run_sheet_id: &str) -> RepositoryResult<Option<RunSheet>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM run_sheet WHERE run_sheet_id = ?1",
            RUN_SHEET_COLUMNS
        );
        let sheet = conn
            .query_row(&sql, params![run_sheet_id], map_run_sheet_row)
            .optional()?;
        Ok(sheet)
    }

    pub fn list_by_date(&self, date: NaiveDate) -> RepositoryResult<Vec<RunSheet>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM run_sheet WHERE run_date = ?1 ORDER BY created_at, run_sheet_id",
            RUN_SHEET_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let sheets = stmt
            .query_map(params![fmt_date(date)], map_run_sheet_row)?
            .collect::<rusqlite::Result<Vec<RunSheet>>>()?;
        Ok(sheets)
    }

    /// 新建派车单 (状态 DRAFT)
    pub fn create(&self, new_sheet: &NewRunSheet) -> RepositoryResult<RunSheet> {
        let conn = self.get_conn()?;
        let sheet = RunSheet {
            run_sheet_id: Uuid::new_v4().to_string(),
            vehicle_id: new_sheet.vehicle_id.clone(),
            driver_id: new_sheet.driver_id.clone(),
            run_date: new_sheet.run_date,
            status: RunSheetStatus::Draft,
            depot_address_id: new_sheet.depot_address_id.clone(),
            consolidation_id: new_sheet.consolidation_id.clone(),
            plan_id: new_sheet.plan_id.clone(),
        };
        conn.execute(
            &format!(
                "INSERT INTO run_sheet ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                RUN_SHEET_COLUMNS
            ),
            params![
                sheet.run_sheet_id,
                sheet.vehicle_id,
                sheet.driver_id,
                fmt_date(sheet.run_date),
                sheet.status.to_string(),
                sheet.depot_address_id,
                sheet.consolidation_id,
                sheet.plan_id,
            ],
        )?;
        Ok(sheet)
    }

    pub fn update_status(&self, run_sheet_id: &str, status: RunSheetStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE run_sheet SET status = ?1 WHERE run_sheet_id = ?2",
            params![status.to_string(), run_sheet_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "run_sheet".to_string(),
                id: run_sheet_id.to_string(),
            });
        }
        Ok(())
    }

    // ===== 派车单明细 =====

    pub fn append_entry(
        &self,
        run_sheet_id: &str,
        leg_id: &str,
        operation_type: OperationType,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO run_sheet_entry (run_sheet_id, leg_id, position, operation_type)
            VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM run_sheet_entry WHERE run_sheet_id = ?1),
                ?3
            )
            "#,
            params![run_sheet_id, leg_id, operation_type.to_string()],
        )?;
        Ok(inserted > 0)
    }

    pub fn list_entries(&self, run_sheet_id: &str) -> RepositoryResult<Vec<RunSheetEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT run_sheet_id, leg_id, position, operation_type
            FROM run_sheet_entry
            WHERE run_sheet_id = ?1
            ORDER BY position
            "#,
        )?;
        let entries = stmt
            .query_map(params![run_sheet_id], map_entry_row)?
            .collect::<rusqlite::Result<Vec<RunSheetEntry>>>()?;
        Ok(entries)
    }

    /// 原子替换衔接段并按 route 重排明细
    pub fn rewrite_route(
        &self,
        run_sheet_id: &str,
        connectors: &[Leg],
        route: &[(String, OperationType)],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        // 旧衔接段: 明细与运输段记录一起删除
        tx.execute(
            r#"
            DELETE FROM leg WHERE leg_id IN (
                SELECT leg_id FROM run_sheet_entry
                WHERE run_sheet_id = ?1 AND operation_type <> 'CARGO'
            )
            "#,
            params![run_sheet_id],
        )?;
        tx.execute(
            "DELETE FROM run_sheet_entry WHERE run_sheet_id = ?1 AND operation_type <> 'CARGO'",
            params![run_sheet_id],
        )?;

        for connector in connectors {
            insert_leg_on(&tx, connector)?;
        }

        // 先整体平移, 避免重排过程中位置冲突
        tx.execute(
            "UPDATE run_sheet_entry SET position = position + 1000000 WHERE run_sheet_id = ?1",
            params![run_sheet_id],
        )?;
        for (idx, (leg_id, operation_type)) in route.iter().enumerate() {
            let position = (idx + 1) as i32;
            if operation_type.is_connector() {
                tx.execute(
                    "INSERT INTO run_sheet_entry (run_sheet_id, leg_id, position, operation_type) VALUES (?1, ?2, ?3, ?4)",
                    params![run_sheet_id, leg_id, position, operation_type.to_string()],
                )?;
            } else {
                tx.execute(
                    "UPDATE run_sheet_entry SET position = ?1 WHERE run_sheet_id = ?2 AND leg_id = ?3",
                    params![position, run_sheet_id, leg_id],
                )?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    // ===== 拼单 / 计划关联 =====

    pub fn persist_consolidation(&self, consolidation: &Consolidation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO consolidation (consolidation_id, load_type, run_date, job_ids_json, leg_ids_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                consolidation.consolidation_id,
                consolidation.load_type,
                fmt_date(consolidation.run_date),
                to_json(&consolidation.job_ids)?,
                to_json(&consolidation.leg_ids)?,
            ],
        )?;
        Ok(())
    }

    pub fn find_consolidation(&self, consolidation_id: &str) -> RepositoryResult<Option<Consolidation>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT consolidation_id, load_type, run_date, job_ids_json, leg_ids_json FROM consolidation WHERE consolidation_id = ?1",
                params![consolidation_id],
                |row| {
                    let run_date: String = row.get(2)?;
                    let job_ids: String = row.get(3)?;
                    let leg_ids: String = row.get(4)?;
                    Ok(Consolidation {
                        consolidation_id: row.get(0)?,
                        load_type: row.get(1)?,
                        run_date: parse_date(2, &run_date)?,
                        job_ids: parse_json(3, &job_ids)?,
                        leg_ids: parse_json(4, &leg_ids)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    pub fn link_plan(&self, plan_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO plan_run_sheet (plan_id, run_sheet_id) VALUES (?1, ?2)",
            params![plan_id, run_sheet_id],
        )?;
        Ok(())
    }

    pub fn list_plan_run_sheets(&self, plan_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT run_sheet_id FROM plan_run_sheet WHERE plan_id = ?1 ORDER BY run_sheet_id",
        )?;
        let ids = stmt
            .query_map(params![plan_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}
