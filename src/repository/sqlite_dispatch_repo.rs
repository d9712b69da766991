// ==========================================
// 运输调度排车系统 - SQLite 排车仓储
// ==========================================
// 职责: 聚合各表仓储, 实现 DispatchRepository
// 说明: 所有子仓储共享同一连接 (Arc<Mutex<Connection>>)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{
    AdHocFactor, Address, Consolidation, Driver, DriverFilter, Leg, LoadType, NewRunSheet,
    OperationType, PlateCodingRule, ResourceKind, RunSheet, RunSheetEntry, TransportPlan,
    TruckBan, Vehicle, ZoningRule,
};
use crate::repository::dispatch_repo::DispatchRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::leg_repo::LegRepository;
use crate::repository::resource_repo::ResourceRepository;
use crate::repository::rule_repo::RuleRepository;
use crate::repository::run_sheet_repo::RunSheetRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct SqliteDispatchRepository {
    legs: LegRepository,
    resources: ResourceRepository,
    rules: RuleRepository,
    run_sheets: RunSheetRepository,
}

impl SqliteDispatchRepository {
    /// 打开数据库文件并创建仓储
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 使用共享连接创建仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            legs: LegRepository::new(conn.clone()),
            resources: ResourceRepository::new(conn.clone()),
            rules: RuleRepository::new(conn.clone()),
            run_sheets: RunSheetRepository::new(conn),
        }
    }

    pub fn legs(&self) -> &LegRepository {
        &self.legs
    }

    pub fn resources(&self) -> &ResourceRepository {
        &self.resources
    }

    pub fn rules(&self) -> &RuleRepository {
        &self.rules
    }

    pub fn run_sheets(&self) -> &RunSheetRepository {
        &self.run_sheets
    }
}

impl DispatchRepository for SqliteDispatchRepository {
    fn get_plan(&self, plan_id: &str) -> RepositoryResult<Option<TransportPlan>> {
        self.run_sheets.find_plan(plan_id)
    }

    fn fetch_eligible_legs(&self, start: NaiveDate, end: NaiveDate) -> RepositoryResult<Vec<Leg>> {
        self.legs.find_unassigned_in_range(start, end)
    }

    fn get_legs(&self, leg_ids: &[String]) -> RepositoryResult<Vec<Leg>> {
        self.legs.find_by_ids(leg_ids)
    }

    fn mark_leg_assigned(&self, leg_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        self.legs.mark_assigned(leg_id, run_sheet_id)
    }

    fn get_vehicles(
        &self,
        vehicle_type: Option<&str>,
        owned_only: bool,
    ) -> RepositoryResult<Vec<Vehicle>> {
        self.resources.find_vehicles(vehicle_type, owned_only)
    }

    fn get_drivers(&self, filter: &DriverFilter) -> RepositoryResult<Vec<Driver>> {
        self.resources.find_drivers(filter)
    }

    fn get_address(&self, address_id: &str) -> RepositoryResult<Option<Address>> {
        self.resources.find_address(address_id)
    }

    fn get_load_types(&self) -> RepositoryResult<Vec<LoadType>> {
        self.resources.find_load_types()
    }

    fn get_zoning_rules(&self) -> RepositoryResult<Vec<ZoningRule>> {
        self.rules.find_active_zoning_rules()
    }

    fn get_plate_coding_rules(&self, date: NaiveDate) -> RepositoryResult<Vec<PlateCodingRule>> {
        self.rules.find_plate_coding_rules(date)
    }

    fn get_truck_bans(&self, date: NaiveDate) -> RepositoryResult<Vec<TruckBan>> {
        self.rules.find_truck_bans(date)
    }

    fn get_adhoc_factors(&self, date: NaiveDate) -> RepositoryResult<Vec<AdHocFactor>> {
        self.rules.find_adhoc_factors(date)
    }

    fn run_sheet_exists_for(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        date: NaiveDate,
        exclude_plan: Option<&str>,
    ) -> RepositoryResult<bool> {
        self.run_sheets
            .exists_for(kind, resource_id, date, exclude_plan)
    }

    fn find_open_run_sheet_for_vehicle(
        &self,
        vehicle_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<RunSheet>> {
        self.run_sheets.find_open_by_vehicle(vehicle_id, date)
    }

    fn get_run_sheet(&self, run_sheet_id: &str) -> RepositoryResult<Option<RunSheet>> {
        self.run_sheets.find_by_id(run_sheet_id)
    }

    fn create_run_sheet(&self, new_sheet: &NewRunSheet) -> RepositoryResult<RunSheet> {
        self.run_sheets.create(new_sheet)
    }

    fn append_run_sheet_entry(
        &self,
        run_sheet_id: &str,
        leg_id: &str,
        operation_type: OperationType,
    ) -> RepositoryResult<bool> {
        self.run_sheets
            .append_entry(run_sheet_id, leg_id, operation_type)
    }

    fn list_run_sheet_entries(&self, run_sheet_id: &str) -> RepositoryResult<Vec<RunSheetEntry>> {
        self.run_sheets.list_entries(run_sheet_id)
    }

    fn rewrite_route(
        &self,
        run_sheet_id: &str,
        connectors: &[Leg],
        route: &[(String, OperationType)],
    ) -> RepositoryResult<()> {
        self.run_sheets
            .rewrite_route(run_sheet_id, connectors, route)
    }

    fn persist_consolidation(&self, consolidation: &Consolidation) -> RepositoryResult<()> {
        self.run_sheets.persist_consolidation(consolidation)
    }

    fn link_run_sheet_to_plan(&self, plan_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        self.run_sheets.link_plan(plan_id, run_sheet_id)
    }
}
