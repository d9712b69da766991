// ==========================================
// 运输调度排车系统 - 内存排车仓储
// ==========================================
// 用途: 试算 (不落库) 与单元测试
// 约束: 与 SQLite 实现保持相同的排序与唯一性语义
// ==========================================

use crate::domain::{
    AdHocFactor, Address, Consolidation, Driver, DriverFilter, Leg, LoadType, NewRunSheet,
    OperationType, PlateCodingRule, ResourceKind, RunSheet, RunSheetEntry, RunSheetStatus,
    TransportPlan, TruckBan, Vehicle, ZoningRule,
};
use crate::repository::dispatch_repo::DispatchRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    plans: HashMap<String, TransportPlan>,
    legs: BTreeMap<String, Leg>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
    addresses: HashMap<String, Address>,
    load_types: Vec<LoadType>,
    zoning_rules: Vec<ZoningRule>,
    plate_rules: Vec<PlateCodingRule>,
    truck_bans: Vec<TruckBan>,
    adhoc_factors: Vec<AdHocFactor>,
    run_sheets: Vec<RunSheet>,
    entries: Vec<RunSheetEntry>,
    consolidations: Vec<Consolidation>,
    plan_links: BTreeSet<(String, String)>,
}

// ==========================================
// InMemoryDispatchRepository
// ==========================================
#[derive(Default)]
pub struct InMemoryDispatchRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryDispatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 数据准备 =====

    pub fn insert_plan(&self, plan: TransportPlan) -> RepositoryResult<()> {
        self.lock()?.plans.insert(plan.plan_id.clone(), plan);
        Ok(())
    }

    pub fn insert_leg(&self, leg: Leg) -> RepositoryResult<()> {
        self.lock()?.legs.insert(leg.leg_id.clone(), leg);
        Ok(())
    }

    /// 同ID车辆整体替换
    pub fn insert_vehicle(&self, vehicle: Vehicle) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        state.vehicles.retain(|v| v.vehicle_id != vehicle.vehicle_id);
        state.vehicles.push(vehicle);
        Ok(())
    }

    /// 同ID司机整体替换
    pub fn insert_driver(&self, driver: Driver) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        state.drivers.retain(|d| d.driver_id != driver.driver_id);
        state.drivers.push(driver);
        Ok(())
    }

    pub fn insert_address(&self, address: Address) -> RepositoryResult<()> {
        self.lock()?
            .addresses
            .insert(address.address_id.clone(), address);
        Ok(())
    }

    pub fn insert_load_type(&self, load_type: LoadType) -> RepositoryResult<()> {
        self.lock()?.load_types.push(load_type);
        Ok(())
    }

    pub fn insert_zoning_rule(&self, rule: ZoningRule) -> RepositoryResult<()> {
        self.lock()?.zoning_rules.push(rule);
        Ok(())
    }

    pub fn insert_plate_coding_rule(&self, rule: PlateCodingRule) -> RepositoryResult<()> {
        self.lock()?.plate_rules.push(rule);
        Ok(())
    }

    pub fn insert_truck_ban(&self, ban: TruckBan) -> RepositoryResult<()> {
        self.lock()?.truck_bans.push(ban);
        Ok(())
    }

    pub fn insert_adhoc_factor(&self, factor: AdHocFactor) -> RepositoryResult<()> {
        self.lock()?.adhoc_factors.push(factor);
        Ok(())
    }

    /// 直接写入一张已存在的派车单 (模拟外部系统或历史数据)
    pub fn insert_run_sheet(&self, sheet: RunSheet) -> RepositoryResult<()> {
        self.lock()?.run_sheets.push(sheet);
        Ok(())
    }

    pub fn set_run_sheet_status(
        &self,
        run_sheet_id: &str,
        status: RunSheetStatus,
    ) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let sheet = state
            .run_sheets
            .iter_mut()
            .find(|s| s.run_sheet_id == run_sheet_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "run_sheet".to_string(),
                id: run_sheet_id.to_string(),
            })?;
        sheet.status = status;
        Ok(())
    }

    // ===== 结果检查 =====

    pub fn all_run_sheets(&self) -> RepositoryResult<Vec<RunSheet>> {
        Ok(self.lock()?.run_sheets.clone())
    }

    pub fn all_consolidations(&self) -> RepositoryResult<Vec<Consolidation>> {
        Ok(self.lock()?.consolidations.clone())
    }

    pub fn plan_links(&self, plan_id: &str) -> RepositoryResult<Vec<String>> {
        Ok(self
            .lock()?
            .plan_links
            .iter()
            .filter(|(p, _)| p == plan_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    pub fn leg(&self, leg_id: &str) -> RepositoryResult<Option<Leg>> {
        Ok(self.lock()?.legs.get(leg_id).cloned())
    }
}

fn sort_key_date(leg: &Leg) -> Option<NaiveDate> {
    leg.effective_date()
}

impl DispatchRepository for InMemoryDispatchRepository {
    fn get_plan(&self, plan_id: &str) -> RepositoryResult<Option<TransportPlan>> {
        Ok(self.lock()?.plans.get(plan_id).cloned())
    }

    fn fetch_eligible_legs(&self, start: NaiveDate, end: NaiveDate) -> RepositoryResult<Vec<Leg>> {
        let state = self.lock()?;
        let mut legs: Vec<Leg> = state
            .legs
            .values()
            .filter(|l| !l.is_assigned() && !l.is_connector())
            .filter(|l| {
                sort_key_date(l)
                    .map(|d| d >= start && d <= end)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        legs.sort_by(|a, b| {
            sort_key_date(a)
                .cmp(&sort_key_date(b))
                .then(a.sequence_no.cmp(&b.sequence_no))
                .then(a.leg_id.cmp(&b.leg_id))
        });
        Ok(legs)
    }

    fn get_legs(&self, leg_ids: &[String]) -> RepositoryResult<Vec<Leg>> {
        let state = self.lock()?;
        Ok(leg_ids
            .iter()
            .filter_map(|id| state.legs.get(id).cloned())
            .collect())
    }

    fn mark_leg_assigned(&self, leg_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let leg = state
            .legs
            .get_mut(leg_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "leg".to_string(),
                id: leg_id.to_string(),
            })?;
        leg.run_sheet_id = Some(run_sheet_id.to_string());
        Ok(())
    }

    fn get_vehicles(
        &self,
        vehicle_type: Option<&str>,
        owned_only: bool,
    ) -> RepositoryResult<Vec<Vehicle>> {
        let state = self.lock()?;
        let mut vehicles: Vec<Vehicle> = state
            .vehicles
            .iter()
            .filter(|v| vehicle_type.map_or(true, |t| v.vehicle_type == t))
            .filter(|v| !owned_only || v.internally_owned)
            .cloned()
            .collect();
        vehicles.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.vehicle_id.cmp(&b.vehicle_id))
        });
        Ok(vehicles)
    }

    fn get_drivers(&self, filter: &DriverFilter) -> RepositoryResult<Vec<Driver>> {
        let state = self.lock()?;
        let mut drivers: Vec<Driver> = state
            .drivers
            .iter()
            .filter(|d| !filter.active_only || d.active)
            .filter(|d| !filter.hazmat_required || d.hazmat_endorsed)
            .filter(|d| {
                filter
                    .carrier_id
                    .as_ref()
                    .map_or(true, |c| d.carrier_id.as_ref() == Some(c))
            })
            .cloned()
            .collect();
        drivers.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.driver_id.cmp(&b.driver_id))
        });
        Ok(drivers)
    }

    fn get_address(&self, address_id: &str) -> RepositoryResult<Option<Address>> {
        Ok(self.lock()?.addresses.get(address_id).cloned())
    }

    fn get_load_types(&self) -> RepositoryResult<Vec<LoadType>> {
        Ok(self.lock()?.load_types.clone())
    }

    fn get_zoning_rules(&self) -> RepositoryResult<Vec<ZoningRule>> {
        Ok(self
            .lock()?
            .zoning_rules
            .iter()
            .filter(|r| r.active)
            .cloned()
            .collect())
    }

    fn get_plate_coding_rules(&self, date: NaiveDate) -> RepositoryResult<Vec<PlateCodingRule>> {
        Ok(self
            .lock()?
            .plate_rules
            .iter()
            .filter(|r| r.active && r.weekday == date.weekday() && r.effectivity.covers(date))
            .cloned()
            .collect())
    }

    fn get_truck_bans(&self, date: NaiveDate) -> RepositoryResult<Vec<TruckBan>> {
        Ok(self
            .lock()?
            .truck_bans
            .iter()
            .filter(|b| b.active && b.effectivity.covers(date))
            .cloned()
            .collect())
    }

    fn get_adhoc_factors(&self, date: NaiveDate) -> RepositoryResult<Vec<AdHocFactor>> {
        Ok(self
            .lock()?
            .adhoc_factors
            .iter()
            .filter(|f| f.active && f.starts_at.date() <= date && f.ends_at.date() >= date)
            .cloned()
            .collect())
    }

    fn run_sheet_exists_for(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        date: NaiveDate,
        exclude_plan: Option<&str>,
    ) -> RepositoryResult<bool> {
        let state = self.lock()?;
        Ok(state.run_sheets.iter().any(|s| {
            let holder = match kind {
                ResourceKind::Vehicle => s.vehicle_id.as_deref(),
                ResourceKind::Driver => s.driver_id.as_deref(),
            };
            let same_plan = match (exclude_plan, s.plan_id.as_deref()) {
                (Some(excluded), Some(owner)) => excluded == owner,
                _ => false,
            };
            holder == Some(resource_id)
                && s.run_date == date
                && !s.status.is_finalized()
                && !same_plan
        }))
    }

    fn find_open_run_sheet_for_vehicle(
        &self,
        vehicle_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<RunSheet>> {
        let state = self.lock()?;
        Ok(state
            .run_sheets
            .iter()
            .find(|s| {
                s.vehicle_id.as_deref() == Some(vehicle_id)
                    && s.run_date == date
                    && !s.status.is_finalized()
            })
            .cloned())
    }

    fn get_run_sheet(&self, run_sheet_id: &str) -> RepositoryResult<Option<RunSheet>> {
        Ok(self
            .lock()?
            .run_sheets
            .iter()
            .find(|s| s.run_sheet_id == run_sheet_id)
            .cloned())
    }

    fn create_run_sheet(&self, new_sheet: &NewRunSheet) -> RepositoryResult<RunSheet> {
        let mut state = self.lock()?;
        if let Some(vehicle_id) = &new_sheet.vehicle_id {
            let taken = state.run_sheets.iter().any(|s| {
                s.vehicle_id.as_ref() == Some(vehicle_id)
                    && s.run_date == new_sheet.run_date
                    && !s.status.is_finalized()
            });
            if taken {
                return Err(RepositoryError::UniqueConstraintViolation(format!(
                    "vehicle {} already has an open run sheet on {}",
                    vehicle_id, new_sheet.run_date
                )));
            }
        }
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
        state.run_sheets.push(sheet.clone());
        Ok(sheet)
    }

    fn append_run_sheet_entry(
        &self,
        run_sheet_id: &str,
        leg_id: &str,
        operation_type: OperationType,
    ) -> RepositoryResult<bool> {
        let mut state = self.lock()?;
        let mut max_position = 0;
        for entry in state.entries.iter().filter(|e| e.run_sheet_id == run_sheet_id) {
            if entry.leg_id == leg_id {
                return Ok(false);
            }
            max_position = max_position.max(entry.position);
        }
        state.entries.push(RunSheetEntry {
            run_sheet_id: run_sheet_id.to_string(),
            leg_id: leg_id.to_string(),
            position: max_position + 1,
            operation_type,
        });
        Ok(true)
    }

    fn list_run_sheet_entries(&self, run_sheet_id: &str) -> RepositoryResult<Vec<RunSheetEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<RunSheetEntry> = state
            .entries
            .iter()
            .filter(|e| e.run_sheet_id == run_sheet_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.position);
        Ok(entries)
    }

    fn rewrite_route(
        &self,
        run_sheet_id: &str,
        connectors: &[Leg],
        route: &[(String, OperationType)],
    ) -> RepositoryResult<()> {
        let mut state = self.lock()?;

        let stale: Vec<String> = state
            .entries
            .iter()
            .filter(|e| e.run_sheet_id == run_sheet_id && e.operation_type.is_connector())
            .map(|e| e.leg_id.clone())
            .collect();
        for leg_id in &stale {
            state.legs.remove(leg_id);
        }
        state
            .entries
            .retain(|e| !(e.run_sheet_id == run_sheet_id && e.operation_type.is_connector()));

        for connector in connectors {
            state
                .legs
                .insert(connector.leg_id.clone(), connector.clone());
        }

        let mut rebuilt = Vec::with_capacity(route.len());
        for (idx, (leg_id, operation_type)) in route.iter().enumerate() {
            rebuilt.push(RunSheetEntry {
                run_sheet_id: run_sheet_id.to_string(),
                leg_id: leg_id.clone(),
                position: (idx + 1) as i32,
                operation_type: *operation_type,
            });
        }
        // route 未覆盖的货运明细原样保留在末尾
        let mut tail: Vec<RunSheetEntry> = state
            .entries
            .iter()
            .filter(|e| e.run_sheet_id == run_sheet_id)
            .filter(|e| !route.iter().any(|(id, _)| id == &e.leg_id))
            .cloned()
            .collect();
        tail.sort_by_key(|e| e.position);
        let offset = rebuilt.len() as i32;
        for (idx, mut entry) in tail.into_iter().enumerate() {
            entry.position = offset + idx as i32 + 1;
            rebuilt.push(entry);
        }

        state.entries.retain(|e| e.run_sheet_id != run_sheet_id);
        state.entries.extend(rebuilt);
        Ok(())
    }

    fn persist_consolidation(&self, consolidation: &Consolidation) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        if state
            .consolidations
            .iter()
            .any(|c| c.consolidation_id == consolidation.consolidation_id)
        {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "consolidation {}",
                consolidation.consolidation_id
            )));
        }
        state.consolidations.push(consolidation.clone());
        Ok(())
    }

    fn link_run_sheet_to_plan(&self, plan_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        self.lock()?
            .plan_links
            .insert((plan_id.to_string(), run_sheet_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn new_sheet(vehicle: Option<&str>, date: NaiveDate) -> NewRunSheet {
        NewRunSheet {
            vehicle_id: vehicle.map(str::to_string),
            driver_id: Some("D1".to_string()),
            run_date: date,
            depot_address_id: None,
            consolidation_id: None,
            plan_id: Some("P1".to_string()),
        }
    }

    #[test]
    fn test_second_open_sheet_for_vehicle_is_rejected() {
        let repo = InMemoryDispatchRepository::new();
        repo.create_run_sheet(&new_sheet(Some("V1"), d(2))).unwrap();
        let err = repo.create_run_sheet(&new_sheet(Some("V1"), d(2))).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        // 无车辆的派车单不受限制
        repo.create_run_sheet(&new_sheet(None, d(2))).unwrap();
        repo.create_run_sheet(&new_sheet(None, d(2))).unwrap();
    }

    #[test]
    fn test_exists_for_ignores_finalized_and_excluded_plan() {
        let repo = InMemoryDispatchRepository::new();
        let sheet = repo.create_run_sheet(&new_sheet(Some("V1"), d(2))).unwrap();
        assert!(repo
            .run_sheet_exists_for(ResourceKind::Vehicle, "V1", d(2), None)
            .unwrap());
        assert!(!repo
            .run_sheet_exists_for(ResourceKind::Vehicle, "V1", d(2), Some("P1"))
            .unwrap());
        repo.set_run_sheet_status(&sheet.run_sheet_id, RunSheetStatus::Finalized)
            .unwrap();
        assert!(!repo
            .run_sheet_exists_for(ResourceKind::Vehicle, "V1", d(2), None)
            .unwrap());
    }

    #[test]
    fn test_append_entry_is_idempotent_and_positions_increase() {
        let repo = InMemoryDispatchRepository::new();
        assert!(repo.append_run_sheet_entry("RS", "L1", OperationType::Cargo).unwrap());
        assert!(repo.append_run_sheet_entry("RS", "L2", OperationType::Cargo).unwrap());
        assert!(!repo.append_run_sheet_entry("RS", "L1", OperationType::Cargo).unwrap());
        let entries = repo.list_run_sheet_entries("RS").unwrap();
        let positions: Vec<i32> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }
}
