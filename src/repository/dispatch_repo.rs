// ==========================================
// 运输调度排车系统 - 排车仓储接口
// ==========================================
// 职责: 引擎与记录存储之间的唯一边界
// 红线: Repository 不含业务逻辑
// ==========================================
// 实现者:
// - SqliteDispatchRepository（rusqlite）
// - InMemoryDispatchRepository（试算 / 测试）
// ==========================================

use crate::domain::{
    AdHocFactor, Address, Consolidation, Driver, DriverFilter, Leg, LoadType, NewRunSheet,
    OperationType, PlateCodingRule, ResourceKind, RunSheet, RunSheetEntry, TransportPlan,
    TruckBan, Vehicle, ZoningRule,
};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;

pub trait DispatchRepository: Send + Sync {
    // ===== 计划与运输段 =====

    fn get_plan(&self, plan_id: &str) -> RepositoryResult<Option<TransportPlan>>;

    /// 查询 [start, end] 区间内未分配的货运段
    ///
    /// 日期口径: scheduled_date, 缺省时取提货时间窗起点日期
    fn fetch_eligible_legs(&self, start: NaiveDate, end: NaiveDate) -> RepositoryResult<Vec<Leg>>;

    fn get_legs(&self, leg_ids: &[String]) -> RepositoryResult<Vec<Leg>>;

    /// 回写运输段的派车单归属
    fn mark_leg_assigned(&self, leg_id: &str, run_sheet_id: &str) -> RepositoryResult<()>;

    // ===== 资源 =====

    /// 查询车辆, 按 updated_at 倒序
    fn get_vehicles(
        &self,
        vehicle_type: Option<&str>,
        owned_only: bool,
    ) -> RepositoryResult<Vec<Vehicle>>;

    /// 查询司机, 按 updated_at 倒序
    fn get_drivers(&self, filter: &DriverFilter) -> RepositoryResult<Vec<Driver>>;

    fn get_address(&self, address_id: &str) -> RepositoryResult<Option<Address>>;

    fn get_load_types(&self) -> RepositoryResult<Vec<LoadType>>;

    // ===== 约束规则 (仅返回 date 当天生效的规则) =====

    fn get_zoning_rules(&self) -> RepositoryResult<Vec<ZoningRule>>;

    fn get_plate_coding_rules(&self, date: NaiveDate) -> RepositoryResult<Vec<PlateCodingRule>>;

    fn get_truck_bans(&self, date: NaiveDate) -> RepositoryResult<Vec<TruckBan>>;

    fn get_adhoc_factors(&self, date: NaiveDate) -> RepositoryResult<Vec<AdHocFactor>>;

    // ===== 派车单 =====

    /// 资源在 date 是否已被未定稿派车单占用
    ///
    /// exclude_plan: 属于该计划的派车单不计入 (同计划重算时可复用)
    fn run_sheet_exists_for(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        date: NaiveDate,
        exclude_plan: Option<&str>,
    ) -> RepositoryResult<bool>;

    /// 按 (车辆, 日期) 查找未定稿派车单 (至多一张)
    fn find_open_run_sheet_for_vehicle(
        &self,
        vehicle_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<RunSheet>>;

    fn get_run_sheet(&self, run_sheet_id: &str) -> RepositoryResult<Option<RunSheet>>;

    fn create_run_sheet(&self, new_sheet: &NewRunSheet) -> RepositoryResult<RunSheet>;

    /// 追加派车单明细, 位置为当前最大位置 + 1
    ///
    /// # 返回
    /// - Ok(false): 该运输段已在派车单中
    fn append_run_sheet_entry(
        &self,
        run_sheet_id: &str,
        leg_id: &str,
        operation_type: OperationType,
    ) -> RepositoryResult<bool>;

    /// 按位置升序返回派车单明细
    fn list_run_sheet_entries(&self, run_sheet_id: &str) -> RepositoryResult<Vec<RunSheetEntry>>;

    /// 原子替换派车单的衔接段并重写明细顺序
    ///
    /// - 删除原有衔接段 (明细 + 运输段记录)
    /// - 写入 connectors
    /// - 按 route 顺序重写全部明细位置 (1..n)
    fn rewrite_route(
        &self,
        run_sheet_id: &str,
        connectors: &[Leg],
        route: &[(String, OperationType)],
    ) -> RepositoryResult<()>;

    fn persist_consolidation(&self, consolidation: &Consolidation) -> RepositoryResult<()>;

    fn link_run_sheet_to_plan(&self, plan_id: &str, run_sheet_id: &str) -> RepositoryResult<()>;
}
