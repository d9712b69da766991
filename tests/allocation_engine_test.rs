// ==========================================
// 排车引擎集成测试 (内存仓储)
// ==========================================
// 测试范围:
// 1. 单段排车 / 拼单 / 危险品隔离
// 2. 载量过滤 / 一车一日一单 / 跨计划占用
// 3. STRICT / WARNING / DISABLED 约束模式
// 4. 衔接段生成与幂等
// 5. 复用 / 重算 / 取消 / 超时 / 取数失败
// ==========================================

mod helpers;

use helpers::test_data_builder::*;
use std::sync::Arc;
use chrono::NaiveDate;
use transport_dispatch::config::{ConstraintToggles, PlanningConfig};
use transport_dispatch::domain::types::{CheckingMode, OperationType, ResourceKind, RunSheetStatus};
use transport_dispatch::domain::{
    AdHocFactor, Address, Consolidation, Driver, DriverFilter, Leg, LoadType, LoadVector,
    NewRunSheet, PlateCodingRule, RunSheet, RunSheetEntry, TransportPlan, TruckBan, Vehicle,
    ZoningRule,
};
use transport_dispatch::engine::{
    AllocationOrchestrator, AllocationReport, ConstraintValidator, EngineError, LeaseHolder,
    ReservationTable, RunSheetAssembler, ValidationTarget,
};
use transport_dispatch::repository::{
    DispatchRepository, InMemoryDispatchRepository, RepositoryError, RepositoryResult,
};

// ==========================================
// 辅助函数
// ==========================================

fn setup() -> Arc<InMemoryDispatchRepository> {
    transport_dispatch::logging::init_test();
    let repo = Arc::new(InMemoryDispatchRepository::new());
    repo.insert_plan(plan("P1", monday(), monday())).unwrap();
    repo
}

fn run_with(
    repo: &Arc<InMemoryDispatchRepository>,
    config: PlanningConfig,
    consolidate: bool,
) -> AllocationReport {
    AllocationOrchestrator::new(repo.clone(), Arc::new(config))
        .allocate_for_plan("P1", consolidate)
        .expect("排车不应失败")
}

fn run(repo: &Arc<InMemoryDispatchRepository>) -> AllocationReport {
    run_with(repo, PlanningConfig::default(), false)
}

fn sheet_of(repo: &InMemoryDispatchRepository, leg_id: &str) -> RunSheet {
    let leg = repo.leg(leg_id).unwrap().expect("运输段应存在");
    let run_sheet_id = leg.run_sheet_id.expect("运输段应已分配");
    repo.get_run_sheet(&run_sheet_id).unwrap().expect("派车单应存在")
}

fn open_sheets_for_vehicle(repo: &InMemoryDispatchRepository, vehicle_id: &str) -> usize {
    repo.all_run_sheets()
        .unwrap()
        .iter()
        .filter(|s| s.vehicle_id.as_deref() == Some(vehicle_id) && !s.status.is_finalized())
        .count()
}

// ==========================================
// 基本排车
// ==========================================

#[test]
fn test_single_leg_gets_sheet_with_vehicle_and_driver() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();

    let report = run(&repo);

    assert_eq!(report.created_with_vehicle, 1);
    assert_eq!(report.created_without_vehicle, 0);
    assert_eq!(report.attached_leg_count, 1);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);

    let sheet = sheet_of(&repo, "L1");
    assert_eq!(sheet.vehicle_id.as_deref(), Some("V1"));
    assert_eq!(sheet.driver_id.as_deref(), Some("D1"));
    assert_eq!(sheet.run_date, monday());
    assert_eq!(sheet.status, RunSheetStatus::Draft);
    assert_eq!(repo.plan_links("P1").unwrap(), vec![sheet.run_sheet_id.clone()]);
}

#[test]
fn test_external_vehicles_are_never_matched() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V-EXT").external().build())
        .unwrap();

    let report = run(&repo);

    assert_eq!(report.created_without_vehicle, 1);
    assert_eq!(sheet_of(&repo, "L1").vehicle_id, None);
}

#[test]
fn test_legs_on_different_days_get_separate_sheets() {
    let repo = Arc::new(InMemoryDispatchRepository::new());
    repo.insert_plan(plan("P1", monday(), tuesday())).unwrap();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_leg(LegBuilder::new("L2", "A", "B").date(tuesday()).build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();

    let report = run(&repo);

    assert_eq!(report.created_with_vehicle, 2);
    let s1 = sheet_of(&repo, "L1");
    let s2 = sheet_of(&repo, "L2");
    assert_ne!(s1.run_sheet_id, s2.run_sheet_id);
    assert_eq!(s1.run_date, monday());
    assert_eq!(s2.run_date, tuesday());
    assert_eq!(s2.vehicle_id.as_deref(), Some("V1"));
}

// ==========================================
// 拼单与危险品
// ==========================================

#[test]
fn test_consolidatable_load_type_becomes_one_trip_with_its_jobs() {
    let repo = setup();
    repo.insert_load_type(load_type("LTL", true)).unwrap();
    for (id, job, seq) in [("C1", "J1", 1), ("C2", "J2", 2), ("C3", "J1", 3)] {
        repo.insert_leg(
            LegBuilder::new(id, "A", "B")
                .job(job)
                .sequence(seq)
                .load_type("LTL")
                .load(200.0, 1.0, 1.0)
                .build(),
        )
        .unwrap();
    }
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();

    let report = run_with(&repo, PlanningConfig::default(), true);

    assert_eq!(report.consolidations_created.len(), 1);
    let summary = &report.consolidations_created[0];
    assert_eq!(summary.load_type, "LTL");
    assert_eq!(summary.leg_count, 3);

    let consolidations = repo.all_consolidations().unwrap();
    assert_eq!(consolidations.len(), 1);
    let mut jobs = consolidations[0].job_ids.clone();
    jobs.sort();
    assert_eq!(jobs, vec!["J1".to_string(), "J2".to_string()]);

    let sheet = sheet_of(&repo, "C1");
    assert_eq!(sheet_of(&repo, "C2").run_sheet_id, sheet.run_sheet_id);
    assert_eq!(sheet_of(&repo, "C3").run_sheet_id, sheet.run_sheet_id);
    assert_eq!(
        sheet.consolidation_id.as_deref(),
        Some(summary.consolidation_id.as_str())
    );
}

#[test]
fn test_consolidation_disabled_creates_no_consolidation_record() {
    let repo = setup();
    repo.insert_load_type(load_type("LTL", true)).unwrap();
    repo.insert_leg(LegBuilder::new("C1", "A", "B").load_type("LTL").build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();

    let report = run_with(&repo, PlanningConfig::default(), false);

    assert!(report.consolidations_created.is_empty());
    assert!(repo.all_consolidations().unwrap().is_empty());
    assert_eq!(report.attached_leg_count, 1);
}

#[test]
fn test_hazardous_and_regular_legs_never_share_a_sheet() {
    let repo = setup();
    repo.insert_leg(
        LegBuilder::new("N1", "A", "B")
            .load(300.0, 1.0, 1.0)
            .build(),
    )
    .unwrap();
    repo.insert_leg(
        LegBuilder::new("H1", "A", "B")
            .hazardous()
            .load(300.0, 1.0, 1.0)
            .build(),
    )
    .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").updated_minutes_after_midnight(10).build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V2").updated_minutes_after_midnight(5).build())
        .unwrap();
    repo.insert_driver(driver("D-HAZ", true, 10)).unwrap();
    repo.insert_driver(driver("D-REG", false, 5)).unwrap();

    let report = run(&repo);

    assert_eq!(report.created_with_vehicle, 2);
    let hazardous_sheet = sheet_of(&repo, "H1");
    let regular_sheet = sheet_of(&repo, "N1");
    assert_ne!(hazardous_sheet.run_sheet_id, regular_sheet.run_sheet_id);
    assert_eq!(hazardous_sheet.driver_id.as_deref(), Some("D-HAZ"));
    assert_eq!(regular_sheet.driver_id.as_deref(), Some("D-REG"));

    for sheet in repo.all_run_sheets().unwrap() {
        let entries = repo.list_run_sheet_entries(&sheet.run_sheet_id).unwrap();
        let ids: Vec<String> = entries.iter().map(|e| e.leg_id.clone()).collect();
        let legs = repo.get_legs(&ids).unwrap();
        let flags: Vec<bool> = legs.iter().map(|l| l.hazardous).collect();
        assert!(flags.windows(2).all(|w| w[0] == w[1]), "混装: {:?}", ids);
    }
}

// ==========================================
// 载量与占用
// ==========================================

#[test]
fn test_under_capacity_vehicle_is_skipped() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(
        VehicleBuilder::new("V-SMALL")
            .capacity(400.0, 10.0, 4.0)
            .updated_minutes_after_midnight(30)
            .build(),
    )
    .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V-BIG").build()).unwrap();

    run(&repo);

    assert_eq!(sheet_of(&repo, "L1").vehicle_id.as_deref(), Some("V-BIG"));
}

#[test]
fn test_no_fitting_vehicle_leaves_sheet_for_manual_assignment() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V-SMALL").capacity(400.0, 10.0, 4.0).build())
        .unwrap();

    let report = run(&repo);

    assert_eq!(report.created_without_vehicle, 1);
    assert_eq!(report.attached_leg_count, 1);
    let sheet = sheet_of(&repo, "L1");
    assert_eq!(sheet.vehicle_id, None);
    assert_eq!(sheet.driver_id, None);
}

#[test]
fn test_vehicle_gets_at_most_one_open_sheet_per_day() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").load(800.0, 2.0, 1.0).build())
        .unwrap();
    repo.insert_leg(
        LegBuilder::new("L2", "A", "B")
            .sequence(2)
            .load(800.0, 2.0, 1.0)
            .build(),
    )
    .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();

    let mut config = PlanningConfig::default();
    config.default_ceiling = LoadVector::new(1000.0, 10.0, 4.0);
    let report = run_with(&repo, config, false);

    assert_eq!(report.created_with_vehicle, 1);
    assert_eq!(report.created_without_vehicle, 1);
    assert_eq!(open_sheets_for_vehicle(&repo, "V1"), 1);
}

#[test]
fn test_open_sheet_of_another_plan_blocks_vehicle() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").updated_minutes_after_midnight(30).build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V2").build()).unwrap();
    repo.insert_run_sheet(RunSheet {
        run_sheet_id: "RS-OTHER".to_string(),
        vehicle_id: Some("V1".to_string()),
        driver_id: None,
        run_date: monday(),
        status: RunSheetStatus::Open,
        depot_address_id: None,
        consolidation_id: None,
        plan_id: Some("P-OTHER".to_string()),
    })
    .unwrap();

    run(&repo);
    assert_eq!(sheet_of(&repo, "L1").vehicle_id.as_deref(), Some("V2"));
}

#[test]
fn test_finalized_sheet_does_not_block_vehicle() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_run_sheet(RunSheet {
        run_sheet_id: "RS-DONE".to_string(),
        vehicle_id: Some("V1".to_string()),
        driver_id: None,
        run_date: monday(),
        status: RunSheetStatus::Open,
        depot_address_id: None,
        consolidation_id: None,
        plan_id: Some("P-OTHER".to_string()),
    })
    .unwrap();
    repo.set_run_sheet_status("RS-DONE", RunSheetStatus::Finalized)
        .unwrap();

    run(&repo);
    assert_eq!(sheet_of(&repo, "L1").vehicle_id.as_deref(), Some("V1"));
}

#[test]
fn test_shared_reservation_table_respects_leases_of_other_passes() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").updated_minutes_after_midnight(30).build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V2").build()).unwrap();

    let table = Arc::new(ReservationTable::new());
    let other = LeaseHolder::new("PASS-OTHER", "TRIP-X");
    table
        .try_acquire(ResourceKind::Vehicle, "V1", monday(), &other)
        .unwrap()
        .expect("租约应获取成功");

    let orchestrator = AllocationOrchestrator::with_reservations(
        repo.clone(),
        Arc::new(PlanningConfig::default()),
        table.clone(),
    );
    orchestrator.allocate_for_plan("P1", false).unwrap();

    assert_eq!(sheet_of(&repo, "L1").vehicle_id.as_deref(), Some("V2"));
    // 其他批次的租约不受本批次清理影响
    assert_eq!(table.len().unwrap(), 1);
}

// ==========================================
// 约束模式
// ==========================================

fn plate_scenario() -> Arc<InMemoryDispatchRepository> {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(
        VehicleBuilder::new("V1")
            .plate("ABC-123")
            .updated_minutes_after_midnight(30)
            .build(),
    )
    .unwrap();
    repo.insert_plate_coding_rule(monday_plate_rule("PC-MON", vec![3]))
        .unwrap();
    repo
}

#[test]
fn test_strict_plate_rule_moves_to_next_candidate() {
    let repo = plate_scenario();
    repo.insert_vehicle(VehicleBuilder::new("V2").plate("XYZ-124").build())
        .unwrap();

    let report = run(&repo);

    assert_eq!(sheet_of(&repo, "L1").vehicle_id.as_deref(), Some("V2"));
    assert!(report.trace.iter().any(|t| t.contains("V1")));
}

#[test]
fn test_strict_rejection_never_assigns_the_vehicle() {
    let repo = plate_scenario();

    let report = run(&repo);

    assert_eq!(report.created_with_vehicle, 0);
    assert_eq!(report.created_without_vehicle, 1);
    assert_eq!(open_sheets_for_vehicle(&repo, "V1"), 0);
}

#[test]
fn test_warning_mode_assigns_and_annotates() {
    let repo = plate_scenario();
    let mut config = PlanningConfig::default();
    config.checking_mode = CheckingMode::Warning;

    let report = run_with(&repo, config, false);

    assert_eq!(sheet_of(&repo, "L1").vehicle_id.as_deref(), Some("V1"));
    assert!(report.skipped.is_empty());
    assert!(report
        .trace
        .iter()
        .any(|t| t.starts_with("L1: WARN") && t.contains("PLATE_CODING")));
}

#[test]
fn test_closed_drop_address_leaves_trip_without_vehicle() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    let mut closed_monday = address("B");
    closed_monday.day_flags[0] = Some(false);
    repo.insert_address(closed_monday).unwrap();

    let report = run(&repo);

    assert_eq!(report.created_without_vehicle, 1);
    assert_eq!(report.attached_leg_count, 1);
    assert!(report
        .trace
        .iter()
        .any(|t| t.contains("V1") && t.contains("ADDRESS_AVAILABILITY")));
}

#[test]
fn test_unrepresentable_travel_time_rejects_vehicle_without_panic() {
    let repo = setup();
    let mut far = LegBuilder::new("L1", "A", "B").build();
    far.distance_km = Some(1.0e12);
    repo.insert_leg(far).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();

    let report = run(&repo);

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.created_with_vehicle, 0);
    assert_eq!(report.created_without_vehicle, 1);
    assert!(report
        .trace
        .iter()
        .any(|t| t.contains("V1") && t.contains("TIME_WINDOW")));
}

#[test]
fn test_all_families_disabled_accepts_everything() {
    let repo = plate_scenario();
    let vehicle = repo.get_vehicles(None, true).unwrap().remove(0);
    let leg = repo.leg("L1").unwrap().unwrap();

    for config in [
        PlanningConfig {
            checking_mode: CheckingMode::Disabled,
            ..PlanningConfig::default()
        },
        PlanningConfig {
            constraints: ConstraintToggles::all_disabled(),
            ..PlanningConfig::default()
        },
    ] {
        let validator = ConstraintValidator::new(repo.clone(), Arc::new(config));
        let outcome = validator
            .validate(&vehicle, ValidationTarget::Leg(&leg), at(monday(), 9, 0))
            .unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.reason, None);
        assert_eq!(outcome.delay_minutes, 0);
        assert!(outcome.alternatives.is_empty());
    }
}

// ==========================================
// 衔接段
// ==========================================

#[test]
fn test_connectors_are_added_once_per_sheet() {
    let repo = Arc::new(InMemoryDispatchRepository::new());
    repo.insert_plan(plan_with_depot("P1", monday(), "DEPOT")).unwrap();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").job("J1").build())
        .unwrap();
    repo.insert_leg(
        LegBuilder::new("L2", "C", "D")
            .job("J2")
            .sequence(2)
            .build(),
    )
    .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();

    let report = run(&repo);
    assert_eq!(report.connectors_added, 3);

    let sheet = sheet_of(&repo, "L1");
    assert_eq!(sheet.depot_address_id.as_deref(), Some("DEPOT"));
    let ops: Vec<OperationType> = repo
        .list_run_sheet_entries(&sheet.run_sheet_id)
        .unwrap()
        .iter()
        .map(|e| e.operation_type)
        .collect();
    assert_eq!(
        ops,
        vec![
            OperationType::DepotToPick,
            OperationType::Cargo,
            OperationType::InterJob,
            OperationType::Cargo,
            OperationType::DropToDepot,
        ]
    );

    let assembler = RunSheetAssembler::new(repo.clone(), Arc::new(PlanningConfig::default()));
    assert_eq!(assembler.add_connectors(&sheet.run_sheet_id).unwrap(), 0);
    assert_eq!(
        repo.list_run_sheet_entries(&sheet.run_sheet_id).unwrap().len(),
        5
    );
}

#[test]
fn test_vehicle_home_depot_takes_precedence_over_plan_depot() {
    let repo = Arc::new(InMemoryDispatchRepository::new());
    repo.insert_plan(plan_with_depot("P1", monday(), "PLAN-DEPOT")).unwrap();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").home_depot("HOME").build())
        .unwrap();

    run(&repo);

    let sheet = sheet_of(&repo, "L1");
    assert_eq!(sheet.depot_address_id.as_deref(), Some("HOME"));
    let entries = repo.list_run_sheet_entries(&sheet.run_sheet_id).unwrap();
    let first = repo.get_legs(&[entries[0].leg_id.clone()]).unwrap().remove(0);
    assert_eq!(first.pick_address_id, "HOME");
    assert_eq!(first.drop_address_id, "A");
}

// ==========================================
// 重算与复用
// ==========================================

#[test]
fn test_rerun_without_new_legs_changes_nothing() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();

    run(&repo);
    let second = run(&repo);

    assert_eq!(second.created_total(), 0);
    assert_eq!(second.attached_leg_count, 0);
    assert_eq!(second.connectors_added, 0);
    assert_eq!(repo.all_run_sheets().unwrap().len(), 1);
}

#[test]
fn test_rerun_reuses_open_sheet_of_same_vehicle_and_driver() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").job("J1").build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();
    run(&repo);
    let first_sheet = sheet_of(&repo, "L1");

    repo.insert_leg(
        LegBuilder::new("L2", "C", "D")
            .job("J2")
            .sequence(2)
            .build(),
    )
    .unwrap();
    let report = run(&repo);

    assert_eq!(report.reused, 1);
    assert_eq!(report.created_total(), 0);
    assert_eq!(sheet_of(&repo, "L2").run_sheet_id, first_sheet.run_sheet_id);
    // L1, B->C 衔接段, L2
    assert_eq!(report.connectors_added, 1);
    assert_eq!(
        repo.list_run_sheet_entries(&first_sheet.run_sheet_id)
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn test_rerun_skips_vehicle_whose_sheet_has_no_driver() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").updated_minutes_after_midnight(30).build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V2").build()).unwrap();
    run(&repo);
    assert_eq!(sheet_of(&repo, "L1").driver_id, None);

    repo.insert_driver(driver("D1", false, 0)).unwrap();
    repo.insert_leg(LegBuilder::new("L2", "C", "D").sequence(2).build())
        .unwrap();
    let report = run(&repo);

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.created_with_vehicle, 1);
    let sheet = sheet_of(&repo, "L2");
    assert_eq!(sheet.vehicle_id.as_deref(), Some("V2"));
    assert_eq!(sheet.driver_id.as_deref(), Some("D1"));
    assert_eq!(open_sheets_for_vehicle(&repo, "V1"), 1);
    assert_eq!(open_sheets_for_vehicle(&repo, "V2"), 1);
}

#[test]
fn test_rerun_keeps_driver_of_reused_sheet_when_newer_driver_appears() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    repo.insert_driver(driver("D1", false, 0)).unwrap();
    run(&repo);
    let first_sheet = sheet_of(&repo, "L1");

    repo.insert_driver(driver("D2", false, 30)).unwrap();
    repo.insert_leg(LegBuilder::new("L2", "C", "D").sequence(2).build())
        .unwrap();
    let report = run(&repo);

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.reused, 1);
    let sheet = sheet_of(&repo, "L2");
    assert_eq!(sheet.run_sheet_id, first_sheet.run_sheet_id);
    assert_eq!(sheet.driver_id.as_deref(), Some("D1"));
    assert_eq!(open_sheets_for_vehicle(&repo, "V1"), 1);
    assert!(repo
        .all_run_sheets()
        .unwrap()
        .iter()
        .all(|s| s.driver_id.as_deref() != Some("D2")));
}

#[test]
fn test_rerun_after_driver_change_keeps_one_open_sheet_per_vehicle() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").updated_minutes_after_midnight(30).build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V2").build()).unwrap();
    repo.insert_driver(driver("D1", false, 30)).unwrap();
    run(&repo);
    assert_eq!(sheet_of(&repo, "L1").driver_id.as_deref(), Some("D1"));

    // D1 停岗, D2 顶替
    let mut d1 = driver("D1", false, 30);
    d1.active = false;
    repo.insert_driver(d1).unwrap();
    repo.insert_driver(driver("D2", false, 0)).unwrap();
    repo.insert_leg(LegBuilder::new("L2", "C", "D").sequence(2).build())
        .unwrap();
    let report = run(&repo);

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.reused, 0);
    let sheet = sheet_of(&repo, "L2");
    assert_eq!(sheet.vehicle_id.as_deref(), Some("V2"));
    assert_eq!(sheet.driver_id.as_deref(), Some("D2"));
    assert_eq!(open_sheets_for_vehicle(&repo, "V1"), 1);
    assert_eq!(open_sheets_for_vehicle(&repo, "V2"), 1);
}

#[test]
fn test_rerun_with_only_busy_vehicle_leaves_sheet_for_manual_assignment() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    run(&repo);

    repo.insert_driver(driver("D1", false, 0)).unwrap();
    repo.insert_leg(LegBuilder::new("L2", "C", "D").sequence(2).build())
        .unwrap();
    let report = run(&repo);

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.created_without_vehicle, 1);
    assert_eq!(sheet_of(&repo, "L2").vehicle_id, None);
    assert_eq!(open_sheets_for_vehicle(&repo, "V1"), 1);
}

#[test]
fn test_rerun_persists_exactly_the_reported_consolidations() {
    let repo = setup();
    repo.insert_load_type(load_type("PALLET", true)).unwrap();
    repo.insert_leg(LegBuilder::new("C1", "A", "B").load_type("PALLET").build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").updated_minutes_after_midnight(30).build())
        .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V2").build()).unwrap();
    let first = run_with(&repo, PlanningConfig::default(), true);

    repo.insert_driver(driver("D1", false, 0)).unwrap();
    repo.insert_leg(
        LegBuilder::new("C2", "C", "D")
            .job("J2")
            .sequence(2)
            .load_type("PALLET")
            .build(),
    )
    .unwrap();
    let second = run_with(&repo, PlanningConfig::default(), true);

    assert!(second.errors.is_empty(), "errors: {:?}", second.errors);
    assert_eq!(second.consolidations_created.len(), 1);
    assert_eq!(
        repo.all_consolidations().unwrap().len(),
        first.consolidations_created.len() + second.consolidations_created.len()
    );
}

/// 派车单写入一律失败的仓储, 其余操作委托内存仓储
struct RejectingCreateRepo(Arc<InMemoryDispatchRepository>);

impl DispatchRepository for RejectingCreateRepo {
    fn get_plan(&self, plan_id: &str) -> RepositoryResult<Option<TransportPlan>> {
        self.0.get_plan(plan_id)
    }
    fn fetch_eligible_legs(&self, start: NaiveDate, end: NaiveDate) -> RepositoryResult<Vec<Leg>> {
        self.0.fetch_eligible_legs(start, end)
    }
    fn get_legs(&self, leg_ids: &[String]) -> RepositoryResult<Vec<Leg>> {
        self.0.get_legs(leg_ids)
    }
    fn mark_leg_assigned(&self, leg_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        self.0.mark_leg_assigned(leg_id, run_sheet_id)
    }
    fn get_vehicles(
        &self,
        vehicle_type: Option<&str>,
        owned_only: bool,
    ) -> RepositoryResult<Vec<Vehicle>> {
        self.0.get_vehicles(vehicle_type, owned_only)
    }
    fn get_drivers(&self, filter: &DriverFilter) -> RepositoryResult<Vec<Driver>> {
        self.0.get_drivers(filter)
    }
    fn get_address(&self, address_id: &str) -> RepositoryResult<Option<Address>> {
        self.0.get_address(address_id)
    }
    fn get_load_types(&self) -> RepositoryResult<Vec<LoadType>> {
        self.0.get_load_types()
    }
    fn get_zoning_rules(&self) -> RepositoryResult<Vec<ZoningRule>> {
        self.0.get_zoning_rules()
    }
    fn get_plate_coding_rules(&self, date: NaiveDate) -> RepositoryResult<Vec<PlateCodingRule>> {
        self.0.get_plate_coding_rules(date)
    }
    fn get_truck_bans(&self, date: NaiveDate) -> RepositoryResult<Vec<TruckBan>> {
        self.0.get_truck_bans(date)
    }
    fn get_adhoc_factors(&self, date: NaiveDate) -> RepositoryResult<Vec<AdHocFactor>> {
        self.0.get_adhoc_factors(date)
    }
    fn run_sheet_exists_for(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        date: NaiveDate,
        exclude_plan: Option<&str>,
    ) -> RepositoryResult<bool> {
        self.0.run_sheet_exists_for(kind, resource_id, date, exclude_plan)
    }
    fn find_open_run_sheet_for_vehicle(
        &self,
        vehicle_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<RunSheet>> {
        self.0.find_open_run_sheet_for_vehicle(vehicle_id, date)
    }
    fn get_run_sheet(&self, run_sheet_id: &str) -> RepositoryResult<Option<RunSheet>> {
        self.0.get_run_sheet(run_sheet_id)
    }
    fn create_run_sheet(&self, new_sheet: &NewRunSheet) -> RepositoryResult<RunSheet> {
        Err(RepositoryError::DatabaseTransactionError(format!(
            "派车单写入失败: {:?}",
            new_sheet.vehicle_id
        )))
    }
    fn append_run_sheet_entry(
        &self,
        run_sheet_id: &str,
        leg_id: &str,
        operation_type: OperationType,
    ) -> RepositoryResult<bool> {
        self.0.append_run_sheet_entry(run_sheet_id, leg_id, operation_type)
    }
    fn list_run_sheet_entries(&self, run_sheet_id: &str) -> RepositoryResult<Vec<RunSheetEntry>> {
        self.0.list_run_sheet_entries(run_sheet_id)
    }
    fn rewrite_route(
        &self,
        run_sheet_id: &str,
        connectors: &[Leg],
        route: &[(String, OperationType)],
    ) -> RepositoryResult<()> {
        self.0.rewrite_route(run_sheet_id, connectors, route)
    }
    fn persist_consolidation(&self, consolidation: &Consolidation) -> RepositoryResult<()> {
        self.0.persist_consolidation(consolidation)
    }
    fn link_run_sheet_to_plan(&self, plan_id: &str, run_sheet_id: &str) -> RepositoryResult<()> {
        self.0.link_run_sheet_to_plan(plan_id, run_sheet_id)
    }
}

#[test]
fn test_failed_sheet_write_leaves_no_consolidation_behind() {
    let inner = setup();
    inner.insert_load_type(load_type("PALLET", true)).unwrap();
    inner
        .insert_leg(LegBuilder::new("C1", "A", "B").load_type("PALLET").build())
        .unwrap();
    inner.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    inner.insert_driver(driver("D1", false, 0)).unwrap();

    let repo = Arc::new(RejectingCreateRepo(inner.clone()));
    let report = AllocationOrchestrator::new(repo, Arc::new(PlanningConfig::default()))
        .allocate_for_plan("P1", true)
        .unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report.consolidations_created.is_empty());
    assert!(inner.all_consolidations().unwrap().is_empty());
    assert!(inner.leg("C1").unwrap().unwrap().run_sheet_id.is_none());
}

// ==========================================
// 取消 / 超时 / 取数失败
// ==========================================

#[test]
fn test_cancelled_pass_skips_all_trips() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();

    let orchestrator =
        AllocationOrchestrator::new(repo.clone(), Arc::new(PlanningConfig::default()));
    orchestrator.cancellation_flag().cancel();
    let report = orchestrator.allocate_for_plan("P1", false).unwrap();

    assert!(report.cancelled);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, "CANCELLED");
    assert!(repo.all_run_sheets().unwrap().is_empty());
}

#[test]
fn test_expired_deadline_skips_remaining_trips() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    let config = PlanningConfig {
        pass_deadline_secs: Some(0),
        ..PlanningConfig::default()
    };

    let report = run_with(&repo, config, false);

    assert!(report.cancelled);
    assert_eq!(report.skipped[0].reason, "DEADLINE_EXCEEDED");
}

#[test]
fn test_missing_plan_is_a_fetch_failure() {
    let repo = setup();
    let result = AllocationOrchestrator::new(repo.clone(), Arc::new(PlanningConfig::default()))
        .allocate_for_plan("P-MISSING", false);
    assert!(matches!(result, Err(EngineError::FetchFailed(_))));
}

#[test]
fn test_invalid_config_aborts_before_any_write() {
    let repo = setup();
    repo.insert_leg(LegBuilder::new("L1", "A", "B").build()).unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();
    let config = PlanningConfig {
        default_speed_kph: 0.0,
        ..PlanningConfig::default()
    };

    let result = AllocationOrchestrator::new(repo.clone(), Arc::new(config))
        .allocate_for_plan("P1", false);

    assert!(matches!(result, Err(EngineError::InvalidConfig(ref msg)) if msg.contains("默认车速")));
    assert!(repo.all_run_sheets().unwrap().is_empty());
}

#[test]
fn test_plan_without_dates_is_a_fetch_failure() {
    let repo = Arc::new(InMemoryDispatchRepository::new());
    let mut undated = plan("P1", monday(), monday());
    undated.horizon_start = None;
    undated.horizon_end = None;
    repo.insert_plan(undated).unwrap();

    let result = AllocationOrchestrator::new(repo.clone(), Arc::new(PlanningConfig::default()))
        .allocate_for_plan("P1", false);
    assert!(matches!(result, Err(EngineError::FetchFailed(_))));
}

#[test]
fn test_leg_without_date_uses_pick_window_start() {
    let repo = setup();
    repo.insert_leg(
        LegBuilder::new("L1", "A", "B")
            .no_date()
            .pick_window(at(monday(), 9, 0), at(monday(), 11, 0))
            .build(),
    )
    .unwrap();
    repo.insert_vehicle(VehicleBuilder::new("V1").build()).unwrap();

    let report = run(&repo);

    assert_eq!(report.attached_leg_count, 1);
    assert_eq!(sheet_of(&repo, "L1").run_date, monday());
}
