// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试范围: 默认值 / 覆盖 / 格式错误回退 / 参数校验
// ==========================================


use chrono::NaiveTime;
use test_helpers::create_test_db;
use transport_dispatch::config::{config_keys, ConfigManager, PlanningConfig, PlanningConfigReader};
use transport_dispatch::domain::types::CheckingMode;

fn manager() -> (tempfile::NamedTempFile, ConfigManager) {
    let (tmp, db_path) = create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();
    (tmp, manager)
}

#[tokio::test]
async fn test_empty_store_yields_defaults() {
    let (_tmp, manager) = manager();

    let config = manager.load_planning_config().await.unwrap();

    assert_eq!(config, PlanningConfig::default());
}

#[tokio::test]
async fn test_stored_values_override_defaults() {
    let (_tmp, manager) = manager();
    manager
        .set_global_config_value(config_keys::CHECKING_MODE, "warning")
        .unwrap();
    manager
        .set_global_config_value(config_keys::CHECK_ZONING, "false")
        .unwrap();
    manager
        .set_global_config_value(config_keys::DEFAULT_MAX_WEIGHT_KG, "2500")
        .unwrap();
    manager
        .set_global_config_value(config_keys::DEFAULT_DEPOT_ADDRESS_ID, "DEPOT-1")
        .unwrap();
    manager
        .set_global_config_value(config_keys::DEFAULT_START_TIME, "06:30")
        .unwrap();
    manager
        .set_global_config_value(config_keys::PASS_DEADLINE_SECS, "30")
        .unwrap();
    manager
        .set_global_config_value(
            config_keys::HANDLING_BY_MODE,
            r#"{"FORKLIFT": {"method": "FIXED", "base_minutes": 10.0, "per_m3_minutes": 0.0, "per_tonne_minutes": 0.0}}"#,
        )
        .unwrap();

    let config = manager.load_planning_config().await.unwrap();

    assert_eq!(config.checking_mode, CheckingMode::Warning);
    assert!(!config.constraints.zoning);
    assert!(config.constraints.plate_coding);
    assert_eq!(config.default_ceiling.weight_kg, 2500.0);
    assert_eq!(config.default_depot_address_id.as_deref(), Some("DEPOT-1"));
    assert_eq!(
        config.default_start_time,
        NaiveTime::from_hms_opt(6, 30, 0).unwrap()
    );
    assert_eq!(config.pass_deadline_secs, Some(30));
    assert!(config.handling_by_mode.contains_key("FORKLIFT"));
}

#[tokio::test]
async fn test_malformed_values_fall_back_to_defaults() {
    let (_tmp, manager) = manager();
    manager
        .set_global_config_value(config_keys::CHECK_TRUCK_BAN, "maybe")
        .unwrap();
    manager
        .set_global_config_value(config_keys::DEFAULT_SPEED_KPH, "fast")
        .unwrap();
    manager
        .set_global_config_value(config_keys::CHECKING_MODE, "LENIENT")
        .unwrap();
    manager
        .set_global_config_value(config_keys::DEFAULT_START_TIME, "25:99")
        .unwrap();

    let config = manager.load_planning_config().await.unwrap();
    let defaults = PlanningConfig::default();

    assert!(config.constraints.truck_ban);
    assert_eq!(config.default_speed_kph, defaults.default_speed_kph);
    assert_eq!(config.checking_mode, CheckingMode::Strict);
    assert_eq!(config.default_start_time, defaults.default_start_time);
}

#[tokio::test]
async fn test_invalid_parameters_fail_validation() {
    let (_tmp, manager) = manager();
    manager
        .set_global_config_value(config_keys::DEFAULT_SPEED_KPH, "0")
        .unwrap();

    let err = manager.load_planning_config().await.unwrap_err();
    assert!(err.to_string().contains("默认车速"));
}

#[test]
fn test_upsert_and_snapshot() {
    let (_tmp, manager) = manager();
    manager
        .set_global_config_value(config_keys::MAX_ADHOC_DELAY_MINUTES, "60")
        .unwrap();
    manager
        .set_global_config_value(config_keys::MAX_ADHOC_DELAY_MINUTES, "90")
        .unwrap();

    assert_eq!(
        manager
            .get_global_config_value(config_keys::MAX_ADHOC_DELAY_MINUTES)
            .unwrap()
            .as_deref(),
        Some("90")
    );
    let snapshot = manager.get_config_snapshot().unwrap();
    assert!(snapshot.contains("\"max_adhoc_delay_minutes\":\"90\""));
}
