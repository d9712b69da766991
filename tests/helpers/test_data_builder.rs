// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================
// 基准日期: 2026-03-02 (周一)
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use transport_dispatch::domain::rules::{Effectivity, PlateCodingRule};
use transport_dispatch::domain::{
    Address, Driver, Leg, LoadType, LoadVector, OperationType, TimeWindow, TransportPlan, Vehicle,
};

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
}

pub fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, 0).unwrap()
}

// ==========================================
// TransportPlan
// ==========================================

pub fn plan(plan_id: &str, start: NaiveDate, end: NaiveDate) -> TransportPlan {
    TransportPlan {
        plan_id: plan_id.to_string(),
        horizon_start: Some(start),
        horizon_end: Some(end),
        depot_address_id: None,
    }
}

pub fn plan_with_depot(plan_id: &str, date: NaiveDate, depot: &str) -> TransportPlan {
    TransportPlan {
        depot_address_id: Some(depot.to_string()),
        ..plan(plan_id, date, date)
    }
}

// ==========================================
// Leg 构建器
// ==========================================

pub struct LegBuilder {
    leg: Leg,
}

impl LegBuilder {
    /// 默认: 周一, 500kg / 2m³ / 1托, 30km, 无时间窗
    pub fn new(leg_id: &str, from: &str, to: &str) -> Self {
        Self {
            leg: Leg {
                leg_id: leg_id.to_string(),
                scheduled_date: Some(monday()),
                sequence_no: 1,
                pick_address_id: from.to_string(),
                drop_address_id: to.to_string(),
                pick_mode: None,
                drop_mode: None,
                pick_window: TimeWindow::unbounded(),
                drop_window: TimeWindow::unbounded(),
                distance_km: Some(30.0),
                load: LoadVector::new(500.0, 2.0, 1.0),
                hazardous: false,
                required_vehicle_type: Some("Van".to_string()),
                parent_job_id: Some(format!("JOB-{}", leg_id)),
                load_type: None,
                operation_type: OperationType::Cargo,
                run_sheet_id: None,
            },
        }
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.leg.scheduled_date = Some(date);
        self
    }

    pub fn no_date(mut self) -> Self {
        self.leg.scheduled_date = None;
        self
    }

    pub fn sequence(mut self, seq: i32) -> Self {
        self.leg.sequence_no = seq;
        self
    }

    pub fn load(mut self, weight_kg: f64, volume_m3: f64, pallets: f64) -> Self {
        self.leg.load = LoadVector::new(weight_kg, volume_m3, pallets);
        self
    }

    pub fn hazardous(mut self) -> Self {
        self.leg.hazardous = true;
        self
    }

    pub fn vehicle_type(mut self, vehicle_type: &str) -> Self {
        self.leg.required_vehicle_type = Some(vehicle_type.to_string());
        self
    }

    pub fn job(mut self, job_id: &str) -> Self {
        self.leg.parent_job_id = Some(job_id.to_string());
        self
    }

    pub fn load_type(mut self, load_type: &str) -> Self {
        self.leg.load_type = Some(load_type.to_string());
        self
    }

    pub fn pick_window(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.leg.pick_window = TimeWindow::new(Some(start), Some(end));
        self
    }

    pub fn build(self) -> Leg {
        self.leg
    }
}

// ==========================================
// Vehicle 构建器
// ==========================================

pub struct VehicleBuilder {
    vehicle: Vehicle,
}

impl VehicleBuilder {
    /// 默认: 自有 Van, 1000kg / 10m³ / 4托, 车牌尾号 0
    pub fn new(vehicle_id: &str) -> Self {
        Self {
            vehicle: Vehicle {
                vehicle_id: vehicle_id.to_string(),
                vehicle_type: "Van".to_string(),
                capacity: LoadVector::new(1000.0, 10.0, 4.0),
                internally_owned: true,
                license_plate: format!("{}-0", vehicle_id),
                carrier_id: None,
                average_speed_kph: Some(60.0),
                gross_weight_kg: Some(3500.0),
                plate_coding_exempt: false,
                home_depot_address_id: None,
                updated_at: at(monday(), 0, 0),
            },
        }
    }

    pub fn vehicle_type(mut self, vehicle_type: &str) -> Self {
        self.vehicle.vehicle_type = vehicle_type.to_string();
        self
    }

    pub fn capacity(mut self, weight_kg: f64, volume_m3: f64, pallets: f64) -> Self {
        self.vehicle.capacity = LoadVector::new(weight_kg, volume_m3, pallets);
        self
    }

    pub fn plate(mut self, plate: &str) -> Self {
        self.vehicle.license_plate = plate.to_string();
        self
    }

    pub fn external(mut self) -> Self {
        self.vehicle.internally_owned = false;
        self
    }

    pub fn home_depot(mut self, depot: &str) -> Self {
        self.vehicle.home_depot_address_id = Some(depot.to_string());
        self
    }

    /// 维护时间越晚, 候选顺序越靠前
    pub fn updated_minutes_after_midnight(mut self, minutes: u32) -> Self {
        self.vehicle.updated_at = at(monday(), minutes / 60, minutes % 60);
        self
    }

    pub fn build(self) -> Vehicle {
        self.vehicle
    }
}

// ==========================================
// Driver / Address / LoadType / 规则
// ==========================================

pub fn driver(driver_id: &str, hazmat: bool, updated_minute: u32) -> Driver {
    Driver {
        driver_id: driver_id.to_string(),
        name: format!("司机{}", driver_id),
        active: true,
        hazmat_endorsed: hazmat,
        carrier_id: None,
        updated_at: at(monday(), 0, updated_minute),
    }
}

pub fn address(address_id: &str) -> Address {
    Address {
        address_id: address_id.to_string(),
        address_type: "CUSTOMER".to_string(),
        day_flags: [None; 7],
        zoning_tags: None,
        latitude: None,
        longitude: None,
    }
}

pub fn load_type(name: &str, allow_consolidation: bool) -> LoadType {
    LoadType {
        load_type: name.to_string(),
        allow_consolidation,
    }
}

/// 周一全天限行指定尾号
pub fn monday_plate_rule(rule_id: &str, digits: Vec<u8>) -> PlateCodingRule {
    PlateCodingRule {
        rule_id: rule_id.to_string(),
        weekday: Weekday::Mon,
        restricted_digits: digits,
        window: None,
        effectivity: Effectivity::default(),
        active: true,
    }
}
