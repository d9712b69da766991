// ==========================================
// 运输调度排车系统 - 资源数据仓储
// ==========================================
// 职责: 车辆 / 司机 / 地址 / 货物类型 的读取 (及主数据录入)
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::capacity::LoadVector;
use crate::domain::resource::{Address, Driver, DriverFilter, LoadType, Vehicle};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_datetime, parse_datetime, parse_json, to_json};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const VEHICLE_SELECT: &str = r#"
    SELECT v.vehicle_id, v.vehicle_type, v.capacity_weight_kg, v.capacity_volume_m3,
           v.capacity_pallets, v.internally_owned, v.license_plate, v.carrier_id,
           v.average_speed_kph, v.gross_weight_kg,
           COALESCE(t.plate_coding_exempt, 0), v.home_depot_address_id, v.updated_at
    FROM vehicle v
    LEFT JOIN vehicle_type t ON t.vehicle_type = v.vehicle_type
"#;

fn map_vehicle_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    let updated_at: String = row.get(12)?;
    Ok(Vehicle {
        vehicle_id: row.get(0)?,
        vehicle_type: row.get(1)?,
        capacity: LoadVector::new(row.get(2)?, row.get(3)?, row.get(4)?),
        internally_owned: row.get(5)?,
        license_plate: row.get(6)?,
        carrier_id: row.get(7)?,
        average_speed_kph: row.get(8)?,
        gross_weight_kg: row.get(9)?,
        plate_coding_exempt: row.get(10)?,
        home_depot_address_id: row.get(11)?,
        updated_at: parse_datetime(12, &updated_at)?,
    })
}

fn map_driver_row(row: &Row<'_>) -> rusqlite::Result<Driver> {
    let updated_at: String = row.get(5)?;
    Ok(Driver {
        driver_id: row.get(0)?,
        name: row.get(1)?,
        active: row.get(2)?,
        hazmat_endorsed: row.get(3)?,
        carrier_id: row.get(4)?,
        updated_at: parse_datetime(5, &updated_at)?,
    })
}

fn map_address_row(row: &Row<'_>) -> rusqlite::Result<Address> {
    let mut day_flags = [None; 7];
    for (i, flag) in day_flags.iter_mut().enumerate() {
        *flag = row.get::<_, Option<bool>>(2 + i)?;
    }
    let zoning_raw: Option<String> = row.get(9)?;
    let zoning_tags = match zoning_raw {
        Some(raw) => Some(parse_json::<Vec<String>>(9, &raw)?),
        None => None,
    };
    Ok(Address {
        address_id: row.get(0)?,
        address_type: row.get(1)?,
        day_flags,
        zoning_tags,
        latitude: row.get(10)?,
        longitude: row.get(11)?,
    })
}

// ==========================================
// ResourceRepository - 资源仓储
// ==========================================
pub struct ResourceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ResourceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 车辆 =====

    /// 查询车辆
    ///
    /// # 参数
    /// - vehicle_type: None 表示不限车型
    /// - owned_only: 仅自有车辆
    ///
    /// # 排序
    /// updated_at 倒序, vehicle_id 升序
    pub fn find_vehicles(
        &self,
        vehicle_type: Option<&str>,
        owned_only: bool,
    ) -> RepositoryResult<Vec<Vehicle>> {
        let conn = self.get_conn()?;
        let mut sql = format!("{} WHERE 1 = 1", VEHICLE_SELECT);
        let mut args: Vec<Value> = Vec::new();
        if let Some(t) = vehicle_type {
            sql.push_str(" AND v.vehicle_type = ?");
            args.push(Value::Text(t.to_string()));
        }
        if owned_only {
            sql.push_str(" AND v.internally_owned = 1");
        }
        sql.push_str(" ORDER BY v.updated_at DESC, v.vehicle_id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let vehicles = stmt
            .query_map(params_from_iter(args.iter()), map_vehicle_row)?
            .collect::<rusqlite::Result<Vec<Vehicle>>>()?;
        Ok(vehicles)
    }

    pub fn insert_vehicle(&self, vehicle: &Vehicle) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO vehicle (
                vehicle_id, vehicle_type, capacity_weight_kg, capacity_volume_m3,
                capacity_pallets, internally_owned, license_plate, carrier_id,
                average_speed_kph, gross_weight_kg, home_depot_address_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                vehicle.vehicle_id,
                vehicle.vehicle_type,
                vehicle.capacity.weight_kg,
                vehicle.capacity.volume_m3,
                vehicle.capacity.pallets,
                vehicle.internally_owned,
                vehicle.license_plate,
                vehicle.carrier_id,
                vehicle.average_speed_kph,
                vehicle.gross_weight_kg,
                vehicle.home_depot_address_id,
                fmt_datetime(vehicle.updated_at),
            ],
        )?;
        // 车型豁免标志存于 vehicle_type 表
        conn.execute(
            r#"
            INSERT INTO vehicle_type (vehicle_type, plate_coding_exempt) VALUES (?1, ?2)
            ON CONFLICT(vehicle_type) DO UPDATE SET plate_coding_exempt = ?2
            "#,
            params![vehicle.vehicle_type, vehicle.plate_coding_exempt],
        )?;
        Ok(())
    }

    // ===== 司机 =====

    pub fn find_drivers(&self, filter: &DriverFilter) -> RepositoryResult<Vec<Driver>> {
        let conn = self.get_conn()?;
        let mut sql = String::from(
            "SELECT driver_id, name, active, hazmat_endorsed, carrier_id, updated_at FROM driver WHERE 1 = 1",
        );
        let mut args: Vec<Value> = Vec::new();
        if filter.active_only {
            sql.push_str(" AND active = 1");
        }
        if filter.hazmat_required {
            sql.push_str(" AND hazmat_endorsed = 1");
        }
        if let Some(carrier) = &filter.carrier_id {
            sql.push_str(" AND carrier_id = ?");
            args.push(Value::Text(carrier.clone()));
        }
        sql.push_str(" ORDER BY updated_at DESC, driver_id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let drivers = stmt
            .query_map(params_from_iter(args.iter()), map_driver_row)?
            .collect::<rusqlite::Result<Vec<Driver>>>()?;
        Ok(drivers)
    }

    pub fn insert_driver(&self, driver: &Driver) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO driver (driver_id, name, active, hazmat_endorsed, carrier_id, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                driver.driver_id,
                driver.name,
                driver.active,
                driver.hazmat_endorsed,
                driver.carrier_id,
                fmt_datetime(driver.updated_at),
            ],
        )?;
        Ok(())
    }

    // ===== 地址 =====

    pub fn find_address(&self, address_id: &str) -> RepositoryResult<Option<Address>> {
        let conn = self.get_conn()?;
        let address = conn
            .query_row(
                r#"
                SELECT address_id, address_type,
                       allow_mon, allow_tue, allow_wed, allow_thu, allow_fri, allow_sat, allow_sun,
                       zoning_tags_json, latitude, longitude
                FROM address WHERE address_id = ?1
                "#,
                params![address_id],
                map_address_row,
            )
            .optional()?;
        Ok(address)
    }

    pub fn insert_address(&self, address: &Address) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let zoning_json = match &address.zoning_tags {
            Some(tags) => Some(to_json(tags)?),
            None => None,
        };
        let f = &address.day_flags;
        conn.execute(
            r#"
            INSERT INTO address (
                address_id, address_type,
                allow_mon, allow_tue, allow_wed, allow_thu, allow_fri, allow_sat, allow_sun,
                zoning_tags_json, latitude, longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                address.address_id,
                address.address_type,
                f[0],
                f[1],
                f[2],
                f[3],
                f[4],
                f[5],
                f[6],
                zoning_json,
                address.latitude,
                address.longitude,
            ],
        )?;
        Ok(())
    }

    // ===== 货物类型 =====

    pub fn find_load_types(&self) -> RepositoryResult<Vec<LoadType>> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT load_type, allow_consolidation FROM load_type ORDER BY load_type")?;
        let types = stmt
            .query_map([], |row| {
                Ok(LoadType {
                    load_type: row.get(0)?,
                    allow_consolidation: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<LoadType>>>()?;
        Ok(types)
    }

    pub fn upsert_load_type(&self, load_type: &LoadType) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO load_type (load_type, allow_consolidation) VALUES (?1, ?2)
            ON CONFLICT(load_type) DO UPDATE SET allow_consolidation = ?2
            "#,
            params![load_type.load_type, load_type.allow_consolidation],
        )?;
        Ok(())
    }
}
