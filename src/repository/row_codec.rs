// ==========================================
// 运输调度排车系统 - SQLite 行编解码辅助
// ==========================================
// 职责: TEXT 列 <-> chrono 类型 / JSON 列表 的转换
// 约定: 解析失败返回 FromSqlConversionFailure, 由调用方按仓储错误上抛
// ==========================================

use crate::db::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn conversion_error(col: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, message.into())
}

pub fn parse_date(col: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| conversion_error(col, format!("日期格式错误 '{}': {}", raw, e)))
}

pub fn parse_opt_date(col: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| parse_date(col, &s)).transpose()
}

pub fn parse_datetime(col: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|e| conversion_error(col, format!("时间格式错误 '{}': {}", raw, e)))
}

pub fn parse_opt_datetime(
    col: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_datetime(col, &s)).transpose()
}

pub fn parse_opt_time(col: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveTime>> {
    raw.map(|s| {
        NaiveTime::parse_from_str(&s, TIME_FORMAT)
            .map_err(|e| conversion_error(col, format!("时刻格式错误 '{}': {}", s, e)))
    })
    .transpose()
}

pub fn parse_json<T: DeserializeOwned>(col: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| conversion_error(col, format!("JSON 列格式错误: {}", e)))
}

pub fn parse_enum<T>(col: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| conversion_error(col, e))
}

pub fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn fmt_opt_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(fmt_date)
}

pub fn fmt_datetime(at: NaiveDateTime) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

pub fn fmt_opt_datetime(at: Option<NaiveDateTime>) -> Option<String> {
    at.map(fmt_datetime)
}

pub fn fmt_opt_time(t: Option<NaiveTime>) -> Option<String> {
    t.map(|t| t.format(TIME_FORMAT).to_string())
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_round_trip_and_bad_input() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(parse_date(0, &fmt_date(d)).unwrap(), d);
        assert!(parse_date(0, "02/03/2026").is_err());
        assert_eq!(parse_opt_date(0, None).unwrap(), None);
    }

    #[test]
    fn test_parse_json_list() {
        let tags: Vec<String> = parse_json(3, r#"["HAZMAT_OK","URBAN"]"#).unwrap();
        assert_eq!(tags, vec!["HAZMAT_OK".to_string(), "URBAN".to_string()]);
        assert!(parse_json::<Vec<String>>(3, "not json").is_err());
    }
}
