// ==========================================
// 约束族 1: 时间窗
// ==========================================
// 时间链: 到达提货点 -> +装货 -> +行驶 -> 到达卸货点 -> +卸货 -> 完成
// 拒绝: 到达提货点不在提货窗内, 或完成时刻不在卸货窗内
// 拒绝: 里程或作业时长超出可表示的时间范围 (推演溢出)
// ==========================================

use super::{CheckContext, FamilyVerdict};
use chrono::{NaiveDateTime, TimeDelta};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// 单段时间推演结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegTimeline {
    pub arrival_at_pick: NaiveDateTime,
    pub departure_from_pick: NaiveDateTime,
    pub arrival_at_drop: NaiveDateTime,
    pub completion: NaiveDateTime,
}

/// 两点球面距离 (千米)
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// 运输段里程: 外部给定 > 坐标估算 × 道路系数 > 0
pub fn leg_distance_km(ctx: &CheckContext<'_>) -> f64 {
    if let Some(d) = ctx.leg.distance_km {
        return d.max(0.0);
    }
    let from = ctx.pick.and_then(|a| a.coordinates());
    let to = ctx.drop.and_then(|a| a.coordinates());
    match (from, to) {
        (Some(from), Some(to)) => haversine_km(from, to) * ctx.config.road_distance_factor,
        _ => 0.0,
    }
}

fn minutes(m: f64) -> Option<TimeDelta> {
    let secs = (m * 60.0).round();
    if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_seconds(secs as i64)
}

fn advance(from: NaiveDateTime, m: f64) -> Option<NaiveDateTime> {
    from.checked_add_signed(minutes(m)?)
}

/// 时间推演; 任一环节溢出时返回 None
pub fn timeline(ctx: &CheckContext<'_>) -> Option<LegTimeline> {
    let speed = ctx
        .vehicle
        .average_speed_kph
        .filter(|s| *s > 0.0)
        .unwrap_or(ctx.config.default_speed_kph);
    let travel_minutes = leg_distance_km(ctx) / speed * 60.0;
    let loading = ctx
        .config
        .handling_for(ctx.leg.pick_mode.as_deref())
        .duration_minutes(&ctx.leg.load);
    let unloading = ctx
        .config
        .handling_for(ctx.leg.drop_mode.as_deref())
        .duration_minutes(&ctx.leg.load);

    let arrival_at_pick = ctx.scheduled_time;
    let departure_from_pick = advance(arrival_at_pick, loading)?;
    let arrival_at_drop = advance(departure_from_pick, travel_minutes)?;
    let completion = advance(arrival_at_drop, unloading)?;
    Some(LegTimeline {
        arrival_at_pick,
        departure_from_pick,
        arrival_at_drop,
        completion,
    })
}

pub fn check(ctx: &CheckContext<'_>) -> FamilyVerdict {
    let Some(t) = timeline(ctx) else {
        return FamilyVerdict::reject(format!(
            "时间推演溢出 (里程 {}km)",
            leg_distance_km(ctx)
        ));
    };
    if !ctx.leg.pick_window.contains(t.arrival_at_pick) {
        return FamilyVerdict::reject(format!(
            "到达提货点 {} 不在提货时间窗内",
            t.arrival_at_pick
        ));
    }
    if !ctx.leg.drop_window.contains(t.completion) {
        return FamilyVerdict::reject(format!("卸货完成 {} 不在卸货时间窗内", t.completion));
    }
    FamilyVerdict::Pass
}
