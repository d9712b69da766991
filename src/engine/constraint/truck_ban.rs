// ==========================================
// 约束族 5: 货车禁行
// ==========================================
// 拒绝条件: 禁令适用车型 且 时段生效 且
//   (车辆总重 >= 阈值 或 提/卸地址被禁 或 提<->卸路线被禁)
// 拒绝时附带禁令的替代路线
// ==========================================

use super::{CheckContext, FamilyVerdict};

pub fn check(ctx: &CheckContext<'_>) -> FamilyVerdict {
    let vehicle = ctx.vehicle;
    let leg = ctx.leg;
    let date = ctx.scheduled_time.date();
    let time = ctx.scheduled_time.time();

    for ban in &ctx.rules.truck_bans {
        if !ban.active
            || !ban.effectivity.covers(date)
            || !ban.applies_to(&vehicle.vehicle_type)
            || !ban.is_active_at(time)
        {
            continue;
        }

        let overweight = match (ban.weight_threshold_kg, vehicle.gross_weight_kg) {
            (Some(threshold), Some(gross)) => gross >= threshold,
            _ => false,
        };
        let banned_address = ban
            .banned_addresses
            .iter()
            .find(|a| **a == leg.pick_address_id || **a == leg.drop_address_id);
        let banned_route = ban
            .banned_routes
            .iter()
            .any(|r| r.matches(&leg.pick_address_id, &leg.drop_address_id));

        let cause = if overweight {
            Some("车辆总重超过限制".to_string())
        } else if let Some(address) = banned_address {
            Some(format!("地址 {} 禁行", address))
        } else if banned_route {
            Some(format!(
                "路线 {} <-> {} 禁行",
                leg.pick_address_id, leg.drop_address_id
            ))
        } else {
            None
        };

        if let Some(cause) = cause {
            return FamilyVerdict::Reject {
                reason: format!("{} ({}, ban={})", cause, ban.name, ban.ban_id),
                alternatives: ban.alternative_routes.clone(),
            };
        }
    }
    FamilyVerdict::Pass
}
