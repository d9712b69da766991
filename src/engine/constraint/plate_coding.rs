// ==========================================
// 约束族 4: 尾号限行
// ==========================================
// 豁免车型放行; 车牌无数字放行
// 规则在计划日星期生效且尾号受限 (可限定时段) 时拒绝
// ==========================================

use super::{CheckContext, FamilyVerdict};
use chrono::Datelike;

pub fn check(ctx: &CheckContext<'_>) -> FamilyVerdict {
    if ctx.vehicle.plate_coding_exempt {
        return FamilyVerdict::Pass;
    }
    let Some(digit) = ctx.vehicle.plate_last_digit() else {
        return FamilyVerdict::Pass;
    };

    let date = ctx.scheduled_time.date();
    let time = ctx.scheduled_time.time();
    let hit = ctx.rules.plate_coding.iter().find(|rule| {
        rule.active
            && rule.weekday == date.weekday()
            && rule.effectivity.covers(date)
            && rule.restricted_digits.contains(&digit)
            && rule.window.map_or(true, |w| w.contains(time))
    });

    match hit {
        Some(rule) => FamilyVerdict::reject(format!(
            "车牌 {} 尾号 {} 在 {} 限行 (rule={})",
            ctx.vehicle.license_plate,
            digit,
            date.weekday(),
            rule.rule_id
        )),
        None => FamilyVerdict::Pass,
    }
}
