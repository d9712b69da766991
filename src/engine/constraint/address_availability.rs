// ==========================================
// 约束族 2: 地址可作业日
// ==========================================
// 提货/卸货地址在计划日对应星期的许可标志; 未维护视为允许
// ==========================================

use super::{CheckContext, FamilyVerdict};
use chrono::Datelike;

pub fn check(ctx: &CheckContext<'_>) -> FamilyVerdict {
    let weekday = ctx.scheduled_time.date().weekday();
    for (role, address) in [("提货", ctx.pick), ("卸货", ctx.drop)] {
        if let Some(address) = address {
            if address.day_flag(weekday) == Some(false) {
                return FamilyVerdict::reject(format!(
                    "{}地址 {} 在 {} 不可作业",
                    role, address.address_id, weekday
                ));
            }
        }
    }
    FamilyVerdict::Pass
}
