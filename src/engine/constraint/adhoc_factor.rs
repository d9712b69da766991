// ==========================================
// 约束族 6: 临时交通因素
// ==========================================
// 生效中且不豁免该车型、影响提/卸地址或提<->卸路线的因素:
// - 完全阻断: 拒绝
// - 部分阻断: 累加延误分钟
// ==========================================

use super::{CheckContext, FamilyVerdict};
use crate::domain::types::AdHocImpact;

pub fn check(ctx: &CheckContext<'_>) -> FamilyVerdict {
    let leg = ctx.leg;
    let mut delay = 0i64;
    let mut notes: Vec<&str> = Vec::new();

    let affecting = ctx.rules.adhoc_factors.iter().filter(|f| {
        f.is_active_at(ctx.scheduled_time)
            && !f.exempts(&ctx.vehicle.vehicle_type)
            && (f
                .affected_addresses
                .iter()
                .any(|a| *a == leg.pick_address_id || *a == leg.drop_address_id)
                || f
                    .affected_routes
                    .iter()
                    .any(|r| r.matches(&leg.pick_address_id, &leg.drop_address_id)))
    });

    for factor in affecting {
        match factor.impact {
            AdHocImpact::CompleteBlockage => {
                return FamilyVerdict::reject(format!(
                    "完全阻断: {} (factor={})",
                    factor.description, factor.factor_id
                ));
            }
            AdHocImpact::PartialBlockage { delay_minutes } => {
                delay = delay.saturating_add(delay_minutes.max(0));
                notes.push(factor.factor_id.as_str());
            }
        }
    }

    if delay > 0 {
        FamilyVerdict::Delay {
            minutes: delay,
            note: notes.join(","),
        }
    } else {
        FamilyVerdict::Pass
    }
}
