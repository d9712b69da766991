// ==========================================
// 约束族 3: 区域分类
// ==========================================
// 地址定义了分类标签字段时, 必须具备所有适用于该车型的必需标签
// 未定义该字段的地址跳过检查
// ==========================================

use super::{CheckContext, FamilyVerdict};

pub fn check(ctx: &CheckContext<'_>) -> FamilyVerdict {
    let vehicle_type = ctx.vehicle.vehicle_type.as_str();
    for address in [ctx.pick, ctx.drop].into_iter().flatten() {
        let Some(tags) = &address.zoning_tags else {
            continue;
        };
        for rule in ctx.rules.zoning.iter().filter(|r| r.applies_to(vehicle_type)) {
            if !tags.iter().any(|t| t == &rule.required_tag) {
                return FamilyVerdict::reject(format!(
                    "地址 {} 缺少区域标签 {} (rule={})",
                    address.address_id, rule.required_tag, rule.rule_id
                ));
            }
        }
    }
    FamilyVerdict::Pass
}
