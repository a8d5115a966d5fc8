// ==========================================
// 塑料生产追踪系统 - 工段流程解析器
// ==========================================
// 规则:
// - PR: 吹膜 -> 包装
// - AB: 吹膜 -> 印刷 -> 裁切 -> 包装, 二级料在包装前插金属探测
// - PH: 注塑 -> 称重 -> 分规 -> 包装, 二级料在称重后插金属探测,
//       非 WT-19 型号在包装前加装塑料夹/金属夹两道工段
// 红线: 纯函数, 不读存储, 同输入必同输出
// ==========================================

use crate::domain::types::{MaterialGrade, ProductFamily, Stage};

// ===== 卷材族流程 =====
pub const FLOW_PR: &[Stage] = &[Stage::Blowing, Stage::Packaging];

pub const FLOW_AB_1ST: &[Stage] = &[
    Stage::Blowing,
    Stage::Printing,
    Stage::Cutting,
    Stage::Packaging,
];

pub const FLOW_AB_2ND: &[Stage] = &[
    Stage::Blowing,
    Stage::Printing,
    Stage::Cutting,
    Stage::MetalDetect,
    Stage::Packaging,
];

// ===== 衣架族流程 =====
// WT-19 为轻量型号, 整体跳过装夹
pub const FLOW_PH_WT19_1ST: &[Stage] = &[
    Stage::Injection,
    Stage::Weighing,
    Stage::Sizing,
    Stage::Packaging,
];

pub const FLOW_PH_WT19_2ND: &[Stage] = &[
    Stage::Injection,
    Stage::Weighing,
    Stage::MetalDetect,
    Stage::Sizing,
    Stage::Packaging,
];

pub const FLOW_PH_1ST: &[Stage] = &[
    Stage::Injection,
    Stage::Weighing,
    Stage::Sizing,
    Stage::PlasticClips,
    Stage::MetalClips,
    Stage::Packaging,
];

pub const FLOW_PH_2ND: &[Stage] = &[
    Stage::Injection,
    Stage::Weighing,
    Stage::MetalDetect,
    Stage::Sizing,
    Stage::PlasticClips,
    Stage::MetalClips,
    Stage::Packaging,
];

/// 解析订单的工段流程
///
/// 完全由 (产品族, 原料等级, 型号) 三元组决定, 所有组合都有定义
pub fn resolve(
    product: ProductFamily,
    grade: MaterialGrade,
    model: Option<&str>,
) -> &'static [Stage] {
    match product {
        ProductFamily::PR => FLOW_PR,
        ProductFamily::AB => match grade {
            MaterialGrade::FirstDegree => FLOW_AB_1ST,
            MaterialGrade::SecondDegree => FLOW_AB_2ND,
        },
        ProductFamily::PH => {
            let is_wt19 = model.is_some_and(|m| m.contains("WT-19"));
            match (is_wt19, grade) {
                (true, MaterialGrade::FirstDegree) => FLOW_PH_WT19_1ST,
                (true, MaterialGrade::SecondDegree) => FLOW_PH_WT19_2ND,
                (false, MaterialGrade::FirstDegree) => FLOW_PH_1ST,
                (false, MaterialGrade::SecondDegree) => FLOW_PH_2ND,
            }
        }
    }
}

/// 工段在流程中的下标（不在流程内返回 None）
///
/// 显式查表, 不依赖枚举序数比较
pub fn stage_index_of(flow: &[Stage], stage: Stage) -> Option<usize> {
    flow.iter().position(|s| *s == stage)
}

/// 当前工段的唯一合法后继（终点工段返回 None）
pub fn next_stage_of(flow: &[Stage], current: Stage) -> Option<Stage> {
    let idx = stage_index_of(flow, current)?;
    flow.get(idx + 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_pure() {
        // 同输入两次调用结果一致
        let a = resolve(ProductFamily::AB, MaterialGrade::SecondDegree, None);
        let b = resolve(ProductFamily::AB, MaterialGrade::SecondDegree, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_pr_short_flow() {
        let flow = resolve(ProductFamily::PR, MaterialGrade::FirstDegree, None);
        assert_eq!(flow, &[Stage::Blowing, Stage::Packaging]);
        // PR 不受原料等级影响
        let flow_2nd = resolve(ProductFamily::PR, MaterialGrade::SecondDegree, None);
        assert_eq!(flow, flow_2nd);
    }

    #[test]
    fn test_second_degree_inserts_exactly_one_metal_detect() {
        // 二级料流程恰好比一级料多一道金属探测
        let cases = [
            (ProductFamily::AB, None),
            (ProductFamily::PH, Some("WT-19")),
            (ProductFamily::PH, Some("Classic-30")),
        ];
        for (product, model) in cases {
            let first = resolve(product, MaterialGrade::FirstDegree, model);
            let second = resolve(product, MaterialGrade::SecondDegree, model);
            assert_eq!(second.len(), first.len() + 1, "{product} {model:?}");
            assert!(stage_index_of(first, Stage::MetalDetect).is_none());
            assert!(stage_index_of(second, Stage::MetalDetect).is_some());
        }
    }

    #[test]
    fn test_ab_metal_detect_before_packaging() {
        let flow = resolve(ProductFamily::AB, MaterialGrade::SecondDegree, None);
        let md = stage_index_of(flow, Stage::MetalDetect).unwrap();
        let pk = stage_index_of(flow, Stage::Packaging).unwrap();
        assert_eq!(pk, md + 1);
    }

    #[test]
    fn test_ph_metal_detect_after_weighing() {
        let flow = resolve(ProductFamily::PH, MaterialGrade::SecondDegree, Some("Classic-30"));
        let weigh = stage_index_of(flow, Stage::Weighing).unwrap();
        let md = stage_index_of(flow, Stage::MetalDetect).unwrap();
        assert_eq!(md, weigh + 1);
    }

    #[test]
    fn test_wt19_skips_clips() {
        let flow = resolve(ProductFamily::PH, MaterialGrade::FirstDegree, Some("WT-19"));
        assert!(stage_index_of(flow, Stage::PlasticClips).is_none());
        assert!(stage_index_of(flow, Stage::MetalClips).is_none());

        let other = resolve(ProductFamily::PH, MaterialGrade::FirstDegree, Some("Classic-30"));
        let plastic = stage_index_of(other, Stage::PlasticClips).unwrap();
        let metal = stage_index_of(other, Stage::MetalClips).unwrap();
        let pk = stage_index_of(other, Stage::Packaging).unwrap();
        assert_eq!(metal, plastic + 1);
        assert_eq!(pk, metal + 1);
    }

    #[test]
    fn test_all_flows_end_in_packaging() {
        let flows = [
            FLOW_PR,
            FLOW_AB_1ST,
            FLOW_AB_2ND,
            FLOW_PH_WT19_1ST,
            FLOW_PH_WT19_2ND,
            FLOW_PH_1ST,
            FLOW_PH_2ND,
        ];
        for flow in flows {
            assert_eq!(*flow.last().unwrap(), Stage::Packaging);
        }
    }

    #[test]
    fn test_next_stage_of() {
        assert_eq!(
            next_stage_of(FLOW_AB_1ST, Stage::Blowing),
            Some(Stage::Printing)
        );
        assert_eq!(next_stage_of(FLOW_AB_1ST, Stage::Packaging), None);
        // 不在流程内的工段
        assert_eq!(next_stage_of(FLOW_PR, Stage::Printing), None);
    }
}
