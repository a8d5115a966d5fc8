// ==========================================
// 塑料生产追踪系统 - 领域类型定义
// ==========================================
// 产品族: AB(服装袋) / PR(塑料卷) / PH(塑料衣架)
// 工段命名与数据库存储格式一致 (SCREAMING_SNAKE_CASE)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 枚举解析错误（数据库/外部输入中的非法取值）
#[derive(Debug, Clone, thiserror::Error)]
#[error("非法的{kind}取值: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

// ==========================================
// 产品族 (Product Family)
// ==========================================
// AB/PR 为卷材族(production_rolls), PH 为衣架族(production_hangers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductFamily {
    AB, // 服装袋 (Apparel Bags)
    PR, // 塑料卷 (Plastic Rolls)
    PH, // 塑料衣架 (Plastic Hangers)
}

impl ProductFamily {
    /// 是否为卷材族（生产单位为卷）
    pub fn is_roll_based(&self) -> bool {
        matches!(self, ProductFamily::AB | ProductFamily::PR)
    }

    /// 是否为衣架族（生产单位为注塑批次）
    pub fn is_hanger_based(&self) -> bool {
        matches!(self, ProductFamily::PH)
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductFamily::AB => write!(f, "AB"),
            ProductFamily::PR => write!(f, "PR"),
            ProductFamily::PH => write!(f, "PH"),
        }
    }
}

impl FromStr for ProductFamily {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AB" => Ok(ProductFamily::AB),
            "PR" => Ok(ProductFamily::PR),
            "PH" => Ok(ProductFamily::PH),
            other => Err(EnumParseError {
                kind: "产品族",
                value: other.to_string(),
            }),
        }
    }
}

// ==========================================
// 原料等级 (Material Grade)
// ==========================================
// 二级料流程需要插入金属探测工段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialGrade {
    FirstDegree,  // 一级料
    SecondDegree, // 二级料
}

impl MaterialGrade {
    /// 从订单 raw_degree 字段解析
    ///
    /// 仅 "2nd Degree" 判定为二级料，其余（含缺失）按一级料处理
    pub fn from_raw_degree(raw_degree: Option<&str>) -> Self {
        match raw_degree {
            Some("2nd Degree") => MaterialGrade::SecondDegree,
            _ => MaterialGrade::FirstDegree,
        }
    }
}

impl fmt::Display for MaterialGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialGrade::FirstDegree => write!(f, "1st Degree"),
            MaterialGrade::SecondDegree => write!(f, "2nd Degree"),
        }
    }
}

// ==========================================
// 生产工段 (Production Stage)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    // ===== 卷材族工段 =====
    Blowing,  // 吹膜
    Printing, // 印刷
    Cutting,  // 裁切
    // ===== 衣架族工段 =====
    Injection,    // 注塑
    Weighing,     // 称重
    Sizing,       // 分规
    PlasticClips, // 装塑料夹
    MetalClips,   // 装金属夹
    // ===== 公共工段 =====
    MetalDetect, // 金属探测（仅二级料流程）
    Packaging,   // 包装（终点工段）
}

impl Stage {
    /// 工段所需机台类型（无需机台的工段返回 None）
    pub fn required_machine_type(&self) -> Option<MachineType> {
        match self {
            Stage::Blowing => Some(MachineType::BlowingFilm),
            Stage::Printing => Some(MachineType::Printing),
            Stage::Cutting => Some(MachineType::Cutting),
            Stage::MetalDetect => Some(MachineType::MetalDetector),
            Stage::Injection => Some(MachineType::InjectionMolding),
            Stage::Weighing
            | Stage::Sizing
            | Stage::PlasticClips
            | Stage::MetalClips
            | Stage::Packaging => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Blowing => write!(f, "BLOWING"),
            Stage::Printing => write!(f, "PRINTING"),
            Stage::Cutting => write!(f, "CUTTING"),
            Stage::Injection => write!(f, "INJECTION"),
            Stage::Weighing => write!(f, "WEIGHING"),
            Stage::Sizing => write!(f, "SIZING"),
            Stage::PlasticClips => write!(f, "PLASTIC_CLIPS"),
            Stage::MetalClips => write!(f, "METAL_CLIPS"),
            Stage::MetalDetect => write!(f, "METAL_DETECT"),
            Stage::Packaging => write!(f, "PACKAGING"),
        }
    }
}

impl FromStr for Stage {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLOWING" => Ok(Stage::Blowing),
            "PRINTING" => Ok(Stage::Printing),
            "CUTTING" => Ok(Stage::Cutting),
            "INJECTION" => Ok(Stage::Injection),
            "WEIGHING" => Ok(Stage::Weighing),
            "SIZING" => Ok(Stage::Sizing),
            "PLASTIC_CLIPS" => Ok(Stage::PlasticClips),
            "METAL_CLIPS" => Ok(Stage::MetalClips),
            "METAL_DETECT" => Ok(Stage::MetalDetect),
            "PACKAGING" => Ok(Stage::Packaging),
            other => Err(EnumParseError {
                kind: "生产工段",
                value: other.to_string(),
            }),
        }
    }
}

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 状态机: pending -> in_progress -> completed
// 红线: completed 只由 CompletionSynchronizer 写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,    // 待生产
    InProgress, // 生产中
    Completed,  // 已完成
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::InProgress => write!(f, "in_progress"),
            OrderStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(EnumParseError {
                kind: "订单状态",
                value: other.to_string(),
            }),
        }
    }
}

// ==========================================
// 机台状态 (Machine Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Available,   // 空闲
    InUse,       // 使用中（已绑定订单）
    Maintenance, // 维护中
    OutOfOrder,  // 故障
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineStatus::Available => write!(f, "available"),
            MachineStatus::InUse => write!(f, "in_use"),
            MachineStatus::Maintenance => write!(f, "maintenance"),
            MachineStatus::OutOfOrder => write!(f, "out_of_order"),
        }
    }
}

impl FromStr for MachineStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(MachineStatus::Available),
            "in_use" => Ok(MachineStatus::InUse),
            "maintenance" => Ok(MachineStatus::Maintenance),
            "out_of_order" => Ok(MachineStatus::OutOfOrder),
            other => Err(EnumParseError {
                kind: "机台状态",
                value: other.to_string(),
            }),
        }
    }
}

// ==========================================
// 机台类型 (Machine Type)
// ==========================================
// 与需要机台的工段一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineType {
    BlowingFilm,      // 吹膜机
    Printing,         // 印刷机
    Cutting,          // 裁切机
    MetalDetector,    // 金属探测仪
    InjectionMolding, // 注塑机
}

impl MachineType {
    /// 机台编号前缀 (BF-001 / P-001 / C-001 / MD-001 / IM-001)
    pub fn id_prefix(&self) -> &'static str {
        match self {
            MachineType::BlowingFilm => "BF",
            MachineType::Printing => "P",
            MachineType::Cutting => "C",
            MachineType::MetalDetector => "MD",
            MachineType::InjectionMolding => "IM",
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineType::BlowingFilm => write!(f, "Blowing Film"),
            MachineType::Printing => write!(f, "Printing"),
            MachineType::Cutting => write!(f, "Cutting"),
            MachineType::MetalDetector => write!(f, "Metal Detector"),
            MachineType::InjectionMolding => write!(f, "Injection Molding"),
        }
    }
}

impl FromStr for MachineType {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Blowing Film" => Ok(MachineType::BlowingFilm),
            "Printing" => Ok(MachineType::Printing),
            "Cutting" => Ok(MachineType::Cutting),
            "Metal Detector" => Ok(MachineType::MetalDetector),
            "Injection Molding" => Ok(MachineType::InjectionMolding),
            other => Err(EnumParseError {
                kind: "机台类型",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_roundtrip() {
        let stages = [
            Stage::Blowing,
            Stage::Printing,
            Stage::Cutting,
            Stage::Injection,
            Stage::Weighing,
            Stage::Sizing,
            Stage::PlasticClips,
            Stage::MetalClips,
            Stage::MetalDetect,
            Stage::Packaging,
        ];
        for stage in stages {
            let parsed: Stage = stage.to_string().parse().expect("解析失败");
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_stage_machine_mapping() {
        assert_eq!(
            Stage::Blowing.required_machine_type(),
            Some(MachineType::BlowingFilm)
        );
        assert_eq!(
            Stage::Injection.required_machine_type(),
            Some(MachineType::InjectionMolding)
        );
        assert_eq!(
            Stage::MetalDetect.required_machine_type(),
            Some(MachineType::MetalDetector)
        );
        // 包装/分规/装夹不需要机台
        assert_eq!(Stage::Packaging.required_machine_type(), None);
        assert_eq!(Stage::Sizing.required_machine_type(), None);
        assert_eq!(Stage::PlasticClips.required_machine_type(), None);
    }

    #[test]
    fn test_material_grade_from_raw_degree() {
        assert_eq!(
            MaterialGrade::from_raw_degree(Some("2nd Degree")),
            MaterialGrade::SecondDegree
        );
        assert_eq!(
            MaterialGrade::from_raw_degree(Some("1st Degree")),
            MaterialGrade::FirstDegree
        );
        assert_eq!(
            MaterialGrade::from_raw_degree(None),
            MaterialGrade::FirstDegree
        );
    }

    #[test]
    fn test_machine_type_prefix() {
        assert_eq!(MachineType::BlowingFilm.id_prefix(), "BF");
        assert_eq!(MachineType::InjectionMolding.id_prefix(), "IM");
    }
}
