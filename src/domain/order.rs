// ==========================================
// 塑料生产追踪系统 - 订单领域模型
// ==========================================
// 对齐: job_orders 表
// 红线: 订单由下单流程创建; 本核心只在生产开始后
//       修改重量/状态字段, completed 后冻结
// ==========================================

use crate::domain::types::{MaterialGrade, OrderStatus, ProductFamily};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// JobOrder - 生产订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOrder {
    pub id: i64,                        // 订单号
    pub product: ProductFamily,         // 产品族 (AB/PR/PH)
    pub model: Option<String>,          // 型号（衣架族用于流程判定, 如 "WT-19"）
    pub raw_degree: Option<String>,     // 原料等级原始文本 ("1st Degree"/"2nd Degree")
    pub status: OrderStatus,            // 订单状态
    pub target_weight_no_waste: f64,    // 目标重量(kg, 不含损耗)
    pub target_weight_with_waste: f64,  // 目标重量(kg, 含损耗余量)
    pub remaining_target_g: i64,        // 剩余目标(克)
    pub total_waste_g: Option<i64>,     // 总损耗(克, 完成时冻结)
    pub completed_at: Option<DateTime<Utc>>, // 完成时间
    pub created_at: DateTime<Utc>,      // 记录创建时间
    pub updated_at: DateTime<Utc>,      // 记录更新时间
}

impl JobOrder {
    /// 含损耗目标重量（克）
    ///
    /// 完成判定与剩余目标计算统一使用该口径
    pub fn target_with_waste_g(&self) -> i64 {
        (self.target_weight_with_waste * 1000.0).round() as i64
    }

    /// 订单原料等级
    pub fn material_grade(&self) -> MaterialGrade {
        MaterialGrade::from_raw_degree(self.raw_degree.as_deref())
    }

    /// 是否已完成（完成后对本核心只读）
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}
