// ==========================================
// 塑料生产追踪系统 - 生产单位领域模型
// ==========================================
// 两个产品族变体共享同一套能力:
//   序号 / 当前工段 / 逐工段重量 / 逐工段损耗 / 逐工段机台 / 逐工段时间戳
// Roll        -> production_rolls 表 (AB/PR)
// HangerBatch -> production_hangers 表 (PH)
// ==========================================

use crate::domain::types::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Roll - 生产卷 (卷材族)
// ==========================================
// 不变式: stage 永远是已记录重量/时间戳的最远工段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roll {
    pub id: i64,       // 自增主键
    pub order_id: i64, // 所属订单
    pub tmp_index: i64, // 订单内序号 (MAX+1 分配, 连续递增)
    pub stage: Stage,  // 当前工段

    // ===== 逐工段重量 + 时间戳 =====
    pub roll_weight_g: Option<i64>, // 吹膜重量
    pub roll_weight_ts: Option<DateTime<Utc>>,
    pub printed_weight_g: Option<i64>, // 印刷重量
    pub printed_weight_ts: Option<DateTime<Utc>>,
    pub cut_weight_g: Option<i64>, // 裁切重量
    pub cut_weight_ts: Option<DateTime<Utc>>,
    pub packaged_weight_g: Option<i64>, // 包装重量（完成判定口径）
    pub packaged_weight_ts: Option<DateTime<Utc>>,
    pub metal_detect_ts: Option<DateTime<Utc>>, // 金属探测只记时间戳

    // ===== 逐工段损耗 + 时间戳 =====
    pub waste_of_blowing_g: Option<i64>,
    pub waste_of_blowing_ts: Option<DateTime<Utc>>,
    pub waste_of_printing_g: Option<i64>,
    pub waste_of_printing_ts: Option<DateTime<Utc>>,
    pub waste_of_cutting_g: Option<i64>,
    pub waste_of_cutting_ts: Option<DateTime<Utc>>,
    pub waste_of_metal_detect_g: Option<i64>,
    pub waste_of_metal_detect_ts: Option<DateTime<Utc>>,

    // ===== 逐工段机台绑定 =====
    pub blowing_machine_id: Option<String>,
    pub printing_machine_id: Option<String>,
    pub cutting_machine_id: Option<String>,
    pub metal_detect_machine_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// HangerBatch - 注塑批次 (衣架族)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangerBatch {
    pub id: i64,
    pub order_id: i64,
    pub batch_index: i64, // 订单内序号 (MAX+1 分配, 连续递增)
    pub stage: Stage,
    pub model: Option<String>, // 衣架型号快照（创建时从订单拷贝）

    // ===== 记录重量的工段 + 时间戳 =====
    pub injection_weight_g: Option<i64>, // 注塑重量
    pub injection_weight_ts: Option<DateTime<Utc>>,
    pub packaged_weight_g: Option<i64>, // 包装重量（完成判定口径）
    pub packaged_weight_ts: Option<DateTime<Utc>>,

    // ===== 损耗 + 时间戳 =====
    pub waste_of_im_g: Option<i64>, // 注塑损耗（创建时可附带）
    pub waste_of_im_ts: Option<DateTime<Utc>>,
    pub waste_of_metaldetect_g: Option<i64>, // 金属探测损耗（探测或包装时称量）
    pub waste_of_metaldetect_ts: Option<DateTime<Utc>>,

    // ===== 机台绑定 =====
    pub injection_machine_id: Option<String>,
    pub metal_detect_machine_id: Option<String>,

    // ===== 只记时间戳的工段 =====
    pub metal_detect_ts: Option<DateTime<Utc>>,
    pub sizing_ts: Option<DateTime<Utc>>,
    pub plastic_clips_ts: Option<DateTime<Utc>>,
    pub metal_clips_ts: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// ProductionUnit - 统一生产单位视图
// ==========================================
// 两个变体的字段布局各自内聚, 对外只暴露公共能力
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductionUnit {
    Roll(Roll),
    HangerBatch(HangerBatch),
}

impl ProductionUnit {
    pub fn id(&self) -> i64 {
        match self {
            ProductionUnit::Roll(r) => r.id,
            ProductionUnit::HangerBatch(h) => h.id,
        }
    }

    pub fn order_id(&self) -> i64 {
        match self {
            ProductionUnit::Roll(r) => r.order_id,
            ProductionUnit::HangerBatch(h) => h.order_id,
        }
    }

    /// 订单内序号
    pub fn sequence_index(&self) -> i64 {
        match self {
            ProductionUnit::Roll(r) => r.tmp_index,
            ProductionUnit::HangerBatch(h) => h.batch_index,
        }
    }

    /// 当前工段
    pub fn current_stage(&self) -> Stage {
        match self {
            ProductionUnit::Roll(r) => r.stage,
            ProductionUnit::HangerBatch(h) => h.stage,
        }
    }

    /// 包装重量（未到包装工段返回 None）
    pub fn packaged_weight_g(&self) -> Option<i64> {
        match self {
            ProductionUnit::Roll(r) => r.packaged_weight_g,
            ProductionUnit::HangerBatch(h) => h.packaged_weight_g,
        }
    }
}
