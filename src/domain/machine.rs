// ==========================================
// 塑料生产追踪系统 - 机台领域模型
// ==========================================
// 对齐: machines 表
// 红线: 绑定(in_use)由订单激活流程写入;
//       本核心只做读取校验与完成后的释放
// ==========================================

use crate::domain::types::{MachineStatus, MachineType};
use serde::{Deserialize, Serialize};

// ==========================================
// Machine - 机台
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub id: i64,                        // 自增主键
    pub machine_id: String,             // 机台编号 (如 BF-001)
    pub production_line: String,        // 产线 (如 "Line 1")
    pub machine_type: MachineType,      // 机台类型
    pub status: MachineStatus,          // 机台状态
    pub current_job_order: Option<i64>, // 当前绑定订单（独占）
}

impl Machine {
    /// 是否可用于指定订单的生产记录
    ///
    /// 三个条件缺一不可: 绑定该订单、状态 in_use、类型匹配由调用方校验
    pub fn is_bound_to(&self, order_id: i64) -> bool {
        self.current_job_order == Some(order_id) && self.status == MachineStatus::InUse
    }
}
