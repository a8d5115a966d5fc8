// ==========================================
// 塑料生产追踪系统 - 机台指派校验
// ==========================================
// 职责: 工段落重量前的唯一闸口, 拦住"拿别的订单的机台记产量"
// 规则: 机台绑定该订单 且 类型与工段匹配 且 状态 in_use, 三者同时成立
// 红线: 只读, 不产生任何副作用
// ==========================================

use crate::domain::types::Stage;
use crate::repository::error::RepositoryResult;
use crate::repository::machine_repo::MachineRepository;
use std::sync::Arc;

pub struct MachineGate {
    machine_repo: Arc<MachineRepository>,
}

impl MachineGate {
    pub fn new(machine_repo: Arc<MachineRepository>) -> Self {
        Self { machine_repo }
    }

    /// 校验机台可否用于该订单的指定工段
    ///
    /// 无需机台的工段（称重/分规/装夹/包装）恒为通过;
    /// 机台不存在按不通过处理
    pub fn validate(
        &self,
        machine_id: &str,
        order_id: i64,
        stage: Stage,
    ) -> RepositoryResult<bool> {
        let Some(required_type) = stage.required_machine_type() else {
            return Ok(true);
        };

        let Some(machine) = self.machine_repo.find_by_machine_id(machine_id)? else {
            tracing::debug!("机台校验不通过: {} 不存在", machine_id);
            return Ok(false);
        };

        let ok = machine.is_bound_to(order_id) && machine.machine_type == required_type;

        if !ok {
            tracing::debug!(
                "机台校验不通过: {} (绑定订单={:?}, 类型={}, 状态={}) 不可用于订单 {} 的 {} 工段",
                machine.machine_id,
                machine.current_job_order,
                machine.machine_type,
                machine.status,
                order_id,
                stage,
            );
        }
        Ok(ok)
    }
}
