// ==========================================
// 塑料生产追踪系统 - 生产追踪 API
// ==========================================
// 职责: 生产单位台账的操作面: 创建单位、工段推进、
//       进度查询、绑定机台查询、完成订单清扫
// 裁决顺序: 输入校验 -> 订单冻结检查 -> 工段顺序校验 -> 机台闸口
//           全部通过后才进入仓储的原子落库
// 红线: 工段只能逐段推进; 机台校验不过则一个字节都不落库
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::machine::Machine;
use crate::domain::order::JobOrder;
use crate::domain::types::{MachineType, OrderStatus, ProductFamily, Stage};
use crate::domain::unit::{HangerBatch, ProductionUnit, Roll};
use crate::engine::completion::{CompletionSynchronizer, ReleaseSweep};
use crate::engine::flow;
use crate::engine::machine_gate::MachineGate;
use crate::repository::machine_repo::MachineRepository;
use crate::repository::order_repo::JobOrderRepository;
use crate::repository::unit_repo::{
    HangerChanges, HangerCreateData, ProductionUnitRepository, RollChanges, RollCreateData,
};

// ==========================================
// 请求与视图模型
// ==========================================

/// 创建生产卷（首工段: 吹膜）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollCreateRequest {
    pub weight_g: i64,
    pub waste_of_blowing_g: Option<i64>,
    /// 生产该卷的吹膜机
    pub blowing_machine_id: String,
}

/// 更新生产卷（推进工段 / 补录重量、损耗、机台）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollUpdateRequest {
    pub stage: Option<Stage>,
    pub weight_g: Option<i64>,
    pub waste_of_blowing_g: Option<i64>,
    pub waste_of_printing_g: Option<i64>,
    pub waste_of_cutting_g: Option<i64>,
    pub waste_of_metal_detect_g: Option<i64>,

    // 各工段机台
    pub blowing_machine_id: Option<String>,
    pub printing_machine_id: Option<String>,
    pub cutting_machine_id: Option<String>,
    pub metal_detect_machine_id: Option<String>,
}

/// 创建注塑批次（首工段: 注塑）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangerCreateRequest {
    pub weight_g: i64,
    pub waste_of_im_g: Option<i64>,
    /// 生产该批次的注塑机
    pub injection_machine_id: String,
}

/// 更新注塑批次
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HangerUpdateRequest {
    pub stage: Option<Stage>,
    pub weight_g: Option<i64>,
    pub waste_of_metaldetect_g: Option<i64>,

    pub injection_machine_id: Option<String>,
    pub metal_detect_machine_id: Option<String>,
}

/// 逐工段损耗
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageWaste {
    pub stage: Stage,
    pub waste_g: i64,
}

/// 损耗拆解
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteBreakdown {
    pub by_stage: Vec<StageWaste>,
    /// 已完成订单取冻结值, 否则取当前合计
    pub total_waste_g: i64,
}

/// 工段批次数（衣架族）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: Stage,
    pub count: i64,
}

/// 订单生产进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProductionStatus {
    pub order_id: i64,
    pub status: OrderStatus,
    pub product: ProductFamily,
    pub model: Option<String>,
    pub raw_degree: Option<String>,
    pub flow: Vec<Stage>,
    pub target_g: i64,
    pub done_g: i64,
    pub remaining_g: i64,
    pub completion_pct: f64,
    pub waste: WasteBreakdown,
    /// 仅衣架族填充
    pub stage_counts: Option<Vec<StageCount>>,
}

/// 流程工段说明（含机台需求）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStageInfo {
    pub stage: Stage,
    pub requires_machine: bool,
    pub machine_type: Option<MachineType>,
}

// ==========================================
// TrackingApi - 生产追踪操作面
// ==========================================
pub struct TrackingApi {
    order_repo: Arc<JobOrderRepository>,
    unit_repo: Arc<ProductionUnitRepository>,
    machine_repo: Arc<MachineRepository>,
    machine_gate: Arc<MachineGate>,
    completion: Arc<CompletionSynchronizer>,
}

impl TrackingApi {
    pub fn new(
        order_repo: Arc<JobOrderRepository>,
        unit_repo: Arc<ProductionUnitRepository>,
        machine_repo: Arc<MachineRepository>,
        machine_gate: Arc<MachineGate>,
        completion: Arc<CompletionSynchronizer>,
    ) -> Self {
        Self {
            order_repo,
            unit_repo,
            machine_repo,
            machine_gate,
            completion,
        }
    }

    // ==========================================
    // 卷材族操作 (AB / PR)
    // ==========================================

    /// 创建生产卷
    ///
    /// 前置: 订单未完成; 吹膜机通过机台闸口
    pub fn create_roll(&self, order_id: i64, req: &RollCreateRequest) -> ApiResult<Roll> {
        ensure_positive("weight_g", req.weight_g)?;
        ensure_non_negative("waste_of_blowing_g", req.waste_of_blowing_g)?;

        let order = self.load_order(order_id)?;
        ensure_roll_family(&order)?;

        if self.completion.sync(order_id)? {
            return Err(ApiError::OrderCompleted(order_id));
        }

        if !self
            .machine_gate
            .validate(&req.blowing_machine_id, order_id, Stage::Blowing)?
        {
            return Err(ApiError::MachineNotAssigned {
                machine_id: req.blowing_machine_id.clone(),
                stage: Stage::Blowing,
            });
        }

        let roll = self.unit_repo.create_roll(
            order_id,
            &RollCreateData {
                weight_g: req.weight_g,
                waste_of_blowing_g: req.waste_of_blowing_g,
                blowing_machine_id: req.blowing_machine_id.clone(),
            },
        )?;
        Ok(roll)
    }

    /// 更新生产卷: 可选推进工段, 可选补录重量/损耗/机台
    ///
    /// 推进目标必须是流程中当前工段的直接后继; 落库后重算订单完成度
    pub fn update_roll(
        &self,
        order_id: i64,
        roll_id: i64,
        req: &RollUpdateRequest,
    ) -> ApiResult<Roll> {
        ensure_non_negative("weight_g", req.weight_g)?;
        ensure_non_negative("waste_of_blowing_g", req.waste_of_blowing_g)?;
        ensure_non_negative("waste_of_printing_g", req.waste_of_printing_g)?;
        ensure_non_negative("waste_of_cutting_g", req.waste_of_cutting_g)?;
        ensure_non_negative("waste_of_metal_detect_g", req.waste_of_metal_detect_g)?;

        let order = self.load_order(order_id)?;
        ensure_roll_family(&order)?;
        let flow = flow::resolve(order.product, order.material_grade(), order.model.as_deref());

        if self.completion.sync(order_id)? {
            return Err(ApiError::OrderCompleted(order_id));
        }

        let roll = self
            .unit_repo
            .find_roll(order_id, roll_id)?
            .ok_or_else(|| ApiError::NotFound(format!("生产卷(id={roll_id})不存在")))?;

        let new_stage = self.check_transition(flow, roll.stage, req.stage)?;

        // 目标工段对应的机台字段
        let stage_machine_id = match new_stage {
            Stage::Blowing => req.blowing_machine_id.as_ref(),
            Stage::Printing => req.printing_machine_id.as_ref(),
            Stage::Cutting => req.cutting_machine_id.as_ref(),
            Stage::MetalDetect => req.metal_detect_machine_id.as_ref(),
            _ => None,
        };
        if let Some(machine_id) = stage_machine_id {
            if !self.machine_gate.validate(machine_id, order_id, new_stage)? {
                return Err(ApiError::MachineNotAssigned {
                    machine_id: machine_id.clone(),
                    stage: new_stage,
                });
            }
        }

        let updated = self.unit_repo.update_roll(
            order_id,
            roll_id,
            &RollChanges {
                target_stage: Some(new_stage),
                set_stage: new_stage != roll.stage,
                weight_g: req.weight_g,
                waste_of_blowing_g: req.waste_of_blowing_g,
                waste_of_printing_g: req.waste_of_printing_g,
                waste_of_cutting_g: req.waste_of_cutting_g,
                waste_of_metal_detect_g: req.waste_of_metal_detect_g,
                machine_id: stage_machine_id.cloned(),
            },
        )?;

        // 提交后重算完成度
        self.completion.sync(order_id)?;
        Ok(updated)
    }

    // ==========================================
    // 衣架族操作 (PH)
    // ==========================================

    /// 创建注塑批次
    pub fn create_hanger_batch(
        &self,
        order_id: i64,
        req: &HangerCreateRequest,
    ) -> ApiResult<HangerBatch> {
        ensure_positive("weight_g", req.weight_g)?;
        ensure_non_negative("waste_of_im_g", req.waste_of_im_g)?;

        let order = self.load_order(order_id)?;
        ensure_hanger_family(&order)?;

        if self.completion.sync(order_id)? {
            return Err(ApiError::OrderCompleted(order_id));
        }

        if !self
            .machine_gate
            .validate(&req.injection_machine_id, order_id, Stage::Injection)?
        {
            return Err(ApiError::MachineNotAssigned {
                machine_id: req.injection_machine_id.clone(),
                stage: Stage::Injection,
            });
        }

        let batch = self.unit_repo.create_hanger_batch(
            order_id,
            &HangerCreateData {
                weight_g: req.weight_g,
                waste_of_im_g: req.waste_of_im_g,
                injection_machine_id: req.injection_machine_id.clone(),
                model: order.model.clone(),
            },
        )?;
        Ok(batch)
    }

    /// 更新注塑批次（语义同 update_roll）
    pub fn update_hanger_batch(
        &self,
        order_id: i64,
        batch_id: i64,
        req: &HangerUpdateRequest,
    ) -> ApiResult<HangerBatch> {
        ensure_non_negative("weight_g", req.weight_g)?;
        ensure_non_negative("waste_of_metaldetect_g", req.waste_of_metaldetect_g)?;

        let order = self.load_order(order_id)?;
        ensure_hanger_family(&order)?;
        let flow = flow::resolve(order.product, order.material_grade(), order.model.as_deref());

        if self.completion.sync(order_id)? {
            return Err(ApiError::OrderCompleted(order_id));
        }

        let batch = self
            .unit_repo
            .find_hanger_batch(order_id, batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("注塑批次(id={batch_id})不存在")))?;

        let new_stage = self.check_transition(flow, batch.stage, req.stage)?;

        let stage_machine_id = match new_stage {
            Stage::Injection => req.injection_machine_id.as_ref(),
            Stage::MetalDetect => req.metal_detect_machine_id.as_ref(),
            _ => None,
        };
        if let Some(machine_id) = stage_machine_id {
            if !self.machine_gate.validate(machine_id, order_id, new_stage)? {
                return Err(ApiError::MachineNotAssigned {
                    machine_id: machine_id.clone(),
                    stage: new_stage,
                });
            }
        }

        let updated = self.unit_repo.update_hanger_batch(
            order_id,
            batch_id,
            &HangerChanges {
                target_stage: Some(new_stage),
                set_stage: new_stage != batch.stage,
                weight_g: req.weight_g,
                waste_of_metaldetect_g: req.waste_of_metaldetect_g,
                machine_id: stage_machine_id.cloned(),
            },
        )?;

        self.completion.sync(order_id)?;
        Ok(updated)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 订单的全部生产单位（两族统一视图）
    pub fn list_units(&self, order_id: i64) -> ApiResult<Vec<ProductionUnit>> {
        let order = self.load_order(order_id)?;
        self.completion.sync(order_id)?;

        let units = if order.product.is_roll_based() {
            self.unit_repo
                .list_rolls(order_id)?
                .into_iter()
                .map(ProductionUnit::Roll)
                .collect()
        } else {
            self.unit_repo
                .list_hanger_batches(order_id)?
                .into_iter()
                .map(ProductionUnit::HangerBatch)
                .collect()
        };
        Ok(units)
    }

    /// 订单生产进度: 流程、目标/已完成/剩余克数、损耗拆解
    ///
    /// 查询前先跑一次完成判定, 保证读到的状态已收敛
    pub fn order_status(&self, order_id: i64) -> ApiResult<OrderProductionStatus> {
        self.load_order(order_id)?;
        self.completion.sync(order_id)?;

        // 完成判定可能刚改写了状态/剩余目标, 重新读取
        let order = self.load_order(order_id)?;
        let flow = flow::resolve(order.product, order.material_grade(), order.model.as_deref());

        let done_g = self.unit_repo.packaged_total(order.product, order_id)?;
        let target_g = order.target_with_waste_g();
        let completion_pct = if target_g > 0 {
            ((done_g as f64 / target_g as f64) * 10000.0).round() / 100.0
        } else {
            0.0
        };

        let by_stage: Vec<StageWaste> = self
            .unit_repo
            .waste_breakdown(order.product, order_id)?
            .into_iter()
            .map(|(stage, waste_g)| StageWaste { stage, waste_g })
            .collect();
        let current_total: i64 = by_stage.iter().map(|w| w.waste_g).sum();
        // 已完成订单以完成时点冻结的总损耗为准
        let total_waste_g = if order.is_completed() {
            order.total_waste_g.unwrap_or(current_total)
        } else {
            current_total
        };

        let stage_counts = if order.product.is_hanger_based() {
            Some(
                self.unit_repo
                    .hanger_stage_counts(order_id)?
                    .into_iter()
                    .map(|(stage, count)| StageCount { stage, count })
                    .collect(),
            )
        } else {
            None
        };

        Ok(OrderProductionStatus {
            order_id: order.id,
            status: order.status,
            product: order.product,
            model: order.model.clone(),
            raw_degree: order.raw_degree.clone(),
            flow: flow.to_vec(),
            target_g,
            done_g,
            remaining_g: order.remaining_target_g,
            completion_pct,
            waste: WasteBreakdown {
                by_stage,
                total_waste_g,
            },
            stage_counts,
        })
    }

    /// 订单当前绑定且使用中的机台, 可按服务工段过滤
    ///
    /// 指定的工段无需机台时返回空列表
    pub fn assigned_machines(
        &self,
        order_id: i64,
        stage: Option<Stage>,
    ) -> ApiResult<Vec<Machine>> {
        self.load_order(order_id)?;

        let machines = match stage {
            Some(stage) => match stage.required_machine_type() {
                Some(machine_type) => self
                    .machine_repo
                    .list_bound_to_order(order_id, Some(machine_type))?,
                None => Vec::new(),
            },
            None => self.machine_repo.list_bound_to_order(order_id, None)?,
        };
        Ok(machines)
    }

    /// 订单的工段流程, 逐段标注机台需求
    pub fn order_flow(&self, order_id: i64) -> ApiResult<Vec<FlowStageInfo>> {
        let order = self.load_order(order_id)?;
        let flow = flow::resolve(order.product, order.material_grade(), order.model.as_deref());
        Ok(flow
            .iter()
            .map(|&stage| {
                let machine_type = stage.required_machine_type();
                FlowStageInfo {
                    stage,
                    requires_machine: machine_type.is_some(),
                    machine_type,
                }
            })
            .collect())
    }

    /// 对所有已完成订单做一次机台占用清扫（维护操作）
    pub fn release_all_completed(&self) -> ApiResult<ReleaseSweep> {
        Ok(self.completion.release_all_completed()?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load_order(&self, order_id: i64) -> ApiResult<JobOrder> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={order_id})不存在")))
    }

    /// 工段推进裁决: 不变（原地更新）恒合法; 变更必须是流程中的直接后继
    fn check_transition(
        &self,
        flow: &[Stage],
        current: Stage,
        requested: Option<Stage>,
    ) -> ApiResult<Stage> {
        let new_stage = requested.unwrap_or(current);
        if new_stage == current {
            return Ok(new_stage);
        }

        let cur_idx = flow::stage_index_of(flow, current).ok_or_else(|| {
            // 存量数据的工段不在该订单流程内, 属于数据异常
            ApiError::InternalError(format!("流程不一致: 当前工段 {current} 不在订单流程内"))
        })?;

        match flow::stage_index_of(flow, new_stage) {
            Some(new_idx) if new_idx == cur_idx + 1 => Ok(new_stage),
            _ => Err(ApiError::InvalidTransition {
                from: current,
                to: new_stage,
            }),
        }
    }
}

// ==========================================
// 输入校验
// ==========================================

fn ensure_positive(field: &str, value: i64) -> ApiResult<()> {
    if value < 1 {
        return Err(ApiError::ValidationError(format!(
            "{field} 必须为正数, 实际为 {value}"
        )));
    }
    Ok(())
}

fn ensure_non_negative(field: &str, value: Option<i64>) -> ApiResult<()> {
    if let Some(v) = value {
        if v < 0 {
            return Err(ApiError::ValidationError(format!(
                "{field} 不能为负数, 实际为 {v}"
            )));
        }
    }
    Ok(())
}

fn ensure_roll_family(order: &JobOrder) -> ApiResult<()> {
    if !order.product.is_roll_based() {
        return Err(ApiError::InvalidInput(format!(
            "生产卷追踪仅适用于服装袋(AB)/塑料卷(PR)订单, 订单 {} 为 {}",
            order.id, order.product
        )));
    }
    Ok(())
}

fn ensure_hanger_family(order: &JobOrder) -> ApiResult<()> {
    if !order.product.is_hanger_based() {
        return Err(ApiError::InvalidInput(format!(
            "注塑批次追踪仅适用于塑料衣架(PH)订单, 订单 {} 为 {}",
            order.id, order.product
        )));
    }
    Ok(())
}
