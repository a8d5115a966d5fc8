// ==========================================
// 塑料生产追踪系统 - API 层
// ==========================================
// 职责: 提供业务操作面, 供外层请求处理调用
// 说明: 每个入站操作独立执行, 所有落库效果在单事务内原子提交
// ==========================================

pub mod error;
pub mod tracking_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use tracking_api::{
    FlowStageInfo, HangerCreateRequest, HangerUpdateRequest, OrderProductionStatus,
    RollCreateRequest, RollUpdateRequest, StageCount, StageWaste, TrackingApi, WasteBreakdown,
};
