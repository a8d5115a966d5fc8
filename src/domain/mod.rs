// ==========================================
// 塑料生产追踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod machine;
pub mod order;
pub mod types;
pub mod unit;

// 重导出核心类型
pub use machine::Machine;
pub use order::JobOrder;
pub use types::{
    EnumParseError, MachineStatus, MachineType, MaterialGrade, OrderStatus, ProductFamily, Stage,
};
pub use unit::{HangerBatch, ProductionUnit, Roll};
