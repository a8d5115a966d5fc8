// ==========================================
// 塑料生产追踪系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 生产工段推进与机台绑定的事实层
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    MachineStatus, MachineType, MaterialGrade, OrderStatus, ProductFamily, Stage,
};

// 领域实体
pub use domain::{HangerBatch, JobOrder, Machine, ProductionUnit, Roll};

// 引擎
pub use engine::{CompletionSynchronizer, MachineGate, ReleaseSweep};

// API
pub use api::{ApiError, ApiResult, OrderProductionStatus, TrackingApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "塑料制品生产追踪系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
