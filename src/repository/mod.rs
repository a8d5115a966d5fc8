// ==========================================
// 塑料生产追踪系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 红线: Repository 不做工段合法性裁决（顺序/机台校验在引擎与 API 层）
// ==========================================

pub mod error;
pub mod history_repo;
pub mod machine_repo;
pub mod order_repo;
pub mod unit_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use history_repo::{
    ProductionHistoryEntry, ProductionHistoryRecord, ProductionHistoryRepository,
};
pub use machine_repo::MachineRepository;
pub use order_repo::JobOrderRepository;
pub use unit_repo::{
    HangerChanges, HangerCreateData, ProductionUnitRepository, RollChanges, RollCreateData,
};

use crate::domain::types::EnumParseError;
use std::str::FromStr;

/// 把领域枚举列的解析失败折算成 rusqlite 的列转换错误
///
/// 各仓储的行映射统一使用, 保证非法存储值不会被静默吞掉
pub(crate) fn parse_enum_col<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = EnumParseError>,
{
    value.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
