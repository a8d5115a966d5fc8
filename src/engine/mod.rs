// ==========================================
// 塑料生产追踪系统 - 引擎层
// ==========================================
// 职责: 实现业务规则（流程解析、机台闸口、完成判定）
// 红线: 流程解析器是纯函数; 机台闸口只读;
//       完成同步器是订单状态与机台绑定的唯一写入方
// ==========================================

pub mod completion;
pub mod flow;
pub mod machine_gate;

// 重导出核心引擎
pub use completion::{CompletionSynchronizer, ReleaseSweep};
pub use machine_gate::MachineGate;
