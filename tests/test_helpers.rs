// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、订单/机台种子数据
// 说明: schema 由各仓储的 ensure_table 自动建立
// ==========================================

use chrono::Utc;
use plastic_tracking::app::AppState;
use plastic_tracking::domain::machine::Machine;
use plastic_tracking::domain::order::JobOrder;
use plastic_tracking::domain::types::{MachineType, OrderStatus, ProductFamily};
use tempfile::NamedTempFile;

/// 创建临时数据库并组装 AppState
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - AppState: 完整组装的应用状态
pub fn setup() -> (NamedTempFile, AppState) {
    let temp_file = NamedTempFile::new().expect("创建临时数据库文件失败");
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let state = AppState::new(db_path).expect("初始化AppState失败");
    (temp_file, state)
}

/// 插入一张在产订单
///
/// remaining_target_g 按含损耗目标(kg -> g)初始化, 与下单流程口径一致
pub fn insert_order(
    state: &AppState,
    product: ProductFamily,
    model: Option<&str>,
    raw_degree: Option<&str>,
    target_no_waste_kg: f64,
    target_with_waste_kg: f64,
) -> JobOrder {
    let now = Utc::now();
    let order = JobOrder {
        id: 0, // 由数据库分配
        product,
        model: model.map(str::to_string),
        raw_degree: raw_degree.map(str::to_string),
        status: OrderStatus::InProgress,
        target_weight_no_waste: target_no_waste_kg,
        target_weight_with_waste: target_with_waste_kg,
        remaining_target_g: (target_with_waste_kg * 1000.0).round() as i64,
        total_waste_g: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    state.order_repo.insert(&order).expect("插入订单失败")
}

/// 登记一台机台并绑定到订单（订单激活流程的种子版）
pub fn bind_machine(state: &AppState, machine_type: MachineType, order_id: i64) -> Machine {
    let machine = state
        .machine_repo
        .create("Line 1", machine_type)
        .expect("登记机台失败");
    state
        .machine_repo
        .bind_to_order(&machine.machine_id, order_id)
        .expect("绑定机台失败");
    state
        .machine_repo
        .find_by_machine_id(&machine.machine_id)
        .expect("查询机台失败")
        .expect("机台不存在")
}

/// 登记一台空闲机台（不绑定任何订单）
pub fn available_machine(state: &AppState, machine_type: MachineType) -> Machine {
    state
        .machine_repo
        .create("Line 2", machine_type)
        .expect("登记机台失败")
}

/// 直接改写机台状态（模拟操作工把机台置为维护/故障）
pub fn set_machine_status(state: &AppState, machine_id: &str, status: &str) {
    let conn =
        plastic_tracking::db::open_sqlite_connection(&state.db_path).expect("打开数据库失败");
    conn.execute(
        "UPDATE machines SET status = ?1 WHERE machine_id = ?2",
        rusqlite::params![status, machine_id],
    )
    .expect("改写机台状态失败");
}

/// 读取订单最新快照
pub fn reload_order(state: &AppState, order_id: i64) -> JobOrder {
    state
        .order_repo
        .find_by_id(order_id)
        .expect("查询订单失败")
        .expect("订单不存在")
}
