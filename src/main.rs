// ==========================================
// 塑料生产追踪系统 - 主入口
// ==========================================
// 用途: 打开(或初始化)数据库, 对在产订单跑一轮完成判定,
//       并清扫已完成订单的机台占用
// ==========================================

use plastic_tracking::app::{get_default_db_path, AppState};
use plastic_tracking::domain::types::OrderStatus;

fn main() {
    // 初始化日志系统
    plastic_tracking::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", plastic_tracking::APP_NAME);
    tracing::info!("系统版本: {}", plastic_tracking::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 第一个命令行参数, 缺省走平台数据目录
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    // 已完成订单的机台占用清扫
    match app_state.tracking_api.release_all_completed() {
        Ok(sweep) => {
            tracing::info!(
                "清扫完成: 检查 {} 个已完成订单, 释放机台 {} 台",
                sweep.orders_checked,
                sweep.machines_released
            );
        }
        Err(e) => tracing::error!("机台清扫失败: {}", e),
    }

    // 对在产订单重算完成度
    let in_progress = match app_state.order_repo.list_by_status(OrderStatus::InProgress) {
        Ok(orders) => orders,
        Err(e) => {
            tracing::error!("读取在产订单失败: {}", e);
            std::process::exit(1);
        }
    };

    for order in &in_progress {
        match app_state.completion.sync(order.id) {
            Ok(true) => tracing::info!("订单 {} 已收敛为完成", order.id),
            Ok(false) => match app_state.tracking_api.order_status(order.id) {
                Ok(status) => tracing::info!(
                    "订单 {}: {} / {} g ({}%), 剩余 {} g",
                    order.id,
                    status.done_g,
                    status.target_g,
                    status.completion_pct,
                    status.remaining_g
                ),
                Err(e) => tracing::warn!("订单 {} 状态查询失败: {}", order.id, e),
            },
            Err(e) => tracing::warn!("订单 {} 完成判定失败: {}", order.id, e),
        }
    }

    tracing::info!("在产订单 {} 个, 处理完毕", in_progress.len());
}
