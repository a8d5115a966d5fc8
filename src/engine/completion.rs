// ==========================================
// 塑料生产追踪系统 - 完成判定与机台释放同步器
// ==========================================
// 职责: 重算订单进度; 达阈值时在一个事务内完成订单并强制释放机台
// 口径: target_g = 含损耗目标(克); 容差 = min(100, round(target_g * 1%))
// 红线: 订单 status/completed_at/total_waste_g 与机台绑定的清除
//       只允许由本组件写入
// 幂等: 每次读写后都可安全重复调用; 已完成订单每次都补查机台占用
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::machine_repo::MachineRepository;
use crate::repository::order_repo::JobOrderRepository;
use crate::repository::unit_repo::ProductionUnitRepository;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 完成订单的补救释放汇总（维护操作返回值）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSweep {
    pub orders_checked: usize,
    pub machines_released: usize,
    /// 实际发生释放的订单及台数
    pub released_by_order: Vec<(i64, usize)>,
}

pub struct CompletionSynchronizer {
    conn: Arc<Mutex<Connection>>,
}

impl CompletionSynchronizer {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 重算订单进度, 返回订单当前是否已完成
    ///
    /// - 已完成: 无条件补查并释放仍绑定的机台（防御上一次释放失败）
    /// - 达到阈值: 事务内冻结总损耗、置 completed、清零剩余目标、释放机台
    /// - 未达阈值: 剩余目标与存储值有偏差时纠偏落库
    pub fn sync(&self, order_id: i64) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;

        let Some(order) = JobOrderRepository::find_by_id_with_conn(&conn, order_id)? else {
            return Ok(false);
        };

        if order.is_completed() {
            let released = MachineRepository::release_for_order_with_conn(&conn, order_id)?;
            if released > 0 {
                tracing::warn!(
                    "已完成订单 {} 仍占用机台, 补救释放 {} 台",
                    order_id,
                    released
                );
            }
            return Ok(true);
        }

        let done_g =
            ProductionUnitRepository::packaged_total_with_conn(&conn, order.product, order_id)?;
        let target_g = order.target_with_waste_g();
        let remaining = (target_g - done_g).max(0);
        let tolerance = 100.min((target_g as f64 * 0.01).round() as i64);

        if remaining <= tolerance {
            let tx = conn.transaction()?;

            // 冻结总损耗: 完成时点各工段损耗之和
            let breakdown =
                ProductionUnitRepository::waste_breakdown_with_conn(&tx, order.product, order_id)?;
            let total_waste_g: i64 = breakdown.iter().map(|(_, waste)| waste).sum();

            let now = Utc::now().to_rfc3339();
            tx.execute(
                r#"
                UPDATE job_orders
                SET status = 'completed',
                    remaining_target_g = 0,
                    completed_at = ?1,
                    total_waste_g = ?2,
                    updated_at = ?1
                WHERE id = ?3
                "#,
                params![now, total_waste_g, order_id],
            )?;

            let released = MachineRepository::release_for_order_with_conn(&tx, order_id)?;
            tx.commit()?;

            tracing::info!(
                "订单 {} 完成: done={}g / target={}g (容差 {}g), 总损耗 {}g, 释放机台 {} 台",
                order_id,
                done_g,
                target_g,
                tolerance,
                total_waste_g,
                released
            );
            return Ok(true);
        }

        // 保持 remaining_target_g 与实际进度同步
        if remaining != order.remaining_target_g {
            conn.execute(
                "UPDATE job_orders SET remaining_target_g = ?1, updated_at = ?2 WHERE id = ?3",
                params![remaining, Utc::now().to_rfc3339(), order_id],
            )?;
            tracing::debug!(
                "订单 {} 剩余目标纠偏: {}g -> {}g",
                order_id,
                order.remaining_target_g,
                remaining
            );
        }
        Ok(false)
    }

    /// 对所有已完成订单做一次机台占用清扫（维护操作）
    ///
    /// 幂等, 对干净的库是空操作
    pub fn release_all_completed(&self) -> RepositoryResult<ReleaseSweep> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare("SELECT id FROM job_orders WHERE status = 'completed'")?;
        let order_ids: Vec<i64> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        let mut sweep = ReleaseSweep {
            orders_checked: order_ids.len(),
            machines_released: 0,
            released_by_order: Vec::new(),
        };
        for order_id in order_ids {
            let released = MachineRepository::release_for_order_with_conn(&conn, order_id)?;
            if released > 0 {
                sweep.machines_released += released;
                sweep.released_by_order.push((order_id, released));
            }
        }

        if sweep.machines_released > 0 {
            tracing::info!(
                "完成订单清扫: 检查 {} 单, 释放机台 {} 台",
                sweep.orders_checked,
                sweep.machines_released
            );
        }
        Ok(sweep)
    }
}
