// ==========================================
// 塑料生产追踪系统 - 订单仓储
// ==========================================
// 职责: 管理 job_orders 表的数据访问
// 红线: status/completed_at/total_waste_g 的完成写入
//       只发生在 CompletionSynchronizer 的事务里
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::order::JobOrder;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_enum_col;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct JobOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl JobOrderRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_orders (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              product TEXT NOT NULL,
              model TEXT,
              raw_degree TEXT,
              status TEXT NOT NULL DEFAULT 'pending',
              target_weight_no_waste REAL NOT NULL,
              target_weight_with_waste REAL NOT NULL,
              remaining_target_g INTEGER NOT NULL,
              total_waste_g INTEGER,
              completed_at TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_orders_status
              ON job_orders(status);
            "#,
        )?;
        Ok(())
    }

    /// 插入订单（下单流程的接口边界, 测试与种子数据使用）
    ///
    /// 忽略传入的 id, 返回带数据库分配 id 的订单
    pub fn insert(&self, order: &JobOrder) -> RepositoryResult<JobOrder> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO job_orders (
                product, model, raw_degree, status,
                target_weight_no_waste, target_weight_with_waste,
                remaining_target_g, total_waste_g, completed_at,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                order.product.to_string(),
                order.model,
                order.raw_degree,
                order.status.to_string(),
                order.target_weight_no_waste,
                order.target_weight_with_waste,
                order.remaining_target_g,
                order.total_waste_g,
                order.completed_at.map(|ts| ts.to_rfc3339()),
                now,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.find_by_id(id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "JobOrder".to_string(),
            id: id.to_string(),
        })
    }

    /// 按订单号查找
    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<Option<JobOrder>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with_conn(&conn, order_id)
    }

    /// 按订单号查找（事务内版本, 供引擎层在同一事务中复用）
    pub fn find_by_id_with_conn(
        conn: &Connection,
        order_id: i64,
    ) -> RepositoryResult<Option<JobOrder>> {
        let order = conn
            .query_row(
                &format!("{} WHERE id = ?1", Self::SELECT_BASE),
                params![order_id],
                Self::map_row,
            )
            .optional()?;
        Ok(order)
    }

    /// 按状态列出订单（维护工具/清扫用）
    pub fn list_by_status(&self, status: crate::domain::types::OrderStatus) -> RepositoryResult<Vec<JobOrder>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare(&format!("{} WHERE status = ?1 ORDER BY id", Self::SELECT_BASE))?;
        let rows = stmt.query_map(params![status.to_string()], Self::map_row)?;
        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?);
        }
        Ok(orders)
    }

    /// 同步剩余目标（完成判定未达阈值时的纠偏写入）
    pub fn update_remaining_target(
        &self,
        order_id: i64,
        remaining_target_g: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE job_orders SET remaining_target_g = ?1, updated_at = ?2 WHERE id = ?3",
            params![remaining_target_g, Utc::now().to_rfc3339(), order_id],
        )?;
        Ok(())
    }

    const SELECT_BASE: &'static str = r#"
        SELECT id, product, model, raw_degree, status,
               target_weight_no_waste, target_weight_with_waste,
               remaining_target_g, total_waste_g, completed_at,
               created_at, updated_at
        FROM job_orders
    "#;

    fn map_row(row: &Row<'_>) -> rusqlite::Result<JobOrder> {
        Ok(JobOrder {
            id: row.get(0)?,
            product: parse_enum_col(1, row.get::<_, String>(1)?)?,
            model: row.get(2)?,
            raw_degree: row.get(3)?,
            status: parse_enum_col(4, row.get::<_, String>(4)?)?,
            target_weight_no_waste: row.get(5)?,
            target_weight_with_waste: row.get(6)?,
            remaining_target_g: row.get(7)?,
            total_waste_g: row.get(8)?,
            completed_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}
