// ==========================================
// 塑料生产追踪系统 - 机台生产履历仓储
// ==========================================
// 职责: 管理 machine_production_history 表 (报表侧消费)
// 口径: 按 (machine_id, order_id, unit_index, stage) 做 Upsert,
//       重复记录覆盖重量/损耗并刷新时间戳
// 说明: 履历写入与工段主写入在同一事务中提交
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::Stage;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_enum_col;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// 履历记录
#[derive(Debug, Clone)]
pub struct ProductionHistoryEntry {
    pub machine_id: String,
    pub order_id: i64,
    pub unit_index: i64, // 生产单位在订单内的序号
    pub stage: Stage,
    pub production_weight_g: i64,
    pub waste_weight_g: Option<i64>,
}

/// 履历行（含记录时间, 查询返回用）
#[derive(Debug, Clone)]
pub struct ProductionHistoryRecord {
    pub machine_id: String,
    pub order_id: i64,
    pub unit_index: i64,
    pub stage: Stage,
    pub production_weight_g: i64,
    pub waste_weight_g: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

pub struct ProductionHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionHistoryRepository {
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
            CREATE TABLE IF NOT EXISTS machine_production_history (
              machine_id TEXT NOT NULL,
              order_id INTEGER NOT NULL,
              unit_index INTEGER NOT NULL,
              stage TEXT NOT NULL,
              production_weight_g INTEGER NOT NULL,
              waste_weight_g INTEGER,
              recorded_at TEXT NOT NULL,
              PRIMARY KEY (machine_id, order_id, unit_index, stage)
            );

            CREATE INDEX IF NOT EXISTS idx_history_order
              ON machine_production_history(order_id);
            "#,
        )?;
        Ok(())
    }

    /// 写入履历（Upsert）
    pub fn record(&self, entry: &ProductionHistoryEntry) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Ok(Self::record_with_conn(&conn, entry)?)
    }

    /// 写入履历（事务内版本, 供工段写入事务复用）
    pub fn record_with_conn(
        conn: &Connection,
        entry: &ProductionHistoryEntry,
    ) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO machine_production_history
              (machine_id, order_id, unit_index, stage, production_weight_g, waste_weight_g, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (machine_id, order_id, unit_index, stage)
            DO UPDATE SET
                production_weight_g = excluded.production_weight_g,
                waste_weight_g = excluded.waste_weight_g,
                recorded_at = excluded.recorded_at
            "#,
            params![
                entry.machine_id,
                entry.order_id,
                entry.unit_index,
                entry.stage.to_string(),
                entry.production_weight_g,
                entry.waste_weight_g,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 查询订单的全部履历（测试与排查用, 报表侧自有查询通道）
    pub fn list_for_order(
        &self,
        order_id: i64,
    ) -> RepositoryResult<Vec<ProductionHistoryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT machine_id, order_id, unit_index, stage,
                   production_weight_g, waste_weight_g, recorded_at
            FROM machine_production_history
            WHERE order_id = ?1
            ORDER BY unit_index, stage
            "#,
        )?;
        let rows = stmt.query_map(params![order_id], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductionHistoryRecord> {
        Ok(ProductionHistoryRecord {
            machine_id: row.get(0)?,
            order_id: row.get(1)?,
            unit_index: row.get(2)?,
            stage: parse_enum_col(3, row.get::<_, String>(3)?)?,
            production_weight_g: row.get(4)?,
            waste_weight_g: row.get(5)?,
            recorded_at: row.get(6)?,
        })
    }
}
