// ==========================================
// 塑料生产追踪系统 - 机台仓储
// ==========================================
// 职责: 管理 machines 表的数据访问（机台登记适配层）
// 红线: 本核心对机台的写入只有一种方向: 释放
//       (status -> available, 清空绑定), 绑定由订单激活流程写入
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::machine::Machine;
use crate::domain::types::MachineType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_enum_col;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct MachineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineRepository {
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
            CREATE TABLE IF NOT EXISTS machines (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              machine_id TEXT NOT NULL UNIQUE,
              production_line TEXT NOT NULL,
              machine_type TEXT NOT NULL,
              status TEXT NOT NULL DEFAULT 'available',
              current_job_order INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_machines_current_order
              ON machines(current_job_order);
            CREATE INDEX IF NOT EXISTS idx_machines_type
              ON machines(machine_type);
            "#,
        )?;
        Ok(())
    }

    /// 登记新机台（机台编号按类型前缀自动生成: BF-001, IM-002, ...）
    pub fn create(
        &self,
        production_line: &str,
        machine_type: MachineType,
    ) -> RepositoryResult<Machine> {
        let conn = self.get_conn()?;
        let machine_id = Self::generate_machine_id(&conn, machine_type)?;
        conn.execute(
            r#"
            INSERT INTO machines (machine_id, production_line, machine_type, status)
            VALUES (?1, ?2, ?3, 'available')
            "#,
            params![machine_id, production_line, machine_type.to_string()],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.find_by_row_id(id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Machine".to_string(),
                id: id.to_string(),
            })
    }

    /// 生成下一个机台编号: <前缀>-NNN
    fn generate_machine_id(
        conn: &Connection,
        machine_type: MachineType,
    ) -> RepositoryResult<String> {
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM machines WHERE machine_type = ?1",
            params![machine_type.to_string()],
            |row| row.get(0),
        )?;
        Ok(format!("{}-{:03}", machine_type.id_prefix(), existing + 1))
    }

    /// 绑定机台到订单（订单激活流程的接口边界, 测试与种子数据使用）
    ///
    /// 核心的生产记录路径绝不调用此方法
    pub fn bind_to_order(&self, machine_id: &str, order_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE machines SET status = 'in_use', current_job_order = ?1 WHERE machine_id = ?2",
            params![order_id, machine_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Machine".to_string(),
                id: machine_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按机台编号查找
    pub fn find_by_machine_id(&self, machine_id: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        let machine = conn
            .query_row(
                &format!("{} WHERE machine_id = ?1", Self::SELECT_BASE),
                params![machine_id],
                Self::map_row,
            )
            .optional()?;
        Ok(machine)
    }

    fn find_by_row_id(&self, id: i64) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        let machine = conn
            .query_row(
                &format!("{} WHERE id = ?1", Self::SELECT_BASE),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(machine)
    }

    /// 查询绑定到订单且使用中的机台, 可按类型过滤
    ///
    /// 用于"该订单当前可在某工段作业的机台"查询
    pub fn list_bound_to_order(
        &self,
        order_id: i64,
        machine_type: Option<MachineType>,
    ) -> RepositoryResult<Vec<Machine>> {
        let conn = self.get_conn()?;
        let base = format!(
            "{} WHERE current_job_order = ?1 AND status = 'in_use'",
            Self::SELECT_BASE
        );

        let mut machines = Vec::new();
        match machine_type {
            Some(mt) => {
                let sql = format!("{base} AND machine_type = ?2 ORDER BY machine_id");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![order_id, mt.to_string()], Self::map_row)?;
                for row in rows {
                    machines.push(row?);
                }
            }
            None => {
                let sql = format!("{base} ORDER BY machine_type, machine_id");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![order_id], Self::map_row)?;
                for row in rows {
                    machines.push(row?);
                }
            }
        }
        Ok(machines)
    }

    /// 强制释放订单绑定的全部机台
    ///
    /// 无条件执行（不看机台当前状态）, 保证订单完成后绝不占用机台;
    /// 返回释放数量
    pub fn release_for_order(&self, order_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Ok(Self::release_for_order_with_conn(&conn, order_id)?)
    }

    /// 强制释放（事务内版本, 供 CompletionSynchronizer 在完成事务中调用）
    pub fn release_for_order_with_conn(
        conn: &Connection,
        order_id: i64,
    ) -> rusqlite::Result<usize> {
        // 先取快照用于日志
        let mut stmt =
            conn.prepare("SELECT machine_id FROM machines WHERE current_job_order = ?1")?;
        let bound: Vec<String> = stmt
            .query_map(params![order_id], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        if bound.is_empty() {
            return Ok(0);
        }

        conn.execute(
            r#"
            UPDATE machines
            SET status = 'available',
                current_job_order = NULL
            WHERE current_job_order = ?1
            "#,
            params![order_id],
        )?;

        tracing::info!("强制释放: 订单 {} 释放机台 [{}]", order_id, bound.join(", "));
        Ok(bound.len())
    }

    const SELECT_BASE: &'static str = r#"
        SELECT id, machine_id, production_line, machine_type, status, current_job_order
        FROM machines
    "#;

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Machine> {
        Ok(Machine {
            id: row.get(0)?,
            machine_id: row.get(1)?,
            production_line: row.get(2)?,
            machine_type: parse_enum_col(3, row.get::<_, String>(3)?)?,
            status: parse_enum_col(4, row.get::<_, String>(4)?)?,
            current_job_order: row.get(5)?,
        })
    }
}
