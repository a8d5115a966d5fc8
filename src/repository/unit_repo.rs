// ==========================================
// 塑料生产追踪系统 - 生产单位仓储
// ==========================================
// 职责: 管理 production_rolls / production_hangers 两张表,
//       以及工段写入事务内的关联写入:
//       - 包装重量差额扣减 job_orders.remaining_target_g (下限 0)
//       - 机台生产履历 Upsert
// 红线: 一次工段写入的全部落库效果在同一事务中提交,
//       任何失败整体回滚, 不留半截状态
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::{ProductFamily, Stage};
use crate::domain::unit::{HangerBatch, Roll};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::history_repo::{ProductionHistoryEntry, ProductionHistoryRepository};
use crate::repository::parse_enum_col;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// 写入描述
// ==========================================
// 工段合法性(顺序推进/机台校验)由 API 层先行裁决,
// 仓储只负责把裁决结果原子落库

/// 创建生产卷（流程首工段固定为吹膜）
#[derive(Debug, Clone)]
pub struct RollCreateData {
    pub weight_g: i64,
    pub waste_of_blowing_g: Option<i64>,
    pub blowing_machine_id: String,
}

/// 生产卷的一次工段写入
#[derive(Debug, Clone, Default)]
pub struct RollChanges {
    /// 本次写入列所针对的工段（推进后的新工段, 或原地更新时的当前工段）
    pub target_stage: Option<Stage>,
    /// 是否推进 stage 列
    pub set_stage: bool,
    pub weight_g: Option<i64>,
    // 损耗列与工段无关, 任一次更新都可补录
    pub waste_of_blowing_g: Option<i64>,
    pub waste_of_printing_g: Option<i64>,
    pub waste_of_cutting_g: Option<i64>,
    pub waste_of_metal_detect_g: Option<i64>,
    /// 目标工段的机台绑定（已通过机台校验）
    pub machine_id: Option<String>,
}

/// 创建注塑批次（流程首工段固定为注塑）
#[derive(Debug, Clone)]
pub struct HangerCreateData {
    pub weight_g: i64,
    pub waste_of_im_g: Option<i64>,
    pub injection_machine_id: String,
    pub model: Option<String>,
}

/// 注塑批次的一次工段写入
#[derive(Debug, Clone, Default)]
pub struct HangerChanges {
    pub target_stage: Option<Stage>,
    pub set_stage: bool,
    pub weight_g: Option<i64>,
    /// 金属探测损耗（探测工段或包装称量时补录）
    pub waste_of_metaldetect_g: Option<i64>,
    pub machine_id: Option<String>,
}

pub struct ProductionUnitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionUnitRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_tables()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_tables()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS production_rolls (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              order_id INTEGER NOT NULL,
              tmp_index INTEGER NOT NULL,
              stage TEXT NOT NULL,
              roll_weight_g INTEGER,
              roll_weight_ts TEXT,
              printed_weight_g INTEGER,
              printed_weight_ts TEXT,
              cut_weight_g INTEGER,
              cut_weight_ts TEXT,
              packaged_weight_g INTEGER,
              packaged_weight_ts TEXT,
              metal_detect_ts TEXT,
              waste_of_blowing_g INTEGER,
              waste_of_blowing_ts TEXT,
              waste_of_printing_g INTEGER,
              waste_of_printing_ts TEXT,
              waste_of_cutting_g INTEGER,
              waste_of_cutting_ts TEXT,
              waste_of_metal_detect_g INTEGER,
              waste_of_metal_detect_ts TEXT,
              blowing_machine_id TEXT,
              printing_machine_id TEXT,
              cutting_machine_id TEXT,
              metal_detect_machine_id TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              UNIQUE (order_id, tmp_index)
            );

            CREATE INDEX IF NOT EXISTS idx_production_rolls_order
              ON production_rolls(order_id);

            CREATE TABLE IF NOT EXISTS production_hangers (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              order_id INTEGER NOT NULL,
              batch_index INTEGER NOT NULL,
              stage TEXT NOT NULL,
              model TEXT,
              injection_weight_g INTEGER,
              injection_weight_ts TEXT,
              packaged_weight_g INTEGER,
              packaged_weight_ts TEXT,
              waste_of_im_g INTEGER,
              waste_of_im_ts TEXT,
              waste_of_metaldetect_g INTEGER,
              waste_of_metaldetect_ts TEXT,
              injection_machine_id TEXT,
              metal_detect_machine_id TEXT,
              metal_detect_ts TEXT,
              sizing_ts TEXT,
              plastic_clips_ts TEXT,
              metal_clips_ts TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              UNIQUE (order_id, batch_index)
            );

            CREATE INDEX IF NOT EXISTS idx_production_hangers_order
              ON production_hangers(order_id);
            "#,
        )?;
        Ok(())
    }

    // ==========================================
    // 卷材族 (production_rolls)
    // ==========================================

    /// 创建生产卷: 分配订单内下一个序号, 落库吹膜重量/机台/可选损耗,
    /// 并在同一事务写入机台生产履历
    pub fn create_roll(&self, order_id: i64, data: &RollCreateData) -> RepositoryResult<Roll> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let next_index: i64 = tx.query_row(
            "SELECT COALESCE(MAX(tmp_index), 0) + 1 FROM production_rolls WHERE order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )?;

        tx.execute(
            r#"
            INSERT INTO production_rolls
              (order_id, tmp_index, stage,
               roll_weight_g, roll_weight_ts, blowing_machine_id,
               waste_of_blowing_g, waste_of_blowing_ts,
               created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                order_id,
                next_index,
                Stage::Blowing.to_string(),
                data.weight_g,
                now,
                data.blowing_machine_id,
                data.waste_of_blowing_g,
                data.waste_of_blowing_g.map(|_| now.clone()),
                now,
                now,
            ],
        )?;
        let roll_id = tx.last_insert_rowid();

        ProductionHistoryRepository::record_with_conn(
            &tx,
            &ProductionHistoryEntry {
                machine_id: data.blowing_machine_id.clone(),
                order_id,
                unit_index: next_index,
                stage: Stage::Blowing,
                production_weight_g: data.weight_g,
                waste_weight_g: data.waste_of_blowing_g,
            },
        )?;

        let roll = Self::find_roll_in(&tx, order_id, roll_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Roll".to_string(),
                id: roll_id.to_string(),
            }
        })?;
        tx.commit()?;

        tracing::info!("订单 {} 新建生产卷 #{} (id={})", order_id, next_index, roll_id);
        Ok(roll)
    }

    /// 一次工段写入: 动态拼 SET 列, 包装重量差额同步扣减订单剩余目标,
    /// 履历在重量与机台同时给出时记录, 全部在同一事务
    pub fn update_roll(
        &self,
        order_id: i64,
        roll_id: i64,
        changes: &RollChanges,
    ) -> RepositoryResult<Roll> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let current = Self::find_roll_in(&tx, order_id, roll_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Roll".to_string(),
                id: roll_id.to_string(),
            }
        })?;

        let target_stage = changes.target_stage.unwrap_or(current.stage);
        let now = Utc::now().to_rfc3339();
        let mut sets: Vec<String> = Vec::new();
        let mut vals: Vec<Value> = Vec::new();

        if changes.set_stage {
            sets.push("stage = ?".to_string());
            vals.push(Value::from(target_stage.to_string()));
        }

        // 目标工段的重量列（金属探测/包装外的工段各有一列, 金属探测只记时间戳）
        if let Some(weight) = changes.weight_g {
            let columns = match target_stage {
                Stage::Blowing => Some(("roll_weight_g", "roll_weight_ts")),
                Stage::Printing => Some(("printed_weight_g", "printed_weight_ts")),
                Stage::Cutting => Some(("cut_weight_g", "cut_weight_ts")),
                Stage::Packaging => Some(("packaged_weight_g", "packaged_weight_ts")),
                _ => None,
            };
            if let Some((weight_col, ts_col)) = columns {
                sets.push(format!("{weight_col} = ?"));
                vals.push(Value::from(weight));
                sets.push(format!("{ts_col} = ?"));
                vals.push(Value::from(now.clone()));
            }
        }

        if target_stage == Stage::MetalDetect {
            sets.push("metal_detect_ts = ?".to_string());
            vals.push(Value::from(now.clone()));
        }

        // 目标工段的机台列
        if let Some(machine_id) = &changes.machine_id {
            let machine_col = match target_stage {
                Stage::Blowing => Some("blowing_machine_id"),
                Stage::Printing => Some("printing_machine_id"),
                Stage::Cutting => Some("cutting_machine_id"),
                Stage::MetalDetect => Some("metal_detect_machine_id"),
                _ => None,
            };
            if let Some(col) = machine_col {
                sets.push(format!("{col} = ?"));
                vals.push(Value::from(machine_id.clone()));
            }
        }

        // 损耗列（与工段推进无关, 任一次更新可补录）
        let waste_columns = [
            (changes.waste_of_blowing_g, "waste_of_blowing_g", "waste_of_blowing_ts"),
            (changes.waste_of_printing_g, "waste_of_printing_g", "waste_of_printing_ts"),
            (changes.waste_of_cutting_g, "waste_of_cutting_g", "waste_of_cutting_ts"),
            (
                changes.waste_of_metal_detect_g,
                "waste_of_metal_detect_g",
                "waste_of_metal_detect_ts",
            ),
        ];
        for (value, col, ts_col) in waste_columns {
            if let Some(waste) = value {
                sets.push(format!("{col} = ?"));
                vals.push(Value::from(waste));
                sets.push(format!("{ts_col} = ?"));
                vals.push(Value::from(now.clone()));
            }
        }

        sets.push("updated_at = ?".to_string());
        vals.push(Value::from(now.clone()));

        let sql = format!(
            "UPDATE production_rolls SET {} WHERE id = ? AND order_id = ?",
            sets.join(", ")
        );
        vals.push(Value::from(roll_id));
        vals.push(Value::from(order_id));
        tx.execute(&sql, params_from_iter(vals))?;

        // 包装重量 -> 按差额扣减订单剩余目标, 下限 0
        if target_stage == Stage::Packaging {
            if let Some(weight) = changes.weight_g {
                let delta = weight - current.packaged_weight_g.unwrap_or(0);
                if delta != 0 {
                    tx.execute(
                        r#"
                        UPDATE job_orders
                        SET remaining_target_g = MAX(0, remaining_target_g - ?1),
                            updated_at = ?2
                        WHERE id = ?3
                        "#,
                        params![delta, now, order_id],
                    )?;
                }
            }
        }

        // 机台生产履历: 本次同时给出重量与机台时记录
        if let (Some(weight), Some(machine_id)) = (changes.weight_g, &changes.machine_id) {
            let waste_weight_g = match target_stage {
                Stage::Blowing => changes.waste_of_blowing_g,
                Stage::Printing => changes.waste_of_printing_g,
                Stage::Cutting => changes.waste_of_cutting_g,
                Stage::MetalDetect => changes.waste_of_metal_detect_g,
                _ => None,
            };
            ProductionHistoryRepository::record_with_conn(
                &tx,
                &ProductionHistoryEntry {
                    machine_id: machine_id.clone(),
                    order_id,
                    unit_index: current.tmp_index,
                    stage: target_stage,
                    production_weight_g: weight,
                    waste_weight_g,
                },
            )?;
        }

        let updated = Self::find_roll_in(&tx, order_id, roll_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Roll".to_string(),
                id: roll_id.to_string(),
            }
        })?;
        tx.commit()?;
        Ok(updated)
    }

    /// 按 (订单, 卷号) 查找
    pub fn find_roll(&self, order_id: i64, roll_id: i64) -> RepositoryResult<Option<Roll>> {
        let conn = self.get_conn()?;
        Self::find_roll_in(&conn, order_id, roll_id)
    }

    /// 订单的全部生产卷（按 id 升序）
    pub fn list_rolls(&self, order_id: i64) -> RepositoryResult<Vec<Roll>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE order_id = ?1 ORDER BY id",
            Self::SELECT_ROLL
        ))?;
        let rows = stmt.query_map(params![order_id], Self::map_roll_row)?;
        let mut rolls = Vec::new();
        for row in rows {
            rolls.push(row?);
        }
        Ok(rolls)
    }

    fn find_roll_in(
        conn: &Connection,
        order_id: i64,
        roll_id: i64,
    ) -> RepositoryResult<Option<Roll>> {
        let roll = conn
            .query_row(
                &format!("{} WHERE id = ?1 AND order_id = ?2", Self::SELECT_ROLL),
                params![roll_id, order_id],
                Self::map_roll_row,
            )
            .optional()?;
        Ok(roll)
    }

    // ==========================================
    // 衣架族 (production_hangers)
    // ==========================================

    /// 创建注塑批次（与 create_roll 同构, 另拷贝订单型号快照）
    pub fn create_hanger_batch(
        &self,
        order_id: i64,
        data: &HangerCreateData,
    ) -> RepositoryResult<HangerBatch> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let next_index: i64 = tx.query_row(
            "SELECT COALESCE(MAX(batch_index), 0) + 1 FROM production_hangers WHERE order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )?;

        tx.execute(
            r#"
            INSERT INTO production_hangers
              (order_id, batch_index, stage, model,
               injection_weight_g, injection_weight_ts, injection_machine_id,
               waste_of_im_g, waste_of_im_ts,
               created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                order_id,
                next_index,
                Stage::Injection.to_string(),
                data.model,
                data.weight_g,
                now,
                data.injection_machine_id,
                data.waste_of_im_g,
                data.waste_of_im_g.map(|_| now.clone()),
                now,
                now,
            ],
        )?;
        let batch_id = tx.last_insert_rowid();

        ProductionHistoryRepository::record_with_conn(
            &tx,
            &ProductionHistoryEntry {
                machine_id: data.injection_machine_id.clone(),
                order_id,
                unit_index: next_index,
                stage: Stage::Injection,
                production_weight_g: data.weight_g,
                waste_weight_g: data.waste_of_im_g,
            },
        )?;

        let batch = Self::find_hanger_in(&tx, order_id, batch_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "HangerBatch".to_string(),
                id: batch_id.to_string(),
            }
        })?;
        tx.commit()?;

        tracing::info!(
            "订单 {} 新建注塑批次 #{} (id={})",
            order_id,
            next_index,
            batch_id
        );
        Ok(batch)
    }

    /// 注塑批次的一次工段写入（语义同 update_roll）
    pub fn update_hanger_batch(
        &self,
        order_id: i64,
        batch_id: i64,
        changes: &HangerChanges,
    ) -> RepositoryResult<HangerBatch> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let current = Self::find_hanger_in(&tx, order_id, batch_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "HangerBatch".to_string(),
                id: batch_id.to_string(),
            }
        })?;

        let target_stage = changes.target_stage.unwrap_or(current.stage);
        let now = Utc::now().to_rfc3339();
        let mut sets: Vec<String> = Vec::new();
        let mut vals: Vec<Value> = Vec::new();

        if changes.set_stage {
            sets.push("stage = ?".to_string());
            vals.push(Value::from(target_stage.to_string()));
        }

        // 记录重量的工段只有注塑与包装
        if let Some(weight) = changes.weight_g {
            let columns = match target_stage {
                Stage::Injection => Some(("injection_weight_g", "injection_weight_ts")),
                Stage::Packaging => Some(("packaged_weight_g", "packaged_weight_ts")),
                _ => None,
            };
            if let Some((weight_col, ts_col)) = columns {
                sets.push(format!("{weight_col} = ?"));
                vals.push(Value::from(weight));
                sets.push(format!("{ts_col} = ?"));
                vals.push(Value::from(now.clone()));
            }
        }

        if let Some(machine_id) = &changes.machine_id {
            let machine_col = match target_stage {
                Stage::Injection => Some("injection_machine_id"),
                Stage::MetalDetect => Some("metal_detect_machine_id"),
                _ => None,
            };
            if let Some(col) = machine_col {
                sets.push(format!("{col} = ?"));
                vals.push(Value::from(machine_id.clone()));
            }
        }

        // 金属探测损耗: 探测工段或包装称量时补录
        if matches!(target_stage, Stage::MetalDetect | Stage::Packaging) {
            if let Some(waste) = changes.waste_of_metaldetect_g {
                sets.push("waste_of_metaldetect_g = ?".to_string());
                vals.push(Value::from(waste));
                sets.push("waste_of_metaldetect_ts = ?".to_string());
                vals.push(Value::from(now.clone()));
            }
        }

        // 只记时间戳的工段
        let stamp_col = match target_stage {
            Stage::MetalDetect => Some("metal_detect_ts"),
            Stage::Sizing => Some("sizing_ts"),
            Stage::PlasticClips => Some("plastic_clips_ts"),
            Stage::MetalClips => Some("metal_clips_ts"),
            _ => None,
        };
        if let Some(col) = stamp_col {
            sets.push(format!("{col} = ?"));
            vals.push(Value::from(now.clone()));
        }

        sets.push("updated_at = ?".to_string());
        vals.push(Value::from(now.clone()));

        let sql = format!(
            "UPDATE production_hangers SET {} WHERE id = ? AND order_id = ?",
            sets.join(", ")
        );
        vals.push(Value::from(batch_id));
        vals.push(Value::from(order_id));
        tx.execute(&sql, params_from_iter(vals))?;

        // 包装重量 -> 按差额扣减订单剩余目标, 下限 0
        if target_stage == Stage::Packaging {
            if let Some(weight) = changes.weight_g {
                let delta = weight - current.packaged_weight_g.unwrap_or(0);
                if delta != 0 {
                    tx.execute(
                        r#"
                        UPDATE job_orders
                        SET remaining_target_g = MAX(0, remaining_target_g - ?1),
                            updated_at = ?2
                        WHERE id = ?3
                        "#,
                        params![delta, now, order_id],
                    )?;
                }
            }
        }

        if let (Some(weight), Some(machine_id)) = (changes.weight_g, &changes.machine_id) {
            let waste_weight_g = if target_stage == Stage::Packaging {
                changes.waste_of_metaldetect_g
            } else {
                None
            };
            ProductionHistoryRepository::record_with_conn(
                &tx,
                &ProductionHistoryEntry {
                    machine_id: machine_id.clone(),
                    order_id,
                    unit_index: current.batch_index,
                    stage: target_stage,
                    production_weight_g: weight,
                    waste_weight_g,
                },
            )?;
        }

        let updated = Self::find_hanger_in(&tx, order_id, batch_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "HangerBatch".to_string(),
                id: batch_id.to_string(),
            }
        })?;
        tx.commit()?;
        Ok(updated)
    }

    /// 按 (订单, 批次号) 查找
    pub fn find_hanger_batch(
        &self,
        order_id: i64,
        batch_id: i64,
    ) -> RepositoryResult<Option<HangerBatch>> {
        let conn = self.get_conn()?;
        Self::find_hanger_in(&conn, order_id, batch_id)
    }

    /// 订单的全部注塑批次（按 id 升序）
    pub fn list_hanger_batches(&self, order_id: i64) -> RepositoryResult<Vec<HangerBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE order_id = ?1 ORDER BY id",
            Self::SELECT_HANGER
        ))?;
        let rows = stmt.query_map(params![order_id], Self::map_hanger_row)?;
        let mut batches = Vec::new();
        for row in rows {
            batches.push(row?);
        }
        Ok(batches)
    }

    /// 订单内各工段的批次数（衣架族状态页用）
    pub fn hanger_stage_counts(&self, order_id: i64) -> RepositoryResult<Vec<(Stage, i64)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT stage, COUNT(*)
            FROM production_hangers
            WHERE order_id = ?1
            GROUP BY stage
            "#,
        )?;
        let rows = stmt.query_map(params![order_id], |row| {
            let stage: Stage = parse_enum_col(0, row.get::<_, String>(0)?)?;
            Ok((stage, row.get::<_, i64>(1)?))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn find_hanger_in(
        conn: &Connection,
        order_id: i64,
        batch_id: i64,
    ) -> RepositoryResult<Option<HangerBatch>> {
        let batch = conn
            .query_row(
                &format!("{} WHERE id = ?1 AND order_id = ?2", Self::SELECT_HANGER),
                params![batch_id, order_id],
                Self::map_hanger_row,
            )
            .optional()?;
        Ok(batch)
    }

    // ==========================================
    // 聚合口径（完成判定与状态页共用, 事务内可复用）
    // ==========================================

    /// 订单已包装总重量（克）
    pub fn packaged_total(&self, family: ProductFamily, order_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(Self::packaged_total_with_conn(&conn, family, order_id)?)
    }

    /// 订单逐工段损耗合计（克）
    pub fn waste_breakdown(
        &self,
        family: ProductFamily,
        order_id: i64,
    ) -> RepositoryResult<Vec<(Stage, i64)>> {
        let conn = self.get_conn()?;
        Ok(Self::waste_breakdown_with_conn(&conn, family, order_id)?)
    }

    /// 订单已包装总重量 done_g（克, 事务内版本）
    pub fn packaged_total_with_conn(
        conn: &Connection,
        family: ProductFamily,
        order_id: i64,
    ) -> rusqlite::Result<i64> {
        let table = if family.is_roll_based() {
            "production_rolls"
        } else {
            "production_hangers"
        };
        conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(packaged_weight_g), 0) FROM {table}
                 WHERE order_id = ?1 AND packaged_weight_g IS NOT NULL"
            ),
            params![order_id],
            |row| row.get(0),
        )
    }

    /// 订单逐工段损耗合计（克）
    ///
    /// 卷材族: 吹膜/印刷/裁切/金属探测; 衣架族: 注塑/金属探测
    pub fn waste_breakdown_with_conn(
        conn: &Connection,
        family: ProductFamily,
        order_id: i64,
    ) -> rusqlite::Result<Vec<(Stage, i64)>> {
        if family.is_roll_based() {
            conn.query_row(
                r#"
                SELECT
                    COALESCE(SUM(waste_of_blowing_g), 0),
                    COALESCE(SUM(waste_of_printing_g), 0),
                    COALESCE(SUM(waste_of_cutting_g), 0),
                    COALESCE(SUM(waste_of_metal_detect_g), 0)
                FROM production_rolls
                WHERE order_id = ?1
                "#,
                params![order_id],
                |row| {
                    Ok(vec![
                        (Stage::Blowing, row.get(0)?),
                        (Stage::Printing, row.get(1)?),
                        (Stage::Cutting, row.get(2)?),
                        (Stage::MetalDetect, row.get(3)?),
                    ])
                },
            )
        } else {
            conn.query_row(
                r#"
                SELECT
                    COALESCE(SUM(waste_of_im_g), 0),
                    COALESCE(SUM(waste_of_metaldetect_g), 0)
                FROM production_hangers
                WHERE order_id = ?1
                "#,
                params![order_id],
                |row| {
                    Ok(vec![
                        (Stage::Injection, row.get(0)?),
                        (Stage::MetalDetect, row.get(1)?),
                    ])
                },
            )
        }
    }

    // ==========================================
    // 行映射
    // ==========================================

    const SELECT_ROLL: &'static str = r#"
        SELECT id, order_id, tmp_index, stage,
               roll_weight_g, roll_weight_ts,
               printed_weight_g, printed_weight_ts,
               cut_weight_g, cut_weight_ts,
               packaged_weight_g, packaged_weight_ts,
               metal_detect_ts,
               waste_of_blowing_g, waste_of_blowing_ts,
               waste_of_printing_g, waste_of_printing_ts,
               waste_of_cutting_g, waste_of_cutting_ts,
               waste_of_metal_detect_g, waste_of_metal_detect_ts,
               blowing_machine_id, printing_machine_id,
               cutting_machine_id, metal_detect_machine_id,
               created_at, updated_at
        FROM production_rolls
    "#;

    fn map_roll_row(row: &Row<'_>) -> rusqlite::Result<Roll> {
        Ok(Roll {
            id: row.get(0)?,
            order_id: row.get(1)?,
            tmp_index: row.get(2)?,
            stage: parse_enum_col(3, row.get::<_, String>(3)?)?,
            roll_weight_g: row.get(4)?,
            roll_weight_ts: row.get(5)?,
            printed_weight_g: row.get(6)?,
            printed_weight_ts: row.get(7)?,
            cut_weight_g: row.get(8)?,
            cut_weight_ts: row.get(9)?,
            packaged_weight_g: row.get(10)?,
            packaged_weight_ts: row.get(11)?,
            metal_detect_ts: row.get(12)?,
            waste_of_blowing_g: row.get(13)?,
            waste_of_blowing_ts: row.get(14)?,
            waste_of_printing_g: row.get(15)?,
            waste_of_printing_ts: row.get(16)?,
            waste_of_cutting_g: row.get(17)?,
            waste_of_cutting_ts: row.get(18)?,
            waste_of_metal_detect_g: row.get(19)?,
            waste_of_metal_detect_ts: row.get(20)?,
            blowing_machine_id: row.get(21)?,
            printing_machine_id: row.get(22)?,
            cutting_machine_id: row.get(23)?,
            metal_detect_machine_id: row.get(24)?,
            created_at: row.get(25)?,
            updated_at: row.get(26)?,
        })
    }

    const SELECT_HANGER: &'static str = r#"
        SELECT id, order_id, batch_index, stage, model,
               injection_weight_g, injection_weight_ts,
               packaged_weight_g, packaged_weight_ts,
               waste_of_im_g, waste_of_im_ts,
               waste_of_metaldetect_g, waste_of_metaldetect_ts,
               injection_machine_id, metal_detect_machine_id,
               metal_detect_ts, sizing_ts, plastic_clips_ts, metal_clips_ts,
               created_at, updated_at
        FROM production_hangers
    "#;

    fn map_hanger_row(row: &Row<'_>) -> rusqlite::Result<HangerBatch> {
        Ok(HangerBatch {
            id: row.get(0)?,
            order_id: row.get(1)?,
            batch_index: row.get(2)?,
            stage: parse_enum_col(3, row.get::<_, String>(3)?)?,
            model: row.get(4)?,
            injection_weight_g: row.get(5)?,
            injection_weight_ts: row.get(6)?,
            packaged_weight_g: row.get(7)?,
            packaged_weight_ts: row.get(8)?,
            waste_of_im_g: row.get(9)?,
            waste_of_im_ts: row.get(10)?,
            waste_of_metaldetect_g: row.get(11)?,
            waste_of_metaldetect_ts: row.get(12)?,
            injection_machine_id: row.get(13)?,
            metal_detect_machine_id: row.get(14)?,
            metal_detect_ts: row.get(15)?,
            sizing_ts: row.get(16)?,
            plastic_clips_ts: row.get(17)?,
            metal_clips_ts: row.get(18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    }
}
