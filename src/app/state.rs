// ==========================================
// 塑料生产追踪系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 Arc<Mutex<Connection>>,
//       互斥锁天然把每次操作的读-改-写串行化
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::TrackingApi;
use crate::db::open_sqlite_connection;
use crate::engine::{CompletionSynchronizer, MachineGate};
use crate::repository::{
    JobOrderRepository, MachineRepository, ProductionHistoryRepository, ProductionUnitRepository,
};

/// 应用状态
///
/// 包含API实例和共享仓储资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生产追踪API
    pub tracking_api: Arc<TrackingApi>,

    /// 完成判定与机台释放同步器
    pub completion: Arc<CompletionSynchronizer>,

    /// 订单仓储（下单/激活流程的接口边界）
    pub order_repo: Arc<JobOrderRepository>,

    /// 机台仓储（登记与绑定的接口边界）
    pub machine_repo: Arc<MachineRepository>,

    /// 生产单位仓储
    pub unit_repo: Arc<ProductionUnitRepository>,

    /// 机台生产履历仓储（报表侧消费）
    pub history_repo: Arc<ProductionHistoryRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// 初始化共享连接、全部仓储与引擎, 并组装 API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层（各自确保表存在）
        // ==========================================
        let order_repo = Arc::new(
            JobOrderRepository::from_connection(conn.clone())
                .map_err(|e| format!("初始化订单仓储失败: {}", e))?,
        );
        let machine_repo = Arc::new(
            MachineRepository::from_connection(conn.clone())
                .map_err(|e| format!("初始化机台仓储失败: {}", e))?,
        );
        let unit_repo = Arc::new(
            ProductionUnitRepository::from_connection(conn.clone())
                .map_err(|e| format!("初始化生产单位仓储失败: {}", e))?,
        );
        let history_repo = Arc::new(
            ProductionHistoryRepository::from_connection(conn.clone())
                .map_err(|e| format!("初始化生产履历仓储失败: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let machine_gate = Arc::new(MachineGate::new(machine_repo.clone()));
        let completion = Arc::new(CompletionSynchronizer::new(conn.clone()));

        // ==========================================
        // 组装API
        // ==========================================
        let tracking_api = Arc::new(TrackingApi::new(
            order_repo.clone(),
            unit_repo.clone(),
            machine_repo.clone(),
            machine_gate,
            completion.clone(),
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            tracking_api,
            completion,
            order_repo,
            machine_repo,
            unit_repo,
            history_repo,
        })
    }
}

/// 默认数据库路径（平台数据目录下）
pub fn get_default_db_path() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    let app_dir = base.join("plastic-tracking");
    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        tracing::warn!("创建数据目录失败({}), 回退到当前目录", e);
        return "plastic_tracking.db".to_string();
    }
    app_dir.join("plastic_tracking.db").to_string_lossy().to_string()
}
