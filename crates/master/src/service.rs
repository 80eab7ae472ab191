use std::sync::Arc;

use fleet_core::config::MasterConfig;
use fleet_core::paths;
use fleet_core::traits::{CoordinationStore, CreateMode, StoreError};
use fleet_core::{FleetError, FleetResult};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::coordinated::CoordinatedMasterModel;
use crate::retry::RetryPolicy;

/// master 服务
///
/// 负责启动时创建根目录并登记本副本的临时存活节点，停止时释放会话。
/// 协调存储句柄由调用方创建后注入，生命周期由本服务显式管理。
pub struct MasterService {
    name: String,
    store: Arc<dyn CoordinationStore>,
    model: Arc<CoordinatedMasterModel>,
    running: Arc<RwLock<bool>>,
}

impl MasterService {
    pub fn new(config: &MasterConfig, store: Arc<dyn CoordinationStore>) -> Self {
        let retry = RetryPolicy::new(config.deploy_retry.clone());
        Self {
            name: config.name.clone(),
            model: Arc::new(CoordinatedMasterModel::with_retry_policy(
                Arc::clone(&store),
                retry,
            )),
            store,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> Arc<CoordinatedMasterModel> {
        Arc::clone(&self.model)
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// 创建根目录并（重新）创建存活节点
    pub async fn start(&self) -> FleetResult<()> {
        let mut running = self.running.write().await;
        if *running {
            warn!("Master {} 已在运行", self.name);
            return Ok(());
        }

        for root in paths::roots() {
            self.store
                .ensure_path(root, false)
                .await
                .map_err(|e| FleetError::coordination(format!("创建根目录 {root} 失败"), e))?;
        }

        // 上次会话遗留的存活节点可能尚未过期，先删除再以临时节点重建
        let up_node = paths::status_master_up(&self.name);
        let wrap = |e: StoreError| FleetError::coordination(format!("登记master存活节点 {up_node} 失败"), e);
        self.store.ensure_path(&up_node, true).await.map_err(wrap)?;
        if self.store.stat(&up_node).await.map_err(wrap)?.is_some() {
            self.store.delete(&up_node).await.map_err(wrap)?;
        }
        self.store
            .create_with_mode(&up_node, Vec::new(), CreateMode::Ephemeral)
            .await
            .map_err(wrap)?;

        *running = true;
        info!("Master {} 已启动", self.name);
        Ok(())
    }

    /// 关闭协调存储会话，存活节点随之消失
    pub async fn stop(&self) -> FleetResult<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Ok(());
        }

        self.store
            .close()
            .await
            .map_err(|e| FleetError::coordination("关闭协调存储会话失败", e))?;

        *running = false;
        info!("Master {} 已停止", self.name);
        Ok(())
    }
}
