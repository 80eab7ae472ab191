use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_core::config::AppConfig;
use fleet_core::traits::CoordinationStore;
use fleet_infrastructure::InMemoryCoordinationStore;
use fleet_master::{CoordinatedMasterModel, MasterService};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 嵌入式应用：进程内协调存储 + master 服务
pub struct Application {
    config: AppConfig,
    store: Arc<InMemoryCoordinationStore>,
    service: MasterService,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        info!(
            "初始化应用程序，master: {}，协调存储: {}",
            config.master.name, config.coordination.backend
        );

        let store = match config.coordination.backend.as_str() {
            "memory" => Arc::new(InMemoryCoordinationStore::new()),
            other => {
                return Err(anyhow::anyhow!("不支持的协调存储后端: {other}"));
            }
        };

        // master 使用独立会话，关闭时只释放自己的临时节点
        let session: Arc<dyn CoordinationStore> = Arc::new(store.session());
        let service = MasterService::new(&config.master, session);

        Ok(Self {
            config,
            store,
            service,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 进程内协调存储的根会话
    pub fn store(&self) -> Arc<InMemoryCoordinationStore> {
        Arc::clone(&self.store)
    }

    pub fn model(&self) -> Arc<CoordinatedMasterModel> {
        self.service.model()
    }

    /// 启动 master，阻塞直到收到关闭信号后停止
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.service.start().await.context("启动master服务失败")?;
        info!("Master {} 正在运行", self.service.name());

        if let Err(e) = shutdown_rx.recv().await {
            warn!("关闭信号通道异常: {e}");
        }

        info!("停止master服务");
        self.service.stop().await.context("停止master服务失败")?;
        Ok(())
    }
}
