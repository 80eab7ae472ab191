use serde::{Deserialize, Serialize};

/// 部署重试策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployRetryConfig {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 基础退避间隔（毫秒）
    pub base_delay_ms: u64,
    /// 最大退避间隔（毫秒）
    pub max_delay_ms: u64,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
    /// 退避间隔的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
}

impl Default for DeployRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 200,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl DeployRetryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!("基础退避间隔不能大于最大退避间隔"));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!("退避倍数不能小于1"));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!("抖动范围必须在0.0到1.0之间"));
        }

        Ok(())
    }
}

/// master 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// master 副本名称，用于存活节点
    pub name: String,
    pub deploy_retry: DeployRetryConfig,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            name: default_master_name(),
            deploy_retry: DeployRetryConfig::default(),
        }
    }
}

/// 默认使用本机主机名
pub fn default_master_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "master".to_string())
}

impl MasterConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            return Err(anyhow::anyhow!("master名称不能为空"));
        }

        if self.name.contains('/') {
            return Err(anyhow::anyhow!("master名称不能包含'/': {}", self.name));
        }

        self.deploy_retry.validate()
    }
}
