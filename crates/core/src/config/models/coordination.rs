use serde::{Deserialize, Serialize};

/// 协调存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// 存储后端，目前内置 "memory"
    pub backend: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
        }
    }
}

impl CoordinationConfig {
    pub const SUPPORTED_BACKENDS: [&'static str; 1] = ["memory"];

    pub fn validate(&self) -> anyhow::Result<()> {
        if !Self::SUPPORTED_BACKENDS.contains(&self.backend.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的协调存储后端: {}，支持的后端: {:?}",
                self.backend,
                Self::SUPPORTED_BACKENDS
            ));
        }

        Ok(())
    }
}
