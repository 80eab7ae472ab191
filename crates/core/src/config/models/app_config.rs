use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    coordination::CoordinationConfig,
    master::{default_master_name, MasterConfig},
    observability::ObservabilityConfig,
};

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub master: MasterConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: FLEET_)
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let retry = &defaults.master.deploy_retry;

        let mut builder = ConfigBuilder::builder()
            .set_default("coordination.backend", defaults.coordination.backend.clone())?
            .set_default("master.name", default_master_name())?
            .set_default("master.deploy_retry.max_attempts", retry.max_attempts)?
            .set_default("master.deploy_retry.base_delay_ms", retry.base_delay_ms)?
            .set_default("master.deploy_retry.max_delay_ms", retry.max_delay_ms)?
            .set_default(
                "master.deploy_retry.backoff_multiplier",
                retry.backoff_multiplier,
            )?
            .set_default("master.deploy_retry.jitter_factor", retry.jitter_factor)?
            .set_default("observability.log_level", defaults.observability.log_level.clone())?
            .set_default(
                "observability.log_format",
                defaults.observability.log_format.clone(),
            )?;

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/fleet.toml", "fleet.toml", "/etc/fleet/config.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        // 2. Environment variable overrides (prefix: FLEET_), e.g. FLEET_MASTER__NAME
        builder = builder.add_source(
            Environment::with_prefix("FLEET")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.coordination
            .validate()
            .context("协调存储配置验证失败")?;

        self.master.validate().context("Master配置验证失败")?;

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coordination.backend, "memory");
        assert_eq!(config.master.deploy_retry.max_attempts, 3);
        assert!(!config.master.name.is_empty());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.master.name, config.master.name);
        assert_eq!(
            parsed.master.deploy_retry.max_delay_ms,
            config.master.deploy_retry.max_delay_ms
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
[master]
name = "m1"
"#,
        )
        .unwrap();
        assert_eq!(config.master.name, "m1");
        assert_eq!(config.master.deploy_retry.base_delay_ms, 10);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_partial_sections_fill_missing_fields() {
        let config = AppConfig::from_toml(
            r#"
[coordination]

[master.deploy_retry]
max_attempts = 6

[observability]
log_format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.coordination.backend, "memory");
        assert_eq!(config.master.deploy_retry.max_attempts, 6);
        assert_eq!(config.master.deploy_retry.max_delay_ms, 200);
        assert!(!config.master.name.is_empty());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_toml(
            r#"
[coordination]
backend = "etcd"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("协调存储配置验证失败"));

        let mut config = AppConfig::default();
        config.master.deploy_retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.master.deploy_retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.observability.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[master]
name = "file-master"

[master.deploy_retry]
max_attempts = 5
base_delay_ms = 1
max_delay_ms = 50
backoff_multiplier = 3.0
jitter_factor = 0.0

[observability]
log_level = "debug"
log_format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.master.name, "file-master");
        assert_eq!(config.master.deploy_retry.max_attempts, 5);
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.coordination.backend, "memory");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = AppConfig::load(Some("/nonexistent/fleet.toml"));
        assert!(result.is_err());
    }
}
