pub mod app_config;
pub mod coordination;
pub mod master;
pub mod observability;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use coordination::CoordinationConfig;
pub use master::{default_master_name, DeployRetryConfig, MasterConfig};
pub use observability::ObservabilityConfig;
