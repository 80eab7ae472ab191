use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::deployment::Deployment;
use super::job::JobId;
use super::task_status::TaskStatus;

/// agent 存活状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Up,
    Down,
}

/// 容器运行时版本信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api_version: String,
}

/// agent 上报的主机信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub uname: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os_name: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub load_avg: f64,
    #[serde(default)]
    pub memory_total_bytes: u64,
    #[serde(default)]
    pub memory_free_bytes: u64,
    #[serde(default)]
    pub swap_total_bytes: u64,
    #[serde(default)]
    pub swap_free_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<RuntimeVersion>,
}

/// agent 进程的运行时信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vendor: String,
    /// 毫秒
    #[serde(default)]
    pub uptime: i64,
    /// 毫秒时间戳
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub input_arguments: Vec<String>,
}

/// agent 状态快照：存活、主机信息、期望部署与观测状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub status: AgentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_info: Option<HostInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_info: Option<RuntimeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
    /// 仅包含目标不为 UNDEPLOY 的部署
    #[serde(default)]
    pub jobs: BTreeMap<JobId, Deployment>,
    #[serde(default)]
    pub statuses: BTreeMap<JobId, TaskStatus>,
}

impl AgentStatus {
    pub fn is_up(&self) -> bool {
        self.status == AgentState::Up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Goal;

    #[test]
    fn test_agent_status_json_keys_are_job_ids() {
        let id = JobId::new("web", "1", "abc");
        let mut jobs = BTreeMap::new();
        jobs.insert(id.clone(), Deployment::of(id.clone(), Goal::Start));
        let status = AgentStatus {
            status: AgentState::Up,
            host_info: None,
            runtime_info: None,
            environment: None,
            jobs,
            statuses: BTreeMap::new(),
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "UP");
        assert_eq!(json["jobs"]["web:1:abc"]["goal"], "START");

        let back: AgentStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_host_info_tolerates_partial_report() {
        let info: HostInfo = serde_json::from_str(r#"{"hostname":"h1","cpus":8}"#).unwrap();
        assert_eq!(info.hostname, "h1");
        assert_eq!(info.cpus, 8);
        assert!(info.runtime_version.is_none());
    }
}
