use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::job::{Job, PortMapping};

/// agent 上报的容器运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    PullingImage,
    Creating,
    Starting,
    Healthchecking,
    Running,
    Exited,
    Stopped,
    Failed,
    #[serde(other)]
    Unknown,
}

/// 任务被限流的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThrottleState {
    #[default]
    No,
    ImageMissing,
    ImagePullFailed,
    FlappingRestarts,
}

/// agent 写入状态树的观测记录，对 master 只读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub job: Job,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default)]
    pub throttled: ThrottleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<BTreeMap<String, PortMapping>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl TaskStatus {
    pub fn new(job: Job, state: TaskState) -> Self {
        Self {
            job,
            state,
            container_id: None,
            throttled: ThrottleState::No,
            ports: None,
            env: BTreeMap::new(),
        }
    }
}

/// 历史事件：某 agent 在某时刻记录的任务状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusEvent {
    pub status: TaskStatus,
    /// 毫秒时间戳
    pub timestamp: i64,
    pub agent: String,
}

impl TaskStatusEvent {
    pub fn new<S: Into<String>>(status: TaskStatus, timestamp: i64, agent: S) -> Self {
        Self {
            status,
            timestamp,
            agent: agent.into(),
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::builder("web", "1", "nginx").build().unwrap()
    }

    #[test]
    fn test_unknown_state_decodes() {
        let state: TaskState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(state, TaskState::Unknown);
        let state: TaskState = serde_json::from_str("\"PULLING_IMAGE\"").unwrap();
        assert_eq!(state, TaskState::PullingImage);
    }

    #[test]
    fn test_minimal_status_decodes() {
        let job = job();
        let json = format!(
            r#"{{"job":{},"state":"RUNNING"}}"#,
            serde_json::to_string(&job).unwrap()
        );
        let status: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status.state, TaskState::Running);
        assert_eq!(status.throttled, ThrottleState::No);
        assert!(status.container_id.is_none());
        assert!(status.ports.is_none());
    }

    #[test]
    fn test_event_time() {
        let event = TaskStatusEvent::new(TaskStatus::new(job(), TaskState::Running), 1_000, "h1");
        assert_eq!(event.time().map(|t| t.timestamp()), Some(1));
    }
}
