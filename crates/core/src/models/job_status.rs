use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::job::Job;
use super::task_status::TaskStatus;

/// job 状态：定义、被部署到的 agent 以及各 agent 上报的状态
///
/// 尚未上报状态的 agent 不出现在 `task_statuses` 中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job: Job,
    #[serde(default)]
    pub deployed_agents: BTreeSet<String>,
    #[serde(default)]
    pub task_statuses: BTreeMap<String, TaskStatus>,
}
