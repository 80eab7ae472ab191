use serde::{Deserialize, Serialize};

use super::job::{Job, JobId};

/// 任务的期望生命周期目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Goal {
    Start,
    Stop,
    /// 墓碑值：所有读路径都将其视为不存在
    Undeploy,
}

impl Goal {
    pub fn is_active(self) -> bool {
        !matches!(self, Goal::Undeploy)
    }
}

/// 部署：某个 job 在某个 agent 上的期望状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub job_id: JobId,
    pub goal: Goal,
}

impl Deployment {
    pub fn of(job_id: JobId, goal: Goal) -> Self {
        Self { job_id, goal }
    }
}

/// 写入 agent 配置树的任务记录：完整 job 定义 + 目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub job: Job,
    pub goal: Goal,
}

impl Task {
    pub fn new(job: Job, goal: Goal) -> Self {
        Self { job, goal }
    }

    pub fn is_active(&self) -> bool {
        self.goal.is_active()
    }

    pub fn deployment(&self) -> Deployment {
        Deployment::of(self.job.id.clone(), self.goal)
    }
}
