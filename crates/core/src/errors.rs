use thiserror::Error;

use crate::models::JobId;
use crate::traits::StoreError;

/// 控制面错误类型定义
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Agent不存在: {agent}")]
    AgentDoesNotExist { agent: String },

    #[error("Job不存在: {job_id}")]
    JobDoesNotExist { job_id: JobId },

    #[error("Job {job_id} 未部署在Agent {agent} 上")]
    JobNotDeployed { agent: String, job_id: JobId },

    #[error("Job已存在: {job_id}")]
    JobAlreadyExists { job_id: JobId },

    #[error("Job {job_id} 已部署在Agent {agent} 上")]
    JobAlreadyDeployed { agent: String, job_id: JobId },

    #[error("Job {job_id} 仍在使用中: {agents:?}")]
    JobStillInUse { job_id: JobId, agents: Vec<String> },

    #[error("端口分配冲突: Job {job_id} 与 Job {conflicting_job_id} 在Agent {agent} 上争用端口 {port}")]
    PortAllocationConflict {
        job_id: JobId,
        conflicting_job_id: JobId,
        agent: String,
        port: u16,
    },

    #[error("部署时连续 {attempts} 次失败（可能存在并发修改），放弃")]
    DeployRetriesExhausted { attempts: u32 },

    #[error("{message}: {source}")]
    Coordination {
        message: String,
        #[source]
        source: StoreError,
    },

    #[error("序列化错误: {message}")]
    Serialization { message: String },

    #[error("无效的Job标识: {0}")]
    InvalidJobId(String),

    #[error("配置错误: {0}")]
    Configuration(String),
}

/// 统一的Result类型
pub type FleetResult<T> = std::result::Result<T, FleetError>;

impl FleetError {
    pub fn agent_does_not_exist<S: Into<String>>(agent: S) -> Self {
        Self::AgentDoesNotExist {
            agent: agent.into(),
        }
    }

    pub fn job_does_not_exist(job_id: &JobId) -> Self {
        Self::JobDoesNotExist {
            job_id: job_id.clone(),
        }
    }

    pub fn job_not_deployed<S: Into<String>>(agent: S, job_id: JobId) -> Self {
        Self::JobNotDeployed {
            agent: agent.into(),
            job_id,
        }
    }

    pub fn job_already_deployed<S: Into<String>>(agent: S, job_id: JobId) -> Self {
        Self::JobAlreadyDeployed {
            agent: agent.into(),
            job_id,
        }
    }

    pub fn coordination<S: Into<String>>(message: S, source: StoreError) -> Self {
        Self::Coordination {
            message: message.into(),
            source,
        }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 引用的实体不存在，可直接返回给调用方
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FleetError::AgentDoesNotExist { .. }
                | FleetError::JobDoesNotExist { .. }
                | FleetError::JobNotDeployed { .. }
        )
    }

    /// 操作本身合法但与当前状态的不变量冲突
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            FleetError::JobAlreadyExists { .. }
                | FleetError::JobAlreadyDeployed { .. }
                | FleetError::JobStillInUse { .. }
                | FleetError::PortAllocationConflict { .. }
        )
    }

    /// 调用方可以整体重试的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            FleetError::DeployRetriesExhausted { .. } => true,
            FleetError::Coordination { source, .. } => matches!(
                source,
                StoreError::ConnectionLoss(_) | StoreError::BadVersion { .. }
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_error_display() {
        let err = FleetError::agent_does_not_exist("host-1");
        assert_eq!(err.to_string(), "Agent不存在: host-1");

        let id = JobId::new("web", "1", "abc");
        let err = FleetError::job_does_not_exist(&id);
        assert_eq!(err.to_string(), "Job不存在: web:1:abc");

        let err = FleetError::DeployRetriesExhausted { attempts: 3 };
        assert_eq!(
            err.to_string(),
            "部署时连续 3 次失败（可能存在并发修改），放弃"
        );

        let err = FleetError::coordination("添加Agent host-1 失败", StoreError::no_node("/x"));
        assert_eq!(err.to_string(), "添加Agent host-1 失败: 节点不存在: /x");
    }

    #[test]
    fn test_error_families() {
        let id = JobId::new("web", "1", "abc");
        assert!(FleetError::job_not_deployed("h", id.clone()).is_not_found());
        assert!(FleetError::JobStillInUse {
            job_id: id.clone(),
            agents: vec!["h".into()]
        }
        .is_conflict());
        assert!(!FleetError::job_does_not_exist(&id).is_conflict());
        assert!(FleetError::DeployRetriesExhausted { attempts: 3 }.is_retryable());
        assert!(FleetError::coordination("x", StoreError::ConnectionLoss("down".into()))
            .is_retryable());
        assert!(!FleetError::coordination("x", StoreError::no_node("/x")).is_retryable());
    }
}
