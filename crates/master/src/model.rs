use std::collections::BTreeMap;

use async_trait::async_trait;
use fleet_core::models::{
    AgentStatus, Deployment, Job, JobId, JobStatus, TaskStatusEvent,
};
use fleet_core::FleetResult;

/// master 侧的控制面状态机
///
/// 所有读写都经由共享的协调存储完成，实现本身不缓存任何状态，
/// 多个 master 副本可以并发调用。存储层错误在此边界转换为 [`fleet_core::FleetError`]。
#[async_trait]
pub trait MasterModel: Send + Sync {
    /// 注册 agent，幂等；`id` 标记节点最后创建
    async fn add_agent(&self, agent: &str) -> FleetResult<()>;

    /// 在一个事务中删除 agent 的配置与状态子树
    async fn remove_agent(&self, agent: &str) -> FleetResult<()>;

    async fn get_agents(&self) -> FleetResult<Vec<String>>;

    /// 存活节点仍在的 master 名称
    async fn get_running_masters(&self) -> FleetResult<Vec<String>>;

    async fn add_job(&self, job: &Job) -> FleetResult<()>;

    /// job 不存在时返回 `None`
    async fn get_job(&self, job_id: &JobId) -> FleetResult<Option<Job>>;

    async fn get_jobs(&self) -> FleetResult<BTreeMap<JobId, Job>>;

    /// 删除 job 并返回其定义；仍有部署时返回 `JobStillInUse`
    async fn remove_job(&self, job_id: &JobId) -> FleetResult<Job>;

    async fn deploy_job(&self, agent: &str, deployment: &Deployment) -> FleetResult<()>;

    /// 将任务标记为 UNDEPLOY 并释放端口，返回调用前的部署
    async fn undeploy_job(&self, agent: &str, job_id: &JobId) -> FleetResult<Deployment>;

    async fn update_deployment(&self, agent: &str, deployment: &Deployment) -> FleetResult<()>;

    /// 不存在或目标为 UNDEPLOY 时返回 `None`
    async fn get_deployment(&self, agent: &str, job_id: &JobId)
        -> FleetResult<Option<Deployment>>;

    /// agent 未完成注册时返回 `None`
    async fn get_agent_status(&self, agent: &str) -> FleetResult<Option<AgentStatus>>;

    async fn get_job_status(&self, job_id: &JobId) -> FleetResult<Option<JobStatus>>;

    /// 按时间戳升序返回 job 在所有 agent 上的历史事件
    async fn get_job_history(&self, job_id: &JobId) -> FleetResult<Vec<TaskStatusEvent>>;
}
