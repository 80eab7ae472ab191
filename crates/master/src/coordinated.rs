use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use fleet_core::models::{
    AgentState, AgentStatus, Deployment, Goal, HostInfo, Job, JobId, JobStatus, RuntimeInfo,
    Task, TaskStatus, TaskStatusEvent,
};
use fleet_core::paths;
use fleet_core::traits::{CoordinationStore, Op, StoreError};
use fleet_core::{Descriptor, FleetError, FleetResult};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::history::merge_events;
use crate::model::MasterModel;
use crate::retry::RetryPolicy;

/// 基于协调存储的 master 模型实现
///
/// 不持有任何可变状态，所有一致性由存储的单事务原子性与节点版本号保证。
/// 部署流程采用乐观并发：先读取当前版本与端口占用，再提交一个带前置条件的事务，
/// 冲突时根据失败的前置条件给出精确错误或在有限次数内重试。
pub struct CoordinatedMasterModel {
    store: Arc<dyn CoordinationStore>,
    retry: RetryPolicy,
}

/// 单次部署尝试的结果
enum DeployAttempt {
    Committed,
    /// 事务期间有并发修改，需要重新读取后重试
    Contended,
}

impl CoordinatedMasterModel {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: Arc<dyn CoordinationStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    /// 读取并解析节点；节点不存在返回 `None`
    async fn read<T: Descriptor>(&self, path: &str, what: &str) -> FleetResult<Option<T>> {
        match self.store.get_data(path).await {
            Ok(bytes) => T::parse(&bytes).map(Some),
            Err(e) if e.is_no_node() => Ok(None),
            Err(e) => Err(FleetError::coordination(format!("读取{what}失败: {path}"), e)),
        }
    }

    /// 列出子节点；父节点不存在返回 `None`
    async fn children(&self, path: &str, what: &str) -> FleetResult<Option<Vec<String>>> {
        match self.store.get_children(path).await {
            Ok(children) => Ok(Some(children)),
            Err(e) if e.is_no_node() => Ok(None),
            Err(e) => Err(FleetError::coordination(format!("列出{what}失败: {path}"), e)),
        }
    }

    async fn exists(&self, path: &str, what: &str) -> FleetResult<bool> {
        self.store
            .stat(path)
            .await
            .map(|stat| stat.is_some())
            .map_err(|e| FleetError::coordination(format!("检查{what}失败: {path}"), e))
    }

    async fn assert_agent_exists(&self, agent: &str) -> FleetResult<()> {
        if self.exists(&paths::config_agent(agent), "agent").await? {
            Ok(())
        } else {
            Err(FleetError::agent_does_not_exist(agent))
        }
    }

    async fn assert_job_exists(&self, job_id: &JobId) -> FleetResult<()> {
        if self.exists(&paths::config_job(job_id), "job").await? {
            Ok(())
        } else {
            Err(FleetError::job_does_not_exist(job_id))
        }
    }

    async fn list_job_agents(&self, job_id: &JobId) -> FleetResult<Vec<String>> {
        self.children(&paths::config_job_agents(job_id), "job部署的agent")
            .await?
            .ok_or_else(|| FleetError::job_does_not_exist(job_id))
    }

    async fn get_task_status(&self, agent: &str, job_id: &JobId) -> FleetResult<Option<TaskStatus>> {
        self.read(&paths::status_agent_job(agent, job_id), "任务状态")
            .await
    }

    /// agent 上目标不为 UNDEPLOY 的部署
    async fn get_tasks(&self, agent: &str) -> FleetResult<BTreeMap<JobId, Deployment>> {
        let mut jobs = BTreeMap::new();
        let Some(ids) = self
            .children(&paths::config_agent_jobs(agent), "agent任务")
            .await?
        else {
            return Ok(jobs);
        };

        for id in ids {
            let job_id: JobId = id.parse()?;
            match self
                .read::<Task>(&paths::config_agent_job(agent, &job_id), "任务描述")
                .await?
            {
                Some(task) if task.is_active() => {
                    jobs.insert(job_id, task.deployment());
                }
                Some(_) => {}
                None => debug!("Deployment config node disappeared: {}", id),
            }
        }
        Ok(jobs)
    }

    async fn get_task_statuses(&self, agent: &str) -> FleetResult<BTreeMap<JobId, TaskStatus>> {
        let mut statuses = BTreeMap::new();
        let Some(ids) = self
            .children(&paths::status_agent_jobs(agent), "agent任务状态")
            .await?
        else {
            return Ok(statuses);
        };

        for id in ids {
            let job_id: JobId = id.parse()?;
            match self.get_task_status(agent, &job_id).await? {
                Some(status) => {
                    statuses.insert(job_id, status);
                }
                None => debug!("Task {} status missing for agent {}", job_id, agent),
            }
        }
        Ok(statuses)
    }

    async fn agent_events(&self, job_id: &JobId, agent: &str) -> FleetResult<Vec<TaskStatusEvent>> {
        let Some(timestamps) = self
            .children(&paths::history_job_agent_events(job_id, agent), "历史事件")
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut events = Vec::with_capacity(timestamps.len());
        for name in timestamps {
            let timestamp: i64 = name.parse().map_err(|e| {
                FleetError::serialization(format!("无效的历史事件时间戳 {name}: {e}"))
            })?;
            let path = paths::history_job_agent_event(job_id, agent, timestamp);
            match self.read::<TaskStatus>(&path, "历史事件").await? {
                Some(status) => events.push(TaskStatusEvent::new(status, timestamp, agent)),
                None => debug!("History event disappeared: {}", path),
            }
        }
        Ok(events)
    }

    async fn try_deploy(&self, agent: &str, deployment: &Deployment) -> FleetResult<DeployAttempt> {
        let job_id = &deployment.job_id;
        let job = self
            .get_job(job_id)
            .await?
            .ok_or_else(|| FleetError::job_does_not_exist(job_id))?;

        let task_path = paths::config_agent_job(agent, job_id);
        let static_ports = job.static_ports();
        let id_bytes = job_id.to_json_bytes()?;
        let task_bytes = Task::new(job, deployment.goal).to_json_bytes()?;

        let mut ops = vec![Op::check(paths::config_job(job_id))];
        ops.extend(
            static_ports
                .iter()
                .map(|port| Op::create(paths::config_agent_port(agent, *port), id_bytes.clone())),
        );
        ops.push(Op::create_empty(paths::config_job_agent(job_id, agent)));

        // 目标为 UNDEPLOY 的已有任务视同不存在，改为带版本的覆盖写
        match self.store.get_node(&task_path).await {
            Ok(existing) => {
                let task = Task::parse(&existing.bytes)?;
                if task.is_active() {
                    return Err(FleetError::job_already_deployed(agent, job_id.clone()));
                }
                ops.push(Op::check_version(task_path.clone(), existing.stat.version));
                ops.push(Op::set(task_path.clone(), task_bytes));
            }
            Err(e) if e.is_no_node() => ops.push(Op::create(task_path.clone(), task_bytes)),
            Err(e) => {
                return Err(FleetError::coordination("读取已有任务描述失败", e));
            }
        }

        match self.store.transaction(ops).await {
            Ok(()) => Ok(DeployAttempt::Committed),
            Err(e) if e.is_no_node() || e.is_bad_version() => {
                // job 或 agent 可能被并发删除
                self.assert_job_exists(job_id).await?;
                self.assert_agent_exists(agent).await?;
                debug!("Deploy of {} to {} contended: {}", job_id, agent, e);
                Ok(DeployAttempt::Contended)
            }
            Err(e) if e.is_node_exists() => Err(self
                .explain_deploy_conflict(agent, job_id, &static_ports, e)
                .await),
            Err(e) => Err(FleetError::coordination("部署job失败", e)),
        }
    }

    /// 判断是哪个待创建节点已存在，给出对应的冲突错误
    async fn explain_deploy_conflict(
        &self,
        agent: &str,
        job_id: &JobId,
        static_ports: &BTreeSet<u16>,
        cause: StoreError,
    ) -> FleetError {
        let task_path = paths::config_agent_job(agent, job_id);
        match self.read::<Task>(&task_path, "任务描述").await {
            Ok(Some(task)) if task.is_active() => {
                return FleetError::job_already_deployed(agent, job_id.clone());
            }
            Ok(_) => {}
            Err(e) => return e,
        }

        for port in static_ports {
            let path = paths::config_agent_port(agent, *port);
            match self.read::<JobId>(&path, "端口分配").await {
                Ok(Some(conflicting_job_id)) => {
                    return FleetError::PortAllocationConflict {
                        job_id: job_id.clone(),
                        conflicting_job_id,
                        agent: agent.to_string(),
                        port: *port,
                    };
                }
                Ok(None) => continue,
                Err(e) => return e,
            }
        }

        FleetError::coordination("部署job失败", cause)
    }
}

#[async_trait]
impl MasterModel for CoordinatedMasterModel {
    async fn add_agent(&self, agent: &str) -> FleetResult<()> {
        debug!("Adding agent: {}", agent);
        let folders = [
            paths::config_agent(agent),
            paths::config_agent_jobs(agent),
            paths::config_agent_ports(agent),
            paths::status_agent(agent),
            paths::status_agent_jobs(agent),
            // 注册完成标记，必须最后创建
            paths::config_agent_id(agent),
        ];
        for path in &folders {
            self.store
                .ensure_path(path, false)
                .await
                .map_err(|e| FleetError::coordination(format!("添加Agent {agent} 失败"), e))?;
        }
        info!("Agent {} registered", agent);
        Ok(())
    }

    async fn remove_agent(&self, agent: &str) -> FleetResult<()> {
        debug!("Removing agent: {}", agent);
        let mut config_nodes = match self.store.list_recursive(&paths::config_agent(agent)).await {
            Ok(nodes) => nodes,
            Err(e) if e.is_no_node() => return Err(FleetError::agent_does_not_exist(agent)),
            Err(e) => return Err(FleetError::coordination(format!("删除Agent {agent} 失败"), e)),
        };
        let mut status_nodes = match self.store.list_recursive(&paths::status_agent(agent)).await {
            Ok(nodes) => nodes,
            Err(e) if e.is_no_node() => Vec::new(),
            Err(e) => return Err(FleetError::coordination(format!("删除Agent {agent} 失败"), e)),
        };

        // 释放仍处于活动部署的 job 对该 agent 的引用，否则这些 job 无法再被删除
        let mut ops = Vec::new();
        for job_id in self.get_tasks(agent).await?.into_keys() {
            let reference = paths::config_job_agent(&job_id, agent);
            if self.exists(&reference, "job引用").await? {
                ops.push(Op::delete(reference));
            }
        }

        // 子节点必须先于父节点删除
        config_nodes.reverse();
        status_nodes.reverse();
        ops.extend(config_nodes.into_iter().chain(status_nodes).map(Op::delete));

        match self.store.transaction(ops).await {
            Ok(()) => {
                info!("Agent {} removed", agent);
                Ok(())
            }
            Err(e) if e.is_no_node() => Err(FleetError::agent_does_not_exist(agent)),
            Err(e) => Err(FleetError::coordination(format!("删除Agent {agent} 失败"), e)),
        }
    }

    async fn get_agents(&self) -> FleetResult<Vec<String>> {
        Ok(self
            .children(&paths::config_agents(), "agent")
            .await?
            .unwrap_or_default())
    }

    async fn get_running_masters(&self) -> FleetResult<Vec<String>> {
        let Some(masters) = self.children(&paths::status_masters(), "master").await? else {
            return Ok(Vec::new());
        };

        let mut running = Vec::with_capacity(masters.len());
        for master in masters {
            if self
                .exists(&paths::status_master_up(&master), "master存活状态")
                .await?
            {
                running.push(master);
            }
        }
        Ok(running)
    }

    async fn add_job(&self, job: &Job) -> FleetResult<()> {
        debug!("Adding job: {}", job.id);
        let job_id = &job.id;

        // 父目录可能尚未由 master 启动流程创建
        for path in [
            paths::config_jobs(),
            paths::config_job_refs(),
            paths::history_job(job_id),
        ] {
            self.store
                .ensure_path(&path, false)
                .await
                .map_err(|e| FleetError::coordination(format!("添加job {job_id} 失败"), e))?;
        }

        let ops = vec![
            Op::create(paths::config_job(job_id), job.to_json_bytes()?),
            Op::create(paths::config_job_ref_short(job_id), job_id.to_json_bytes()?),
            Op::create_empty(paths::config_job_agents(job_id)),
        ];
        match self.store.transaction(ops).await {
            Ok(()) => {
                info!("Job {} added", job_id);
                Ok(())
            }
            Err(e) if e.is_node_exists() => Err(FleetError::JobAlreadyExists {
                job_id: job_id.clone(),
            }),
            Err(e) => Err(FleetError::coordination(format!("添加job {job_id} 失败"), e)),
        }
    }

    async fn get_job(&self, job_id: &JobId) -> FleetResult<Option<Job>> {
        debug!("Getting job: {}", job_id);
        self.read(&paths::config_job(job_id), "job").await
    }

    async fn get_jobs(&self) -> FleetResult<BTreeMap<JobId, Job>> {
        debug!("Getting jobs");
        let mut jobs = BTreeMap::new();
        let Some(ids) = self.children(&paths::config_jobs(), "job").await? else {
            return Ok(jobs);
        };

        for id in ids {
            let job_id: JobId = id.parse()?;
            if let Some(job) = self.get_job(&job_id).await? {
                jobs.insert(job.id.clone(), job);
            }
        }
        Ok(jobs)
    }

    async fn remove_job(&self, job_id: &JobId) -> FleetResult<Job> {
        debug!("Removing job: {}", job_id);
        let old = self
            .get_job(job_id)
            .await?
            .ok_or_else(|| FleetError::job_does_not_exist(job_id))?;

        // agent 集合非空时整个事务失败
        let ops = vec![
            Op::delete(paths::config_job_agents(job_id)),
            Op::delete(paths::config_job_ref_short(job_id)),
            Op::delete(paths::config_job(job_id)),
        ];
        match self.store.transaction(ops).await {
            Ok(()) => {
                info!("Job {} removed", job_id);
                Ok(old)
            }
            Err(e) if e.is_no_node() => Err(FleetError::job_does_not_exist(job_id)),
            Err(e) if e.is_not_empty() => {
                let agents = self.list_job_agents(job_id).await?;
                Err(FleetError::JobStillInUse {
                    job_id: job_id.clone(),
                    agents,
                })
            }
            Err(e) => Err(FleetError::coordination(format!("删除job {job_id} 失败"), e)),
        }
    }

    async fn deploy_job(&self, agent: &str, deployment: &Deployment) -> FleetResult<()> {
        let max_attempts = self.retry.max_attempts();
        for attempt in 1..=max_attempts {
            debug!(
                "Adding deployment: agent={}, job={}, goal={:?}, attempt={}",
                agent, deployment.job_id, deployment.goal, attempt
            );
            match self.try_deploy(agent, deployment).await? {
                DeployAttempt::Committed => {
                    info!("Job {} deployed to {}", deployment.job_id, agent);
                    return Ok(());
                }
                DeployAttempt::Contended => {
                    warn!(
                        "Concurrent modification while deploying {} to {} (attempt {}/{})",
                        deployment.job_id, agent, attempt, max_attempts
                    );
                    self.retry.pause(attempt).await;
                }
            }
        }
        Err(FleetError::DeployRetriesExhausted {
            attempts: max_attempts,
        })
    }

    async fn undeploy_job(&self, agent: &str, job_id: &JobId) -> FleetResult<Deployment> {
        debug!("Removing deployment: agent={}, job={}", agent, job_id);
        self.assert_agent_exists(agent).await?;

        let task_path = paths::config_agent_job(agent, job_id);
        let existing = match self.store.get_node(&task_path).await {
            Ok(node) => node,
            Err(e) if e.is_no_node() => {
                return Err(FleetError::job_not_deployed(agent, job_id.clone()))
            }
            Err(e) => return Err(FleetError::coordination("读取已有任务描述失败", e)),
        };
        let task = Task::parse(&existing.bytes)?;
        if !task.is_active() {
            return Err(FleetError::job_not_deployed(agent, job_id.clone()));
        }
        let previous = task.deployment();
        let static_ports = task.job.static_ports();

        // 任务节点保留为 UNDEPLOY 墓碑，同时释放引用与端口
        let tombstone = Task::new(task.job, Goal::Undeploy).to_json_bytes()?;
        let mut ops = vec![
            Op::check_version(task_path.clone(), existing.stat.version),
            Op::set(task_path, tombstone),
            Op::delete(paths::config_job_agent(job_id, agent)),
        ];
        ops.extend(
            static_ports
                .into_iter()
                .map(|port| Op::delete(paths::config_agent_port(agent, port))),
        );

        self.store
            .transaction(ops)
            .await
            .map_err(|e| FleetError::coordination("撤销部署失败", e))?;

        info!("Job {} undeployed from {}", job_id, agent);
        Ok(previous)
    }

    async fn update_deployment(&self, agent: &str, deployment: &Deployment) -> FleetResult<()> {
        debug!(
            "Updating deployment: agent={}, job={}, goal={:?}",
            agent, deployment.job_id, deployment.goal
        );
        let job_id = &deployment.job_id;
        let job = self
            .get_job(job_id)
            .await?
            .ok_or_else(|| FleetError::job_does_not_exist(job_id))?;
        self.assert_agent_exists(agent).await?;

        let task_path = paths::config_agent_job(agent, job_id);
        let existing = match self.store.get_node(&task_path).await {
            Ok(node) => node,
            Err(e) if e.is_no_node() => {
                return Err(FleetError::job_not_deployed(agent, job_id.clone()))
            }
            Err(e) => return Err(FleetError::coordination("读取已有任务描述失败", e)),
        };
        // 墓碑没有端口占用与 job 引用，不能原地恢复，只能重新部署
        if !Task::parse(&existing.bytes)?.is_active() {
            return Err(FleetError::job_not_deployed(agent, job_id.clone()));
        }
        let version = existing.stat.version;

        let task = Task::new(job, deployment.goal);
        let ops = vec![
            Op::check_version(task_path.clone(), version),
            Op::set(task_path, task.to_json_bytes()?),
        ];
        match self.store.transaction(ops).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_no_node() => Err(FleetError::job_not_deployed(agent, job_id.clone())),
            Err(e) => Err(FleetError::coordination("更新agent上的部署失败", e)),
        }
    }

    async fn get_deployment(
        &self,
        agent: &str,
        job_id: &JobId,
    ) -> FleetResult<Option<Deployment>> {
        let task: Option<Task> = self
            .read(&paths::config_agent_job(agent, job_id), "任务描述")
            .await?;
        Ok(task
            .filter(Task::is_active)
            .map(|task| Deployment::of(job_id.clone(), task.goal)))
    }

    async fn get_agent_status(&self, agent: &str) -> FleetResult<Option<AgentStatus>> {
        if !self.exists(&paths::config_agent_id(agent), "agent注册状态").await? {
            return Ok(None);
        }

        let up = self.exists(&paths::status_agent_up(agent), "agent存活状态").await?;
        let host_info: Option<HostInfo> = self
            .read(&paths::status_agent_host_info(agent), "agent主机信息")
            .await?;
        let runtime_info: Option<RuntimeInfo> = self
            .read(&paths::status_agent_runtime_info(agent), "agent运行时信息")
            .await?;
        let environment: Option<BTreeMap<String, String>> = self
            .read(&paths::status_agent_environment(agent), "agent环境变量")
            .await?;
        let jobs = self.get_tasks(agent).await?;
        let statuses = self.get_task_statuses(agent).await?;

        Ok(Some(AgentStatus {
            status: if up { AgentState::Up } else { AgentState::Down },
            host_info,
            runtime_info,
            environment,
            jobs,
            statuses,
        }))
    }

    async fn get_job_status(&self, job_id: &JobId) -> FleetResult<Option<JobStatus>> {
        let Some(job) = self.get_job(job_id).await? else {
            return Ok(None);
        };

        let agents = match self.list_job_agents(job_id).await {
            Ok(agents) => agents,
            Err(FleetError::JobDoesNotExist { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let statuses = try_join_all(
            agents
                .iter()
                .map(|agent| self.get_task_status(agent, job_id)),
        )
        .await?;

        let task_statuses = agents
            .iter()
            .zip(statuses)
            .filter_map(|(agent, status)| status.map(|status| (agent.clone(), status)))
            .collect();

        Ok(Some(JobStatus {
            job,
            deployed_agents: agents.into_iter().collect::<BTreeSet<_>>(),
            task_statuses,
        }))
    }

    async fn get_job_history(&self, job_id: &JobId) -> FleetResult<Vec<TaskStatusEvent>> {
        self.assert_job_exists(job_id).await?;

        let Some(agents) = self
            .children(&paths::history_job_agents(job_id), "job历史")
            .await?
        else {
            return Ok(Vec::new());
        };

        let per_agent = try_join_all(
            agents
                .iter()
                .map(|agent| self.agent_events(job_id, agent)),
        )
        .await?;

        Ok(merge_events(per_agent))
    }
}
