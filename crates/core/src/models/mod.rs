//! # 数据模型
//!
//! 定义控制面的领域实体：Job、部署、任务、任务状态、agent 状态与 job 状态。
//!
//! ## 概述
//!
//! 所有实体都以 JSON 字节的形式存放在协调存储的路径上，存储本身不提供 schema，
//! 因此不变量全部由 master 模型维护。序列化字段名与线上格式一致（camelCase），
//! 缺失的可选字段解码为缺省值而不是报错。
//!
//! ## 核心模型
//!
//! ### Job - 任务定义
//! 不可变、带版本的工作负载定义，id 中包含内容哈希。
//!
//! ### Deployment / Task - 期望状态
//! `Deployment` 是 (jobId, goal) 二元组；`Task` 是写入 agent 配置树的记录，
//! 内嵌完整 job 定义。goal 为 UNDEPLOY 的任务被所有读路径视为不存在。
//!
//! ### TaskStatus / AgentStatus / JobStatus - 观测状态
//! agent 上报的运行状态，以及 master 聚合出的快照。

pub mod agent_status;
pub mod deployment;
pub mod job;
pub mod job_status;
pub mod task_status;

pub use agent_status::{AgentState, AgentStatus, HostInfo, RuntimeInfo, RuntimeVersion};
pub use deployment::{Deployment, Goal, Task};
pub use job::{HealthCheck, Job, JobBuilder, JobId, PortMapping};
pub use job_status::JobStatus;
pub use task_status::{TaskState, TaskStatus, TaskStatusEvent, ThrottleState};
