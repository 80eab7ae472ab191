//! 协调存储路径约定
//!
//! 将领域标识（agent 名称、job id、端口、时间戳）映射为确定的存储路径。
//! 纯函数、无状态，master 与 agent 双方共用同一套约定。
//!
//! ```text
//! /config/agents/<agent>/{id, jobs/<job>, ports/<port>}
//! /config/jobs/<job>/agents/<agent>
//! /config/jobrefs/<name:version>
//! /status/agents/<agent>/{up, hostinfo, runtimeinfo, environment, jobs/<job>}
//! /status/masters/<master>/up
//! /history/jobs/<job>/agents/<agent>/events/<timestamp>
//! ```

use crate::models::JobId;

const CONFIG_AGENTS: &str = "/config/agents";
const CONFIG_JOBS: &str = "/config/jobs";
const CONFIG_JOBREFS: &str = "/config/jobrefs";
const STATUS_AGENTS: &str = "/status/agents";
const STATUS_MASTERS: &str = "/status/masters";
const HISTORY_JOBS: &str = "/history/jobs";

const ID: &str = "id";
const JOBS: &str = "jobs";
const PORTS: &str = "ports";
const AGENTS: &str = "agents";
const UP: &str = "up";
const HOSTINFO: &str = "hostinfo";
const RUNTIMEINFO: &str = "runtimeinfo";
const ENVIRONMENT: &str = "environment";
const EVENTS: &str = "events";

/// master 启动时需要存在的根目录
pub fn roots() -> [&'static str; 6] {
    [
        CONFIG_AGENTS,
        CONFIG_JOBS,
        CONFIG_JOBREFS,
        STATUS_AGENTS,
        STATUS_MASTERS,
        HISTORY_JOBS,
    ]
}

pub fn config_agents() -> String {
    CONFIG_AGENTS.to_string()
}

pub fn config_agent(agent: &str) -> String {
    format!("{CONFIG_AGENTS}/{agent}")
}

/// 注册完成标记，最后创建
pub fn config_agent_id(agent: &str) -> String {
    format!("{CONFIG_AGENTS}/{agent}/{ID}")
}

pub fn config_agent_jobs(agent: &str) -> String {
    format!("{CONFIG_AGENTS}/{agent}/{JOBS}")
}

pub fn config_agent_job(agent: &str, job_id: &JobId) -> String {
    format!("{CONFIG_AGENTS}/{agent}/{JOBS}/{job_id}")
}

pub fn config_agent_ports(agent: &str) -> String {
    format!("{CONFIG_AGENTS}/{agent}/{PORTS}")
}

pub fn config_agent_port(agent: &str, port: u16) -> String {
    format!("{CONFIG_AGENTS}/{agent}/{PORTS}/{port}")
}

pub fn config_jobs() -> String {
    CONFIG_JOBS.to_string()
}

pub fn config_job(job_id: &JobId) -> String {
    format!("{CONFIG_JOBS}/{job_id}")
}

/// job 当前被部署到的 agent 集合
pub fn config_job_agents(job_id: &JobId) -> String {
    format!("{CONFIG_JOBS}/{job_id}/{AGENTS}")
}

pub fn config_job_agent(job_id: &JobId, agent: &str) -> String {
    format!("{CONFIG_JOBS}/{job_id}/{AGENTS}/{agent}")
}

pub fn config_job_refs() -> String {
    CONFIG_JOBREFS.to_string()
}

pub fn config_job_ref_short(job_id: &JobId) -> String {
    format!("{CONFIG_JOBREFS}/{}", job_id.to_short_string())
}

pub fn status_agents() -> String {
    STATUS_AGENTS.to_string()
}

pub fn status_agent(agent: &str) -> String {
    format!("{STATUS_AGENTS}/{agent}")
}

pub fn status_agent_up(agent: &str) -> String {
    format!("{STATUS_AGENTS}/{agent}/{UP}")
}

pub fn status_agent_host_info(agent: &str) -> String {
    format!("{STATUS_AGENTS}/{agent}/{HOSTINFO}")
}

pub fn status_agent_runtime_info(agent: &str) -> String {
    format!("{STATUS_AGENTS}/{agent}/{RUNTIMEINFO}")
}

pub fn status_agent_environment(agent: &str) -> String {
    format!("{STATUS_AGENTS}/{agent}/{ENVIRONMENT}")
}

pub fn status_agent_jobs(agent: &str) -> String {
    format!("{STATUS_AGENTS}/{agent}/{JOBS}")
}

pub fn status_agent_job(agent: &str, job_id: &JobId) -> String {
    format!("{STATUS_AGENTS}/{agent}/{JOBS}/{job_id}")
}

pub fn status_masters() -> String {
    STATUS_MASTERS.to_string()
}

pub fn status_master_up(master: &str) -> String {
    format!("{STATUS_MASTERS}/{master}/{UP}")
}

pub fn history_jobs() -> String {
    HISTORY_JOBS.to_string()
}

pub fn history_job(job_id: &JobId) -> String {
    format!("{HISTORY_JOBS}/{job_id}")
}

pub fn history_job_agents(job_id: &JobId) -> String {
    format!("{HISTORY_JOBS}/{job_id}/{AGENTS}")
}

pub fn history_job_agent_events(job_id: &JobId, agent: &str) -> String {
    format!("{HISTORY_JOBS}/{job_id}/{AGENTS}/{agent}/{EVENTS}")
}

pub fn history_job_agent_event(job_id: &JobId, agent: &str, timestamp: i64) -> String {
    format!("{HISTORY_JOBS}/{job_id}/{AGENTS}/{agent}/{EVENTS}/{timestamp}")
}
