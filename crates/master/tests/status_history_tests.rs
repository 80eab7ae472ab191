use std::collections::BTreeMap;
use std::sync::Arc;

use fleet_core::models::{
    AgentState, Deployment, Goal, HostInfo, RuntimeInfo, TaskState,
};
use fleet_core::traits::CoordinationStore;
use fleet_core::FleetError;
use fleet_infrastructure::InMemoryCoordinationStore;
use fleet_master::{CoordinatedMasterModel, MasterModel, RetryPolicy};
use fleet_testing_utils::{shared_store, AgentSimulator, TaskStatusBuilder, TestJobBuilder};

fn setup() -> (Arc<InMemoryCoordinationStore>, CoordinatedMasterModel) {
    let (store, handle) = shared_store();
    let master = CoordinatedMasterModel::with_retry_policy(handle, RetryPolicy::immediate(3));
    (store, master)
}

#[tokio::test]
async fn test_agent_status_before_any_report() {
    let (_store, master) = setup();
    assert!(master.get_agent_status("h1").await.unwrap().is_none());

    master.add_agent("h1").await.unwrap();
    let status = master.get_agent_status("h1").await.unwrap().unwrap();
    assert_eq!(status.status, AgentState::Down);
    assert!(status.host_info.is_none());
    assert!(status.runtime_info.is_none());
    assert!(status.environment.is_none());
    assert!(status.jobs.is_empty());
    assert!(status.statuses.is_empty());
}

#[tokio::test]
async fn test_agent_status_aggregates_reports() {
    let (store, master) = setup();
    let running = TestJobBuilder::new().with_name("running").build();
    let removed = TestJobBuilder::new().with_name("removed").build();
    master.add_agent("h1").await.unwrap();
    for job in [&running, &removed] {
        master.add_job(job).await.unwrap();
        master
            .deploy_job("h1", &Deployment::of(job.id.clone(), Goal::Start))
            .await
            .unwrap();
    }
    master.undeploy_job("h1", &removed.id).await.unwrap();

    let agent = AgentSimulator::new("h1", &store);
    agent.connect().await.unwrap();
    agent
        .report_host_info(&HostInfo {
            hostname: "h1.example.com".to_string(),
            cpus: 8,
            ..Default::default()
        })
        .await
        .unwrap();
    agent
        .report_runtime_info(&RuntimeInfo {
            name: "fleet-agent".to_string(),
            start_time: 1_000,
            ..Default::default()
        })
        .await
        .unwrap();
    let env = BTreeMap::from([("ZONE".to_string(), "a".to_string())]);
    agent.report_environment(&env).await.unwrap();
    let task_status = TaskStatusBuilder::new(running.clone())
        .with_container_id("c-1")
        .build();
    agent.report_task_status(&task_status).await.unwrap();

    let status = master.get_agent_status("h1").await.unwrap().unwrap();
    assert!(status.is_up());
    assert_eq!(status.host_info.unwrap().cpus, 8);
    assert_eq!(status.runtime_info.unwrap().name, "fleet-agent");
    assert_eq!(status.environment, Some(env));
    assert_eq!(
        status.jobs.keys().collect::<Vec<_>>(),
        vec![&running.id],
        "undeployed tasks are filtered out"
    );
    assert_eq!(status.statuses.get(&running.id), Some(&task_status));

    agent.disconnect().await.unwrap();
    let status = master.get_agent_status("h1").await.unwrap().unwrap();
    assert_eq!(status.status, AgentState::Down);
}

#[tokio::test]
async fn test_job_status_omits_unreported_agents() {
    let (store, master) = setup();
    let job = TestJobBuilder::new().build();
    assert!(master.get_job_status(&job.id).await.unwrap().is_none());

    master.add_job(&job).await.unwrap();
    for agent in ["h1", "h2"] {
        master.add_agent(agent).await.unwrap();
        master
            .deploy_job(agent, &Deployment::of(job.id.clone(), Goal::Start))
            .await
            .unwrap();
    }

    let reported = TaskStatusBuilder::new(job.clone())
        .with_state(TaskState::Starting)
        .build();
    AgentSimulator::new("h1", &store)
        .report_task_status(&reported)
        .await
        .unwrap();

    let status = master.get_job_status(&job.id).await.unwrap().unwrap();
    assert_eq!(status.job, job);
    assert_eq!(
        status.deployed_agents.into_iter().collect::<Vec<_>>(),
        vec!["h1".to_string(), "h2".to_string()]
    );
    assert_eq!(status.task_statuses.len(), 1);
    assert_eq!(status.task_statuses.get("h1"), Some(&reported));
}

#[tokio::test]
async fn test_job_history_sorted_across_agents() {
    let (store, master) = setup();
    let job = TestJobBuilder::new().build();
    master.add_job(&job).await.unwrap();

    let h1 = AgentSimulator::new("h1", &store);
    let h2 = AgentSimulator::new("h2", &store);
    let status = |state| TaskStatusBuilder::new(job.clone()).with_state(state).build();

    h1.record_event(&job.id, 30, &status(TaskState::Running))
        .await
        .unwrap();
    h2.record_event(&job.id, 10, &status(TaskState::PullingImage))
        .await
        .unwrap();
    h1.record_event(&job.id, 20, &status(TaskState::Starting))
        .await
        .unwrap();

    let history = master.get_job_history(&job.id).await.unwrap();
    let timeline: Vec<(i64, &str, TaskState)> = history
        .iter()
        .map(|e| (e.timestamp, e.agent.as_str(), e.status.state))
        .collect();
    assert_eq!(
        timeline,
        vec![
            (10, "h2", TaskState::PullingImage),
            (20, "h1", TaskState::Starting),
            (30, "h1", TaskState::Running),
        ]
    );
}

#[tokio::test]
async fn test_job_history_edge_cases() {
    let (_store, master) = setup();
    let job = TestJobBuilder::new().build();

    let err = master.get_job_history(&job.id).await.unwrap_err();
    assert!(matches!(err, FleetError::JobDoesNotExist { .. }));

    master.add_job(&job).await.unwrap();
    assert!(master.get_job_history(&job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_stored_bytes_surface_as_serialization_error() {
    let (store, master) = setup();
    let job = TestJobBuilder::new().build();
    master.add_job(&job).await.unwrap();

    store
        .set_data(&fleet_core::paths::config_job(&job.id), b"not json".to_vec())
        .await
        .unwrap();
    let err = master.get_job(&job.id).await.unwrap_err();
    assert!(matches!(err, FleetError::Serialization { .. }));
}
