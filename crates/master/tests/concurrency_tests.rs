use std::sync::Arc;

use fleet_core::models::{Deployment, Goal, Job};
use fleet_core::paths;
use fleet_core::traits::{CoordinationStore, Op, StoreError};
use fleet_core::FleetError;
use fleet_master::{CoordinatedMasterModel, MasterModel, RetryPolicy};
use fleet_testing_utils::{shared_store, FaultInjectingStore, TestJobBuilder, TransactionHook};
use futures::future::BoxFuture;

struct Fixture {
    inner: Arc<dyn CoordinationStore>,
    faults: Arc<FaultInjectingStore>,
    master: CoordinatedMasterModel,
}

async fn fixture(jobs: &[&Job]) -> Fixture {
    let (_store, inner) = shared_store();
    let faults = Arc::new(FaultInjectingStore::new(Arc::clone(&inner)));
    let handle: Arc<dyn CoordinationStore> = faults.clone();
    let master = CoordinatedMasterModel::with_retry_policy(handle, RetryPolicy::immediate(3));

    // 准备数据不经过故障注入
    let setup = CoordinatedMasterModel::new(Arc::clone(&inner));
    setup.add_agent("h1").await.unwrap();
    for job in jobs {
        setup.add_job(job).await.unwrap();
    }

    Fixture {
        inner,
        faults,
        master,
    }
}

/// 在第一次提交前，由另一个 master 执行 `action`
fn before_first_commit<F>(action: F) -> TransactionHook
where
    F: Fn(CoordinatedMasterModel) -> BoxFuture<'static, ()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(
        move |inner: Arc<dyn CoordinationStore>, count: usize| -> BoxFuture<'static, ()> {
            if count == 1 {
                action(CoordinatedMasterModel::new(inner))
            } else {
                Box::pin(async {})
            }
        },
    )
}

#[tokio::test]
async fn test_job_deleted_between_read_and_commit() {
    let job = TestJobBuilder::new().build();
    let fx = fixture(&[&job]).await;

    let id = job.id.clone();
    let hook: TransactionHook = Arc::new(
        move |inner: Arc<dyn CoordinationStore>, count: usize| -> BoxFuture<'static, ()> {
            let id = id.clone();
            Box::pin(async move {
                if count == 1 {
                    inner
                        .transaction(vec![
                            Op::delete(paths::config_job_agents(&id)),
                            Op::delete(paths::config_job_ref_short(&id)),
                            Op::delete(paths::config_job(&id)),
                        ])
                        .await
                        .unwrap();
                }
            })
        },
    );
    fx.faults.on_transaction(hook);

    let err = fx
        .master
        .deploy_job("h1", &Deployment::of(job.id.clone(), Goal::Start))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::JobDoesNotExist { .. }));
    assert!(fx
        .inner
        .stat(&paths::config_agent_job("h1", &job.id))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_agent_removed_between_read_and_commit() {
    let job = TestJobBuilder::new().build();
    let fx = fixture(&[&job]).await;

    fx.faults.on_transaction(before_first_commit(|other| -> BoxFuture<'static, ()> {
        Box::pin(async move {
            other.remove_agent("h1").await.unwrap();
        })
    }));

    let err = fx
        .master
        .deploy_job("h1", &Deployment::of(job.id.clone(), Goal::Start))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::AgentDoesNotExist { .. }));
}

#[tokio::test]
async fn test_transient_contention_is_retried() {
    let job = TestJobBuilder::new().build();
    let fx = fixture(&[&job]).await;

    fx.faults
        .fail_next_transaction(StoreError::bad_version(paths::config_agent_job("h1", &job.id)));

    let deployment = Deployment::of(job.id.clone(), Goal::Start);
    fx.master.deploy_job("h1", &deployment).await.unwrap();

    assert_eq!(fx.faults.transaction_count(), 2);
    assert_eq!(
        fx.master.get_deployment("h1", &job.id).await.unwrap(),
        Some(deployment)
    );
}

#[tokio::test]
async fn test_persistent_contention_exhausts_retries() {
    let job = TestJobBuilder::new().build();
    let fx = fixture(&[&job]).await;

    for _ in 0..3 {
        fx.faults
            .fail_next_transaction(StoreError::no_node(paths::config_job(&job.id)));
    }

    let err = fx
        .master
        .deploy_job("h1", &Deployment::of(job.id.clone(), Goal::Start))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::DeployRetriesExhausted { attempts: 3 }));
    assert!(err.is_retryable());
    assert_eq!(fx.faults.transaction_count(), 3);
    assert!(fx.master.get_deployment("h1", &job.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_competing_master_deploys_same_job() {
    let job = TestJobBuilder::new().build();
    let fx = fixture(&[&job]).await;

    let id = job.id.clone();
    fx.faults.on_transaction(before_first_commit(move |other| -> BoxFuture<'static, ()> {
        let id = id.clone();
        Box::pin(async move {
            other
                .deploy_job("h1", &Deployment::of(id, Goal::Start))
                .await
                .unwrap();
        })
    }));

    let err = fx
        .master
        .deploy_job("h1", &Deployment::of(job.id.clone(), Goal::Start))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::JobAlreadyDeployed { .. }));
}

#[tokio::test]
async fn test_competing_master_claims_port() {
    let ours = TestJobBuilder::new()
        .with_name("ours")
        .with_static_port(8080)
        .build();
    let theirs = TestJobBuilder::new()
        .with_name("theirs")
        .with_static_port(8080)
        .build();
    let fx = fixture(&[&ours, &theirs]).await;

    let their_id = theirs.id.clone();
    fx.faults.on_transaction(before_first_commit(move |other| -> BoxFuture<'static, ()> {
        let id = their_id.clone();
        Box::pin(async move {
            other
                .deploy_job("h1", &Deployment::of(id, Goal::Start))
                .await
                .unwrap();
        })
    }));

    let err = fx
        .master
        .deploy_job("h1", &Deployment::of(ours.id.clone(), Goal::Start))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FleetError::PortAllocationConflict { ref conflicting_job_id, port: 8080, .. }
            if *conflicting_job_id == theirs.id
    ));
}

#[tokio::test]
async fn test_parallel_deploys_claim_port_once() {
    let jobs: Vec<Job> = (0..8)
        .map(|i| {
            TestJobBuilder::new()
                .with_name(&format!("job{i}"))
                .with_static_port(8080)
                .build()
        })
        .collect();
    let refs: Vec<&Job> = jobs.iter().collect();
    let fx = fixture(&refs).await;
    let master = Arc::new(CoordinatedMasterModel::new(Arc::clone(&fx.inner)));

    let handles: Vec<_> = jobs
        .iter()
        .map(|job| {
            let master = Arc::clone(&master);
            let deployment = Deployment::of(job.id.clone(), Goal::Start);
            tokio::spawn(async move { master.deploy_job("h1", &deployment).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(FleetError::PortAllocationConflict { port, .. }) => assert_eq!(port, 8080),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(succeeded, 1);
}
