mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockScheduler, hosts};
use testbed_bench_workflow::domain::provisioner::provisioner::{Provisioner, ProvisionerSettings};
use testbed_bench_workflow::domain::provisioner::reservation::NodeRequest;
use testbed_bench_workflow::domain::provisioner::scheduler_trait::JobState;
use testbed_bench_workflow::domain::utils::backoff::Backoff;
use testbed_bench_workflow::domain::utils::id::{ClusterName, JobId, SiteName};
use testbed_bench_workflow::error::Error;

fn settings() -> ProvisionerSettings {
    ProvisionerSettings {
        resolve_timeout: Duration::from_secs(60),
        deploy_timeout: Duration::from_secs(60),
        job_state_timeout: Duration::from_secs(10),
        backoff: Backoff::constant(Duration::from_secs(5)),
        ..ProvisionerSettings::default()
    }
}

fn request(cluster: &str, site: &str, nodes: usize) -> NodeRequest {
    NodeRequest { cluster: ClusterName::new(cluster), site: SiteName::new(site), nodes }
}

fn two_sites() -> Vec<NodeRequest> {
    vec![request("paravance", "rennes", 3), request("parasilo", "rennes", 2), request("ecotype", "nantes", 2)]
}

#[tokio::test(start_paused = true)]
async fn one_job_per_site() {
    let scheduler = Arc::new(MockScheduler::new());
    let provisioner = Provisioner::new(scheduler.clone(), settings());

    let reservation = provisioner.reserve(&two_sites(), false).await.unwrap();
    assert_eq!(reservation.jobs.len(), 2);

    let submitted = scheduler.submitted.lock().unwrap().clone();
    assert_eq!(submitted[0].0, SiteName::new("nantes"));
    assert_eq!(submitted[0].1.resources, "{cluster='ecotype'}/nodes=2");
    assert_eq!(submitted[1].0, SiteName::new("rennes"));
    assert_eq!(submitted[1].1.resources, "{cluster='paravance'}/nodes=3+{cluster='parasilo'}/nodes=2");
    assert!(!submitted[1].1.deploy);
}

#[tokio::test(start_paused = true)]
async fn rejected_site_releases_jobs_already_submitted() {
    let scheduler = Arc::new(MockScheduler::new().rejecting("rennes"));
    let provisioner = Provisioner::new(scheduler.clone(), settings());

    let result = provisioner.reserve(&two_sites(), false).await;
    assert!(matches!(result, Err(Error::SchedulingFailure(_))));
    assert_eq!(scheduler.deleted(), vec![JobId::new("1001")]);
}

#[tokio::test(start_paused = true)]
async fn waits_until_the_job_runs() {
    let scheduler = Arc::new(
        MockScheduler::new()
            .with_nodes("rennes", &["paravance-1", "paravance-2", "paravance-3"])
            .with_states(vec![JobState::Waiting, JobState::Launching, JobState::Running]),
    );
    let provisioner = Provisioner::new(scheduler.clone(), settings());

    let (reservation, host_set) = provisioner.provision(&[request("paravance", "rennes", 3)], None, false).await.unwrap();
    assert_eq!(reservation.jobs.len(), 1);
    assert_eq!(host_set.hosts(), hosts(&["paravance-1", "paravance-2", "paravance-3"]).as_slice());
    assert!(scheduler.deleted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn errored_job_fails_and_is_released() {
    let scheduler = Arc::new(MockScheduler::new().with_nodes("rennes", &["paravance-1"]).with_states(vec![JobState::Waiting, JobState::Error]));
    let provisioner = Provisioner::new(scheduler.clone(), settings());

    let result = provisioner.provision(&[request("paravance", "rennes", 1)], None, false).await;
    assert!(matches!(result, Err(Error::SchedulingFailure(_))));
    assert_eq!(scheduler.deleted(), vec![JobId::new("1001")]);
}

#[tokio::test(start_paused = true)]
async fn job_that_never_runs_times_out() {
    let scheduler = Arc::new(MockScheduler::new().with_states(vec![JobState::Waiting]));
    let provisioner = Provisioner::new(scheduler.clone(), settings());

    let started = tokio::time::Instant::now();
    let result = provisioner.provision(&[request("paravance", "rennes", 1)], None, true).await;
    assert!(matches!(result, Err(Error::ProvisioningTimeout { .. })));
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(scheduler.deleted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn liveness_follows_job_state() {
    let scheduler = Arc::new(MockScheduler::new().with_nodes("rennes", &["paravance-1"]));
    let provisioner = Provisioner::new(scheduler.clone(), settings());
    let (reservation, _) = provisioner.provision(&[request("paravance", "rennes", 1)], None, false).await.unwrap();

    assert!(provisioner.is_job_alive(&reservation).await.unwrap());

    *scheduler.states.lock().unwrap() = vec![JobState::Terminated].into();
    assert!(!provisioner.is_job_alive(&reservation).await.unwrap());

    *scheduler.states.lock().unwrap() = vec![JobState::Error].into();
    assert!(!provisioner.is_job_alive(&reservation).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn deploy_keeps_only_hosts_that_came_up() {
    let mut scheduler = MockScheduler::new().with_nodes("rennes", &["paravance-1", "paravance-2", "paravance-3"]);
    scheduler.failing_deploys = hosts(&["paravance-2"]);
    let scheduler = Arc::new(scheduler);
    let provisioner = Provisioner::new(scheduler.clone(), ProvisionerSettings { image: Some("debian11-nfs".to_string()), ..settings() });

    let (_, host_set) = provisioner.provision(&[request("paravance", "rennes", 3)], None, false).await.unwrap();
    assert_eq!(host_set.hosts(), hosts(&["paravance-1", "paravance-3"]).as_slice());
    assert!(scheduler.submitted.lock().unwrap()[0].1.deploy);
}
