mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::{MockExecutor, MockScheduler, Reply, hosts};
use testbed_bench_workflow::domain::experiment::cibench::{CiBenchConfig, CiBenchEnvironment, CiBenchOptions};
use testbed_bench_workflow::domain::provisioner::reservation::Reservation;
use testbed_bench_workflow::domain::provisioner::scheduler_trait::JobState;
use testbed_bench_workflow::domain::utils::id::JobId;
use testbed_bench_workflow::error::Error;
use testbed_bench_workflow::load_cibench;

const CONFIG: &str = r#"walltime: "01:00:00"
clusters:
  - cluster: paravance
    site: rennes
    n_nodes: 2
"#;

fn write(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("cibench.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

fn environment(options: CiBenchOptions, scheduler: Arc<MockScheduler>, executor: Arc<MockExecutor>) -> CiBenchEnvironment {
    let dir = tempfile::tempdir().unwrap();
    let config = load_cibench(&write(dir.path(), CONFIG), false).unwrap();
    CiBenchEnvironment::new(config, options, scheduler, executor)
}

fn position(commands: &[String], pattern: &str) -> usize {
    commands.iter().position(|c| c.contains(pattern)).unwrap_or_else(|| panic!("{} never ran", pattern))
}

#[tokio::test(start_paused = true)]
async fn nodes_are_configured_in_order_and_released() {
    let scheduler = Arc::new(MockScheduler::new().with_nodes("rennes", &["paravance-1", "paravance-2"]));
    let executor = Arc::new(MockExecutor::new());

    let mut environment = environment(CiBenchOptions::default(), scheduler.clone(), executor.clone());
    let host_set = environment.run().await.unwrap();
    assert_eq!(host_set.hosts(), hosts(&["paravance-1", "paravance-2"]).as_slice());
    assert_eq!(scheduler.submitted.lock().unwrap()[0].1.resources, "{cluster='paravance'}/nodes=2");

    let commands = executor.commands();
    let steps = [
        "sh get-docker.sh",
        "docker pull antidotedb/antidote",
        "docker pull google/cadvisor",
        "apt-get install -y -q --allow-change-held-packages docker-compose",
        "cd ~/ && (test -d antidote || git clone https://github.com/AntidoteDB/antidote.git antidote)",
        "cd ~/antidote && make docker-build",
        "cd ~/ && (test -d CI-bench || git clone https://github.com/AntidoteDB/CI-bench.git CI-bench)",
        "cd ~/CI-bench && docker build --no-cache -t antidote-benchmark .",
    ];
    let positions: Vec<usize> = steps.iter().map(|step| position(&commands, step)).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "steps ran out of order: {:?}", commands);
    assert!(executor.commands.lock().unwrap().iter().all(|(_, targets)| targets.len() == 2));

    assert!(scheduler.deleted().is_empty());
    environment.teardown().await;
    assert_eq!(scheduler.deleted(), vec![JobId::new("1001")]);
}

#[tokio::test(start_paused = true)]
async fn failed_build_is_reported_and_the_job_released() {
    let scheduler = Arc::new(MockScheduler::new().with_nodes("rennes", &["paravance-1", "paravance-2"]));
    let executor = Arc::new(MockExecutor::new());
    executor.on("make docker-build", Reply::fail());

    let mut environment = environment(CiBenchOptions::default(), scheduler.clone(), executor.clone());
    let result = environment.run().await;

    match result {
        Err(Error::RemoteCommandFailure { command, failures }) => {
            assert!(command.contains("make docker-build"));
            assert_eq!(failures.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(executor.count("CI-bench"), 0);

    environment.teardown().await;
    assert_eq!(scheduler.deleted(), vec![JobId::new("1001")]);
}

#[tokio::test(start_paused = true)]
async fn reused_jobs_are_kept_alive() {
    let scheduler = Arc::new(MockScheduler::new().with_nodes("nancy", &["grisou-4"]));
    let executor = Arc::new(MockExecutor::new());
    let options = CiBenchOptions { keep_alive: true, existing_jobs: Some(Reservation::parse_job_ids("42:nancy", true).unwrap()) };

    let mut environment = environment(options, scheduler.clone(), executor.clone());
    let host_set = environment.run().await.unwrap();
    assert_eq!(host_set.hosts(), hosts(&["grisou-4"]).as_slice());
    assert_eq!(scheduler.submissions(), 0);

    environment.teardown().await;
    assert!(scheduler.deleted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn interrupted_wait_still_releases_the_job() {
    let scheduler = Arc::new(MockScheduler::new().with_nodes("rennes", &["paravance-1"]).with_states(vec![JobState::Waiting]));
    let executor = Arc::new(MockExecutor::new());

    let mut environment = environment(CiBenchOptions::default(), scheduler.clone(), executor.clone());
    tokio::select! {
        result = environment.run() => panic!("run ended while the job was waiting: {:?}", result),
        _ = tokio::time::sleep(Duration::from_secs(60)) => {}
    }
    assert!(executor.commands().is_empty());

    environment.teardown().await;
    assert_eq!(scheduler.deleted(), vec![JobId::new("1001")]);
}

#[test]
fn configuration_defaults_and_validation() {
    let dir = tempfile::tempdir().unwrap();
    let config = CiBenchConfig::load(&write(dir.path(), CONFIG)).unwrap();
    assert_eq!(config.provisioner.job_name, "cibench");
    assert_eq!(config.benchmark_image, "antidote-benchmark");
    assert_eq!(config.nodes[0].nodes, 2);

    let shipped = load_cibench(&Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/cibench_g5k.yaml"), true).unwrap();
    assert_eq!(shipped.provisioner.image.as_deref(), Some("debian11-x64-big"));

    for yaml in [CONFIG.replace("n_nodes: 2", "n_nodes: 0"), CONFIG.replace("paravance", "Paravance"), CONFIG.replace("01:00:00", "1h")] {
        assert!(matches!(CiBenchConfig::load(&write(dir.path(), &yaml)), Err(Error::ConfigValidation(_))), "{} was accepted", yaml);
    }
}
