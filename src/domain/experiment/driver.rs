use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::configurator::docker::DockerConfigurator;
use crate::domain::configurator::k8s_resources::K8sResources;
use crate::domain::configurator::kubernetes::KubernetesConfigurator;
use crate::domain::configurator::roles::RoleAssignment;
use crate::domain::experiment::config::ExperimentConfig;
use crate::domain::experiment::run_context::RunContext;
use crate::domain::experiment::statistics::{CombinationOutcome, SweepSummary};
use crate::domain::experiment::workflow::ExperimentWorkflow;
use crate::domain::manifest::workspace::ManifestDir;
use crate::domain::provisioner::provisioner::Provisioner;
use crate::domain::provisioner::reservation::Reservation;
use crate::domain::provisioner::scheduler_trait::TestbedScheduler;
use crate::domain::remote::executor::CommandExecutor;
use crate::domain::remote::transfer::FileTransfer;
use crate::domain::sweeper::param_sweeper::{ParamSweeper, SweepStats};
use crate::domain::utils::id::HostName;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    Provisioned,
    ClusterReady,
    SweepIteration,
    Done,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Init => "INIT",
            DriverState::Provisioned => "PROVISIONED",
            DriverState::ClusterReady => "CLUSTER_READY",
            DriverState::SweepIteration => "SWEEP_ITERATION",
            DriverState::Done => "DONE",
        };
        write!(f, "{}", name)
    }
}

/// Command-line choices that change how the environment is acquired.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub keep_alive: bool,
    /// Reservation to adopt instead of submitting new jobs.
    pub existing_jobs: Option<Reservation>,
    /// Control plane of an already configured cluster. Cluster setup is skipped when set.
    pub kube_master: Option<HostName>,
}

/// Runs one full experiment: provision, configure, sweep, release.
#[derive(Debug)]
pub struct ExperimentDriver {
    config: Arc<ExperimentConfig>,
    options: DriverOptions,
    provisioner: Provisioner,
    executor: Arc<dyn CommandExecutor>,
    transfer: Arc<dyn FileTransfer>,
    state: DriverState,
    /// Lease to release on teardown.
    reservation: Option<Reservation>,
}

impl ExperimentDriver {
    pub fn new(
        config: Arc<ExperimentConfig>,
        options: DriverOptions,
        scheduler: Arc<dyn TestbedScheduler>,
        executor: Arc<dyn CommandExecutor>,
        transfer: Arc<dyn FileTransfer>,
    ) -> Self {
        let provisioner = Provisioner::new(scheduler, config.provisioner.clone());
        Self { config, options, provisioner, executor, transfer, state: DriverState::Init, reservation: None }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    fn transition(&mut self, state: DriverState) {
        if self.state != state {
            log::info!("Driver state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Sweeps every remaining combination and releases the reservation when done.
    ///
    /// A failing combination is cancelled and the sweep goes on. Provisioning and cluster
    /// setup failures are returned; call [`ExperimentDriver::teardown`] afterwards, also
    /// when the returned future is dropped before completion. A liveness check that
    /// fails is logged and the reservation is kept.
    pub async fn run(&mut self) -> Result<SweepStats> {
        let mut sweeper = ParamSweeper::create(&self.config.parameters, &self.config.sweep_dir())?;
        if sweeper.get_remaining() == 0 {
            log::info!("Every combination already ran, nothing to do");
        }
        let workflow = ExperimentWorkflow::new(self.config.clone())?;
        let mut summary = SweepSummary::open(&self.config.results_dir)?;

        let mut context: Option<RunContext> = None;
        while sweeper.get_remaining() > 0 {
            let ctx = match context.take() {
                Some(ctx) => ctx,
                None => self.setup_env().await?,
            };

            let combination = sweeper.get_next()?;
            self.transition(DriverState::SweepIteration);
            log::info!("==========================================================");
            log::info!("Performing combination {}", combination.slug());

            let started = Instant::now();
            match workflow.run(&ctx, &combination).await {
                Ok(results) => {
                    sweeper.done(&combination)?;
                    summary.record(&combination, CombinationOutcome::Done, started.elapsed(), None)?;
                    log::info!("Finished combination {}, results in {}", combination.slug(), results.display());
                }
                Err(e) => {
                    sweeper.cancel(&combination)?;
                    summary.record(&combination, CombinationOutcome::Cancelled, started.elapsed(), Some(&e.to_string()))?;
                    log::warn!("Combination {} is cancelled: {}", combination.slug(), e);
                }
            }
            log::info!("{} combination(s) remaining", sweeper.get_remaining());
            log::info!("==========================================================");

            match self.provisioner.is_job_alive(&ctx.reservation).await {
                Ok(true) => context = Some(ctx),
                Ok(false) => {
                    log::warn!("Reservation {} is no longer alive, provisioning again", ctx.reservation);
                    self.provisioner.release(&ctx.reservation).await;
                    self.reservation = None;
                }
                Err(e) => {
                    log::warn!("Could not check reservation {}, keeping it: {}", ctx.reservation, e);
                    context = Some(ctx);
                }
            }
        }

        let stats = sweeper.stats();
        log::info!("Sweep finished: {} done, {} cancelled out of {}", stats.done, stats.cancelled, stats.total);
        self.transition(DriverState::Done);
        self.teardown().await;
        Ok(stats)
    }

    /// Releases the current reservation unless it must be kept alive.
    pub async fn teardown(&mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        if self.options.keep_alive {
            log::info!("Reservation {} is kept alive for inspection", reservation);
        } else {
            log::info!("Releasing reservation {}", reservation);
            self.provisioner.release(&reservation).await;
        }
    }

    async fn setup_env(&mut self) -> Result<RunContext> {
        log::info!("Setting up the experiment environment");
        let requests = self.config.node_requests();
        let existing = self.options.existing_jobs.take();
        let reservation = self.provisioner.acquire(&requests, existing, self.options.keep_alive).await?;
        // Recorded before waiting so an interrupted wait still releases the jobs.
        self.reservation = Some(reservation.clone());
        let hosts = self.provisioner.prepare_hosts(&reservation).await?;
        self.transition(DriverState::Provisioned);
        log::info!("{} host(s) provisioned: {:?}", hosts.len(), hosts.hosts());

        let external_master = self.options.kube_master.take();
        let master = match &external_master {
            Some(master) => master.clone(),
            None => hosts.first_of_cluster(&self.config.master_cluster).cloned().ok_or_else(|| {
                Error::ConfigValidation(format!("No host of cluster {} to run the control plane", self.config.master_cluster))
            })?,
        };

        let assignment = RoleAssignment::compute(hosts.hosts(), &master, &self.config.cluster_names(), self.config.role_counts);
        assignment.validate()?;

        let k8s = K8sResources::new(self.executor.clone(), self.transfer.clone(), master.clone());
        let kubernetes = KubernetesConfigurator::new(self.executor.clone(), self.transfer.clone(), self.config.kubernetes.clone());

        if external_master.is_some() {
            log::info!("Using the configured cluster of control plane {}", master);
        } else {
            DockerConfigurator::new(self.executor.clone()).config_docker(hosts.hosts()).await?;
            kubernetes.deploy_cluster(hosts.hosts(), &master, &k8s).await?;
            k8s.create_namespace(&self.config.namespace).await?;

            let volumes = ManifestDir::open(&self.config.volume_dir)?;
            kubernetes.setup_local_volumes(&hosts.without(&master), &volumes, &k8s).await?;
            assignment.apply_labels(&k8s).await?;
        }
        kubernetes.fetch_credentials(&master, &self.config.credentials_dir()).await?;

        self.transition(DriverState::ClusterReady);
        log::info!("Kubernetes control plane: {}", master);
        Ok(RunContext {
            reservation,
            hosts,
            assignment,
            k8s,
            executor: self.executor.clone(),
            transfer: self.transfer.clone(),
            namespace: self.config.namespace.clone(),
        })
    }
}
