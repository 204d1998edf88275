use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::configurator::readiness::ReadinessCondition;
use crate::domain::configurator::roles::Role;
use crate::domain::experiment::config::{CONCURRENCY_PARAM, ExperimentConfig};
use crate::domain::experiment::run_context::RunContext;
use crate::domain::manifest::builders::{
    ClientConfigParams, EnvVar, ExposerServiceParams, JobParams, NodeSelector, SERVICE_LABEL, StatefulSetParams,
};
use crate::domain::manifest::template::Template;
use crate::domain::manifest::workspace::ManifestDir;
use crate::domain::sweeper::combination::Combination;
use crate::domain::utils::id::{ClusterName, HostName};
use crate::error::{Error, Result};

pub const ANTIDOTE_PORT: u16 = 8087;
pub const FMKE_PORT: u16 = 9090;
pub const CLIENT_CONFIG_TEMPLATE: &str = "fmke_client.config.template";
pub const REMOTE_RESULTS_DIR: &str = "/tmp/results";
const REMOTE_CLIENT_CONFIG_DIR: &str = "/tmp/fmke_client";
const HEADLESS_SERVICE: &str = "headlessService.yaml";

lazy_static! {
    static ref LOAD_DURATION: Regex = Regex::new(r"\{\s*duration\s*,\s*(\d+)\s*\}").expect("duration pattern is valid");
}

/// Load duration declared by the client config template (`{duration, N}.`, in minutes).
pub fn load_duration(template: &Template) -> Result<Duration> {
    let caps = LOAD_DURATION
        .captures(template.body())
        .ok_or_else(|| Error::ConfigValidation(format!("{} declares no {{duration, N}} entry", template.path().display())))?;
    let minutes: u64 = caps[1].parse().map_err(|_| Error::ConfigValidation(format!("Invalid load duration '{}'", &caps[1])))?;
    Ok(Duration::from_secs(minutes * 60))
}

/// Database pods of one testbed cluster, ordered by ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCenter {
    pub cluster: ClusterName,
    pub pods: Vec<String>,
}

impl DataCenter {
    /// Groups `antidote-<cluster>-<ordinal>` pods by cluster. Every cluster of `clusters`
    /// must own at least one pod.
    pub fn group(pods: &[String], clusters: &[ClusterName]) -> Result<Vec<DataCenter>> {
        let mut by_cluster: BTreeMap<String, Vec<(usize, String)>> = BTreeMap::new();
        for pod in pods {
            let parsed = pod.strip_prefix("antidote-").and_then(|rest| rest.rsplit_once('-'));
            match parsed.and_then(|(cluster, ordinal)| ordinal.parse::<usize>().ok().map(|n| (cluster, n))) {
                Some((cluster, ordinal)) => by_cluster.entry(cluster.to_string()).or_default().push((ordinal, pod.clone())),
                None => log::warn!("Ignoring pod {} outside the database naming scheme", pod),
            }
        }

        clusters
            .iter()
            .map(|cluster| {
                let mut pods = by_cluster.remove(cluster.as_str()).unwrap_or_default();
                if pods.is_empty() {
                    return Err(Error::ResourceFailed { name: format!("antidote-{}", cluster), reason: "no database pod is running".to_string() });
                }
                pods.sort();
                Ok(DataCenter { cluster: cluster.clone(), pods: pods.into_iter().map(|(_, pod)| pod).collect() })
            })
            .collect()
    }

    /// `<first pod>.antidote:8087`, the address the DC is created and linked through.
    pub fn master_address(&self) -> String {
        format!("{}.antidote:{}", self.pods[0], ANTIDOTE_PORT)
    }

    pub fn exposer_name(&self) -> String {
        format!("antidote-exposer-{}", self.cluster)
    }
}

/// The deploy, load and collect stages of one sweep iteration.
#[derive(Debug)]
pub struct ExperimentWorkflow {
    config: Arc<ExperimentConfig>,
    antidote: ManifestDir,
    fmke: ManifestDir,
}

impl ExperimentWorkflow {
    pub fn new(config: Arc<ExperimentConfig>) -> Result<Self> {
        let antidote = ManifestDir::open(&config.antidote_dir)?;
        let fmke = ManifestDir::open(&config.fmke_dir)?;
        // Fail before provisioning when the client config is unusable.
        load_duration(&fmke.template(CLIENT_CONFIG_TEMPLATE)?)?;
        Ok(Self { config, antidote, fmke })
    }

    /// Runs every stage for `combination` and returns the directory holding its results.
    pub async fn run(&self, ctx: &RunContext, combination: &Combination) -> Result<PathBuf> {
        log::info!("1. Cleaning resources of the previous run");
        self.clean_resources(ctx).await?;

        log::info!("2. Deploying the database");
        let data_centers = self.deploy_database(ctx).await?;

        log::info!("3. Deploying the application");
        self.deploy_application(ctx, &data_centers).await?;

        log::info!("4. Running the load");
        self.run_load(ctx, combination).await?;

        log::info!("5. Collecting results");
        self.collect_results(ctx, combination).await
    }

    fn clusters(&self) -> Vec<ClusterName> {
        self.config.cluster_names()
    }

    async fn client_hosts(&self, ctx: &RunContext) -> Result<Vec<HostName>> {
        ctx.k8s.nodes_with_label(SERVICE_LABEL, Role::Client.label()).await
    }

    pub async fn clean_resources(&self, ctx: &RunContext) -> Result<()> {
        ctx.k8s.reset_namespace(&ctx.namespace).await?;

        let clients = self.client_hosts(ctx).await?;
        if !clients.is_empty() {
            ctx.executor.run(&format!("rm -rf {dir} && mkdir -p {dir}", dir = REMOTE_RESULTS_DIR), &clients).await?;
        }
        Ok(())
    }

    pub async fn deploy_database(&self, ctx: &RunContext) -> Result<Vec<DataCenter>> {
        let ns = ctx.namespace.as_str();
        let timeout = self.config.timeouts.readiness;
        self.antidote.purge_generated(&["statefulSet_", "createDC_", "exposer-service_", "connectDCs_antidote"])?;

        let mut files = vec![self.antidote.static_file(HEADLESS_SERVICE)?];
        for cluster in self.clusters() {
            let params = StatefulSetParams {
                name: format!("antidote-{}", cluster),
                replicas: self.config.role_counts.database,
                node_selector: NodeSelector::service_in_cluster(Role::Database.label(), cluster.as_str()),
                env: Vec::new(),
            };
            files.push(self.antidote.render("statefulSet.yaml.template", &params, &format!("statefulSet_{}.yaml", cluster))?);
        }
        ctx.k8s.deploy(&files, Some(ns)).await?;
        ctx.k8s.wait_ready("app=antidote", ReadinessCondition::PodReady, timeout, ns).await?;

        let pods = ctx.k8s.pods_with_label("app=antidote", ns).await?;
        let data_centers = DataCenter::group(&pods, &self.clusters())?;

        let mut files = Vec::new();
        for dc in &data_centers {
            let mut args = vec!["--createDc".to_string(), dc.master_address()];
            args.extend(dc.pods.iter().map(|pod| format!("antidote@{}.antidote", pod)));
            let create_dc = JobParams::single(format!("createdc-{}", dc.cluster), args);
            files.push(self.antidote.render("createDC.yaml.template", &create_dc, &format!("createDC_{}.yaml", dc.cluster))?);

            let exposer = ExposerServiceParams { name: dc.exposer_name(), pod_name: dc.pods[0].clone() };
            files.push(self.antidote.render("exposer-service.yaml.template", &exposer, &format!("exposer-service_{}.yaml", dc.cluster))?);
        }
        log::info!("Creating {} data center(s)", data_centers.len());
        ctx.k8s.deploy(&files, Some(ns)).await?;
        ctx.k8s.wait_ready("app=antidote", ReadinessCondition::JobComplete, timeout, ns).await?;

        let mut args = vec!["--connectDcs".to_string()];
        args.extend(data_centers.iter().map(DataCenter::master_address));
        let connect = self.antidote.render("connectDCs.yaml.template", &JobParams::single("connectdcs-antidote", args), "connectDCs_antidote.yaml")?;
        log::info!("Connecting the data centers");
        ctx.k8s.deploy(&[connect], Some(ns)).await?;
        ctx.k8s.wait_ready("app=antidote", ReadinessCondition::JobComplete, timeout, ns).await?;

        Ok(data_centers)
    }

    pub async fn deploy_application(&self, ctx: &RunContext, data_centers: &[DataCenter]) -> Result<()> {
        let ns = ctx.namespace.as_str();
        self.fmke.purge_generated(&["statefulSet_fmke_", "populate_data"])?;

        let mut files = vec![self.fmke.static_file(HEADLESS_SERVICE)?];
        for dc in data_centers {
            let database = ctx.k8s.service_ip(&dc.exposer_name(), ns).await?;
            let params = StatefulSetParams {
                name: format!("fmke-{}", dc.cluster),
                replicas: self.config.role_counts.application,
                node_selector: NodeSelector::service_in_cluster(Role::Application.label(), dc.cluster.as_str()),
                env: vec![EnvVar { name: "DATABASE_ADDRESSES".to_string(), value: database }],
            };
            files.push(self.fmke.render("statefulSet_fmke.yaml.template", &params, &format!("statefulSet_fmke_{}.yaml", dc.cluster))?);
        }
        ctx.k8s.deploy(&files, Some(ns)).await?;
        ctx.k8s.wait_ready("app=fmke", ReadinessCondition::PodReady, self.config.timeouts.readiness, ns).await?;

        let mut node_names = Vec::new();
        for pod in self.application_pods() {
            let logs = ctx.k8s.pod_logs(&pod, ns).await?;
            let node_name = logs
                .lines()
                .filter(|line| line.contains("NODE_NAME"))
                .find_map(|line| line.split_whitespace().nth(1))
                .ok_or_else(|| Error::ResourceFailed { name: pod.clone(), reason: "no NODE_NAME in the pod logs".to_string() })?;
            node_names.push(node_name.to_string());
        }

        let phases: [(&str, &[&str]); 2] = [
            ("populate-data-without-prescriptions", &["-f", "--noprescriptions"]),
            ("populate-data-with-onlyprescriptions", &["-f", "--onlyprescriptions", "-p", "1"]),
        ];
        for (name, flags) in phases {
            let mut args: Vec<String> = flags.iter().map(|flag| flag.to_string()).collect();
            args.extend(node_names.iter().cloned());
            let populate = self.fmke.render("populate_data.yaml.template", &JobParams::single(name, args), "populate_data.yaml")?;

            log::info!("Populating data: {}", name);
            ctx.k8s.deploy(&[populate], Some(ns)).await?;
            ctx.k8s.wait_ready("app=fmke_pop", ReadinessCondition::JobComplete, self.config.timeouts.populate, ns).await?;
        }
        Ok(())
    }

    /// `fmke-<cluster>-<ordinal>` for every application replica.
    fn application_pods(&self) -> Vec<String> {
        self.clusters()
            .iter()
            .flat_map(|cluster| (0..self.config.role_counts.application).map(move |i| format!("fmke-{}-{}", cluster, i)))
            .collect()
    }

    pub async fn run_load(&self, ctx: &RunContext, combination: &Combination) -> Result<()> {
        let ns = ctx.namespace.as_str();
        let concurrency = combination
            .get_int(CONCURRENCY_PARAM)
            .ok_or_else(|| Error::ConfigValidation(format!("Combination {} has no {}", combination, CONCURRENCY_PARAM)))?;
        self.fmke.purge_generated(&["create_fmke_client_", "fmke_client_"])?;

        let clients = self.client_hosts(ctx).await?;
        if clients.is_empty() {
            return Err(Error::ResourceFailed { name: Role::Client.label().to_string(), reason: "no node carries the client label".to_string() });
        }
        ctx.executor.run(&format!("mkdir -p {}", REMOTE_CLIENT_CONFIG_DIR), &clients).await?;

        let mut files = Vec::new();
        for cluster in self.clusters() {
            let mut addresses = Vec::new();
            for i in 0..self.config.role_counts.application {
                addresses.push(ctx.k8s.pod_ip(&format!("fmke-{}-{}", cluster, i), ns).await?);
            }
            let client_config = ClientConfigParams { addresses, port: FMKE_PORT, concurrency: concurrency as usize };
            let config_file = self.fmke.render(CLIENT_CONFIG_TEMPLATE, &client_config, &format!("fmke_client_{}.config", cluster))?;
            ctx.transfer.put(&clients, &[config_file], REMOTE_CLIENT_CONFIG_DIR).await?;

            let count = self.config.role_counts.client;
            let job = JobParams {
                name: format!("fmke-client-{}", cluster),
                parallelism: count,
                completions: count,
                args: Vec::new(),
                node_selector: NodeSelector::service_in_cluster(Role::Client.label(), cluster.as_str()),
                post_start_command: vec![
                    "cp".to_string(),
                    format!("/cluster_node/fmke_client_{}.config", cluster),
                    "/fmke_client/fmke_client.config".to_string(),
                ],
            };
            files.push(self.fmke.render("create_fmke_client.yaml.template", &job, &format!("create_fmke_client_{}.yaml", cluster))?);
        }

        ctx.k8s.deploy(&files, Some(ns)).await?;
        let duration = load_duration(&self.fmke.template(CLIENT_CONFIG_TEMPLATE)?)?;
        log::info!("Stressing the database for {} minute(s) with {} concurrent client(s)", duration.as_secs() / 60, concurrency);
        ctx.k8s.wait_ready("app=fmke-client", ReadinessCondition::JobComplete, duration + self.config.timeouts.client_grace, ns).await
    }

    /// Pulls the client results into `<results_dir>/<combination slug>/<host>/`.
    pub async fn collect_results(&self, ctx: &RunContext, combination: &Combination) -> Result<PathBuf> {
        let target = self.config.results_dir.join(combination.slug());
        std::fs::create_dir_all(&target)?;

        let clients = self.client_hosts(ctx).await?;
        ctx.transfer.get(&clients, &[format!("{}/", REMOTE_RESULTS_DIR)], &target).await?;
        log::info!("Results of {} host(s) stored in {}", clients.len(), target.display());
        Ok(target)
    }
}
