mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{MockExecutor, MockTransfer, hosts};
use testbed_bench_workflow::domain::configurator::k8s_resources::K8sResources;
use testbed_bench_workflow::domain::configurator::roles::{Role, RoleAssignment, RoleCounts, RoleShortfall};
use testbed_bench_workflow::domain::utils::id::{ClusterName, HostName};
use testbed_bench_workflow::error::Error;

fn clusters(names: &[&str]) -> Vec<ClusterName> {
    names.iter().map(|n| ClusterName::new(*n)).collect()
}

#[test]
fn workers_are_partitioned_disjointly_per_cluster() {
    let all = hosts(&["paravance-1", "paravance-2", "paravance-3", "paravance-4", "paravance-5", "ecotype-1", "ecotype-2", "ecotype-3", "ecotype-4"]);
    let master = HostName::new("paravance-1");
    let counts = RoleCounts { database: 2, application: 1, client: 1 };

    let assignment = RoleAssignment::compute(&all, &master, &clusters(&["paravance", "ecotype"]), counts);
    assignment.validate().unwrap();
    assert!(assignment.shortfalls().is_empty());
    assert_eq!(assignment.role_of(&master), None);

    let mut seen = HashSet::new();
    for (cluster, group) in assignment.groups() {
        for role in Role::ALL {
            assert_eq!(group.hosts(role).len(), counts.of(role), "{} in {}", role, cluster);
            for host in group.hosts(role) {
                assert_eq!(&host.cluster(), cluster);
                assert!(seen.insert(host.clone()), "{} holds two roles", host);
            }
        }
    }
    assert_eq!(seen.len(), 8);

    let paravance = assignment.group(&ClusterName::new("paravance")).unwrap();
    assert_eq!(paravance.hosts(Role::Database), hosts(&["paravance-2", "paravance-3"]).as_slice());
    assert_eq!(paravance.hosts(Role::Client), hosts(&["paravance-5"]).as_slice());
}

#[test]
fn short_cluster_gets_a_partial_assignment_that_fails_validation() {
    let all = hosts(&["paravance-1", "paravance-2", "paravance-3", "paravance-4"]);
    let master = HostName::new("paravance-1");
    let counts = RoleCounts { database: 2, application: 0, client: 2 };

    let assignment = RoleAssignment::compute(&all, &master, &clusters(&["paravance"]), counts);
    let group = assignment.group(&ClusterName::new("paravance")).unwrap();
    assert_eq!(group.hosts(Role::Database), hosts(&["paravance-2", "paravance-3"]).as_slice());
    assert_eq!(group.hosts(Role::Client), hosts(&["paravance-4"]).as_slice());

    assert_eq!(
        assignment.shortfalls(),
        vec![RoleShortfall { cluster: ClusterName::new("paravance"), role: Role::Client, wanted: 2, assigned: 1 }]
    );
    assert!(matches!(assignment.validate(), Err(Error::ConfigValidation(_))));
}

#[test]
fn configured_cluster_without_hosts_is_a_shortfall() {
    let all = hosts(&["paravance-1", "paravance-2"]);
    let counts = RoleCounts { database: 1, application: 0, client: 0 };
    let assignment = RoleAssignment::compute(&all, &HostName::new("paravance-1"), &clusters(&["paravance", "ecotype"]), counts);

    let shortfalls = assignment.shortfalls();
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0].cluster, ClusterName::new("ecotype"));
}

#[tokio::test]
async fn labels_carry_cluster_and_role() {
    let executor = Arc::new(MockExecutor::new());
    let k8s = K8sResources::new(executor.clone(), Arc::new(MockTransfer::new()), HostName::new("paravance-1"));
    let all = hosts(&["paravance-1", "paravance-2", "paravance-3", "paravance-4"]);
    let counts = RoleCounts { database: 1, application: 1, client: 0 };

    let assignment = RoleAssignment::compute(&all, &HostName::new("paravance-1"), &clusters(&["paravance"]), counts);
    assignment.apply_labels(&k8s).await.unwrap();

    let commands = executor.commands();
    assert!(commands.contains(&"kubectl label node paravance-2 service_g5k=antidote --overwrite".to_string()));
    assert!(commands.contains(&"kubectl label node paravance-3 service_g5k=fmke --overwrite".to_string()));
    assert!(commands.contains(&"kubectl label node paravance-4 cluster_g5k=paravance --overwrite".to_string()));
    assert_eq!(executor.count("service_g5k="), 2);
    assert_eq!(executor.count("paravance-1 "), 0);
}
