use rstest::rstest;
use tracing_test::traced_test;

use super::group;
use crate::config::Config;
use crate::topology::Topology;

#[rstest]
fn test_build_positional_names() {
    let topology = Topology::build(&Config { deployments: vec![group(2, 3, 4, 5, "emojivoto")] });

    assert_eq!(topology.deployments.len(), 2);
    assert_eq!(topology.pod_count(), 6);
    let names: Vec<_> = topology.deployments.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["deployment-0", "deployment-1"]);

    let d = &topology.deployments[1];
    assert_eq!((d.fan_in, d.fan_out), (4, 5));
    let pod = &d.pods[2];
    assert_eq!(pod.name, "pod-2");
    assert_eq!(pod.addr, "pod-2:8080");
    assert_eq!(pod.namespace, "emojivoto");
    assert_eq!(pod.identity, "pod-2.emojivoto.serviceaccount.identity.linkerd.cluster.local");
}

#[rstest]
fn test_groups_keep_order_and_collide_by_name() {
    let topology = Topology::build(&Config { deployments: vec![group(1, 1, 0, 0, "a"), group(1, 2, 0, 0, "b")] });
    assert_eq!(topology.deployments.len(), 2);
    assert_eq!(topology.deployments[0].name, "deployment-0");
    assert_eq!(topology.deployments[1].name, "deployment-0");
    assert_eq!(topology.deployments[1].pods[0].namespace, "b");
}

#[rstest]
#[case::negative_quantity(group(-1, 3, 1, 1, "ns"), 0, 0)]
#[case::negative_pods(group(2, -4, 1, 1, "ns"), 2, 0)]
#[case::zero(group(0, 0, 0, 0, ""), 0, 0)]
fn test_degenerate_groups(#[case] g: crate::config::DeploymentConfig, #[case] deployments: usize, #[case] pods: usize) {
    let topology = Topology::build(&Config { deployments: vec![g] });
    assert_eq!(topology.deployments.len(), deployments);
    assert_eq!(topology.pod_count(), pods);
}

#[rstest]
fn test_negative_fan_clamps_to_zero() {
    let d = &Topology::group(&group(1, 1, -2, -3, "ns"))[0];
    assert_eq!((d.fan_in, d.fan_out), (0, 0));
}

#[rstest]
fn test_rebuild_is_identical() {
    let config = Config { deployments: vec![group(2, 2, 1, 1, "x"), group(1, 3, 2, 0, "y")] };
    assert_eq!(Topology::build(&config), Topology::build(&config));
}

#[rstest]
fn test_pods_are_in_order() {
    let topology = Topology::build(&Config { deployments: vec![group(2, 2, 0, 0, "ns")] });
    let pairs: Vec<_> = topology
        .deployments
        .iter()
        .flat_map(|d| d.pods.iter().map(move |p| format!("{}/{}", d.name, p.name)))
        .collect();
    assert_eq!(pairs, vec!["deployment-0/pod-0", "deployment-0/pod-1", "deployment-1/pod-0", "deployment-1/pod-1"]);
}

#[test]
#[traced_test]
fn test_build_logs_summary() {
    Topology::build(&Config { deployments: vec![group(1, 2, 0, 0, "ns")] });
    assert!(logs_contain("built topology"));
}
