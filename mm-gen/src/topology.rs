//! Synthetic mesh topology: deployments, their pods, and fan-in/fan-out multiplicities.
//!
//! Names are positional within a configuration group (`deployment-<i>`, `pod-<i>`), so two groups
//! both produce `deployment-0`.  These collisions are part of the synthetic dataset and are kept.
use tracing::{
    info,
    instrument,
};

use crate::config::{
    Config,
    DeploymentConfig,
};

/// Port every synthetic pod "listens" on.
pub const POD_PORT: u16 = 8080;

/// A single pod.  Immutable once the topology is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pod {
    /// Namespace the pod runs in.
    pub namespace: String,
    /// Positional name, `pod-<i>`.
    pub name: String,
    /// `host:port` address.
    pub addr: String,
    /// Mesh workload identity.
    pub identity: String,
}

impl Pod {
    /// The `index`th pod of a deployment in `namespace`.
    fn new(index: usize, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: format!("pod-{index}"),
            addr: format!("pod-{index}:{POD_PORT}"),
            identity: format!("pod-{index}.{namespace}.serviceaccount.identity.linkerd.cluster.local"),
        }
    }
}

/// A named group of pods plus its traffic shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    /// Positional name, `deployment-<i>`.
    pub name: String,
    /// Pods owned by this deployment.
    pub pods: Vec<Pod>,
    /// Number of distinct inbound clients.
    pub fan_in: usize,
    /// Number of distinct outbound destinations.
    pub fan_out: usize,
}

/// Ordered sequence of deployments; built once and shared read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topology {
    /// Deployments in configuration order.
    pub deployments: Vec<Deployment>,
}

/// Negative config counts become zero.
fn clamp(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

impl Topology {
    /// Build the topology for every configured group, in order.
    #[instrument(skip(config), fields(groups = config.deployments.len()))]
    pub fn build(config: &Config) -> Self {
        let deployments: Vec<_> = config.deployment_groups().flat_map(Self::group).collect();
        let topology = Self { deployments };
        info!(
            deployments = topology.deployments.len(),
            pods = topology.pod_count(),
            "built topology"
        );
        topology
    }

    /// Deployments for a single configuration group.  Negative counts yield nothing.
    #[must_use]
    pub fn group(group: &DeploymentConfig) -> Vec<Deployment> {
        let pods = clamp(group.pods);
        (0..clamp(group.quantity))
            .map(|i| Deployment {
                name: format!("deployment-{i}"),
                pods: (0..pods).map(|p| Pod::new(p, &group.namespace)).collect(),
                fan_in: clamp(group.fan_in),
                fan_out: clamp(group.fan_out),
            })
            .collect()
    }

    /// Total pods across all deployments.
    #[must_use]
    pub fn pod_count(&self) -> usize {
        self.deployments.iter().map(|d| d.pods.len()).sum()
    }
}
