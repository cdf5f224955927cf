//! Topology configuration file.
use std::path::Path;

use mm_core::{
    MeshError,
    MeshResult,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    instrument,
};

/// Root of the configuration file: an ordered list of deployment groups.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment groups, expanded in file order.
    pub deployments: Vec<DeploymentConfig>,
}

/// One group of identically shaped deployments.
///
/// Counts are signed so that a hand-edited file with a negative value still parses; the topology
/// builder clamps them to zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// How many deployments this group produces.
    pub quantity: i64,
    /// Pods per deployment.
    pub pods: i64,
    /// Distinct inbound client identities per pod.
    pub fan_in: i64,
    /// Distinct outbound destinations per pod.
    pub fan_out: i64,
    /// Namespace every pod of the group lives in.
    pub namespace: String,
}

impl Config {
    /// Read and parse a config file.  JSON is tried first, then YAML.
    #[instrument]
    pub fn load(path: &Path) -> MeshResult<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|source| MeshError::ConfigRead { path: path.to_path_buf(), source })?;
        let config = Self::parse(&data).map_err(|reason| MeshError::ConfigParse { path: path.to_path_buf(), reason })?;
        debug!(groups = config.deployments.len(), "loaded topology config");
        Ok(config)
    }

    /// Parse config text in either supported encoding.
    pub fn parse(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).or_else(|json_err| {
            serde_yaml::from_str(data).map_err(|yaml_err| format!("not JSON ({json_err}) and not YAML ({yaml_err})"))
        })
    }

    /// The configured deployment groups, in order.
    pub fn deployment_groups(&self) -> impl Iterator<Item = &DeploymentConfig> {
        self.deployments.iter()
    }
}
