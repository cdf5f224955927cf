mod driver_test;
mod topology_test;

use std::collections::BTreeSet;

use rstest::fixture;

use crate::config::{
    Config,
    DeploymentConfig,
};
use crate::topology::Topology;

pub fn group(quantity: i64, pods: i64, fan_in: i64, fan_out: i64, namespace: &str) -> DeploymentConfig {
    DeploymentConfig { quantity, pods, fan_in, fan_out, namespace: namespace.into() }
}

/// One deployment, one pod, two clients, one destination.
#[fixture]
pub fn small_topology() -> Topology {
    Topology::build(&Config { deployments: vec![group(1, 1, 2, 1, "ns")] })
}

/// One exposition line, split into its parts.
#[derive(Debug)]
pub struct Line {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: String,
}

impl Line {
    pub fn keys(&self) -> BTreeSet<&str> {
        self.labels.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

pub fn parse_lines(text: &str) -> Vec<Line> {
    text.lines()
        .map(|line| {
            let (name, rest) = line.split_once(" {").expect("missing label block");
            let (labels, value) = rest.rsplit_once("} ").expect("missing value");
            let labels = if labels.is_empty() {
                vec![]
            } else {
                labels
                    .split(',')
                    .map(|pair| {
                        let (k, v) = pair.split_once('=').expect("malformed label");
                        (k.to_string(), v.trim_matches('"').to_string())
                    })
                    .collect()
            };
            Line { name: name.to_string(), labels, value: value.to_string() }
        })
        .collect()
}
