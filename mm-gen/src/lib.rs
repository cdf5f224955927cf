#![deny(
    // Strict on purpose: exceptions are made with inline allows so they get a second look.
    clippy::nursery,
    clippy::pedantic,
    missing_docs,
    clippy::missing_docs_in_private_items,
)]
//! # mm-gen: synthetic service-mesh sidecar metrics
//!
//! mm-gen produces large, realistic metric corpora shaped like the telemetry a mesh proxy sidecar
//! exposes, for load-testing scrape pipelines (cardinality, payload size, scrape latency).  A small
//! topology description (deployments, pods per deployment, inbound fan-in, outbound fan-out) is
//! expanded into every label combination of every sidecar metric.
//!
//! ## Pipeline
//! 1. Topology ([`topology::Topology::build`]) – positional deployments and pods from the
//!    configured groups.
//! 2. Catalog ([`catalog::Catalog`]) – per metric and pod, one [`catalog::SeriesTemplate`] per
//!    direction: bound labels plus the dimensions left to multiply out.
//! 3. Expansion ([`expand::expand`]) – depth-first cartesian product over the dimensions.
//! 4. Simulation ([`simulate::Simulator`]) – one synthetic value per series.
//! 5. Sink ([`sink::Sink`]) – exposition text ([`sink::TextSink`]) or a live prometheus registry
//!    ([`sink::RegistrySink`]).
//!
//! [`driver`] decides when a pass runs: once per scrape, or on a fixed timer.

pub mod catalog;
pub mod config;
pub mod driver;
pub mod expand;
pub mod server;
pub mod simulate;
pub mod sink;
pub mod topology;

pub use config::{
    Config,
    DeploymentConfig,
};
pub use driver::{
    run_pass,
    RefreshLoop,
    ScrapeRenderer,
};
pub use topology::Topology;

#[cfg(test)]
#[allow(clippy::missing_docs_in_private_items)]
mod tests;
