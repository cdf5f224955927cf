//! Where expanded series go.
//!
//! The expansion engine is written once against [`Sink`]; the two strategies differ only in what
//! they do with a fully bound series.
use mm_core::MeshResult;

use crate::catalog::{
    BucketMode,
    MetricSpec,
};
use crate::expand::Labels;
use crate::simulate::Observation;

mod registry;
mod text;

pub use registry::RegistrySink;
pub use text::TextSink;

/// Destination for fully expanded series.
pub trait Sink {
    /// How this sink wants histograms presented.
    fn bucket_mode(&self) -> BucketMode;

    /// Record one series.  Returns the number of series written.
    fn emit(&mut self, metric: &MetricSpec, labels: &Labels, observation: Observation) -> MeshResult<usize>;

    /// Called once after a full pass.
    fn finish(&mut self) -> MeshResult<()> {
        Ok(())
    }
}
