//! Synthetic observations for each expanded series.
use rand::rngs::StdRng;
use rand::{
    Rng,
    SeedableRng,
};

use crate::catalog::{
    BucketMode,
    MetricKind,
};

/// Gauges are drawn uniformly from `[0, GAUGE_MAX)`.
pub const GAUGE_MAX: f64 = 1000.0;

/// Histogram samples are drawn uniformly from `[0, SAMPLE_MAX)` (milliseconds).
pub const SAMPLE_MAX: f64 = 50_000.0;

/// One synthetic data point for one series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    /// A counter total (text rendering) or a unit increment (live registry).  Also used for the
    /// per-bucket count of an expanded histogram.
    Count(u64),
    /// A fresh gauge reading.
    Gauge(f64),
    /// One histogram sample for the sink to bucket.
    Sample(f64),
}

impl Observation {
    /// Short name for errors and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Count(_) => "count",
            Self::Gauge(_) => "gauge",
            Self::Sample(_) => "sample",
        }
    }
}

/// Produces observations.  Counters report the current round, shared by every series; gauges and
/// samples are independent draws with no memory between rounds.
#[derive(Debug)]
pub struct Simulator {
    /// Value counters report.
    round: u64,
    /// Source of gauge and sample draws.
    rng: StdRng,
}

impl Simulator {
    /// A simulator at round 0.  With a seed the random draws are reproducible.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { round: 0, rng }
    }

    /// A simulator positioned at `round`.
    #[must_use]
    pub fn at_round(round: u64, seed: Option<u64>) -> Self {
        Self { round, ..Self::new(seed) }
    }

    /// The round counters currently report.
    #[must_use]
    pub const fn round(&self) -> u64 {
        self.round
    }

    /// Move to the next round and return it.
    pub fn advance(&mut self) -> u64 {
        self.round += 1;
        self.round
    }

    /// One observation for a series of `kind`.
    pub fn observe(&mut self, kind: MetricKind, bucket_mode: BucketMode) -> Observation {
        match (kind, bucket_mode) {
            (MetricKind::Counter, _) | (MetricKind::Histogram, BucketMode::Expanded) => Observation::Count(self.round),
            (MetricKind::Gauge, _) => Observation::Gauge(self.rng.gen_range(0.0..GAUGE_MAX)),
            (MetricKind::Histogram, BucketMode::Native) => Observation::Sample(self.rng.gen_range(0.0..SAMPLE_MAX)),
        }
    }
}
