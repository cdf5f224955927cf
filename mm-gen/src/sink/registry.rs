use std::collections::hash_map::Entry;
use std::collections::HashMap;

use mm_core::{
    MeshError,
    MeshResult,
};
use prometheus::{
    GaugeVec,
    HistogramOpts,
    HistogramVec,
    IntCounterVec,
    Opts,
    Registry,
};
use tracing::debug;

use super::Sink;
use crate::catalog::{
    BucketMode,
    MetricKind,
    MetricSpec,
    LATENCY_BUCKETS_MS,
};
use crate::expand::Labels;
use crate::simulate::Observation;

/// A live instrument family.
#[derive(Clone)]
enum Instrument {
    /// Counter family, incremented once per pass.
    Counter(IntCounterVec),
    /// Gauge family, set once per pass.
    Gauge(GaugeVec),
    /// Histogram family over [`LATENCY_BUCKETS_MS`], one sample per pass.
    Histogram(HistogramVec),
}

impl Instrument {
    /// An unregistered family with `spec`'s name, help and label keys.
    fn new(spec: &MetricSpec) -> MeshResult<Self> {
        let name = spec.name();
        let help = spec.descriptor.help;
        let keys = &spec.label_keys;
        Ok(match spec.kind() {
            MetricKind::Counter => Self::Counter(IntCounterVec::new(Opts::new(name, help), keys)?),
            MetricKind::Gauge => Self::Gauge(GaugeVec::new(Opts::new(name, help), keys)?),
            MetricKind::Histogram => Self::Histogram(HistogramVec::new(
                HistogramOpts::new(name, help).buckets(LATENCY_BUCKETS_MS.to_vec()),
                keys,
            )?),
        })
    }

    /// Register the family with `registry`.
    fn register(&self, registry: &Registry) -> MeshResult<()> {
        match self {
            Self::Counter(vec) => registry.register(Box::new(vec.clone()))?,
            Self::Gauge(vec) => registry.register(Box::new(vec.clone()))?,
            Self::Histogram(vec) => registry.register(Box::new(vec.clone()))?,
        }
        Ok(())
    }

    /// Apply `observation` to the series with label `values`, in family key order.
    fn apply(&self, metric: &str, values: &[&str], observation: Observation) -> MeshResult<()> {
        match (self, observation) {
            (Self::Counter(vec), Observation::Count(_)) => vec.get_metric_with_label_values(values)?.inc(),
            (Self::Gauge(vec), Observation::Gauge(v)) => vec.get_metric_with_label_values(values)?.set(v),
            (Self::Histogram(vec), Observation::Sample(v)) => vec.get_metric_with_label_values(values)?.observe(v),
            (instrument, observation) => {
                return Err(MeshError::ObservationMismatch {
                    metric: metric.to_string(),
                    kind: instrument.kind(),
                    observation: observation.as_str(),
                });
            },
        }
        Ok(())
    }

    /// Kind name for errors.
    const fn kind(&self) -> &'static str {
        match self {
            Self::Counter(_) => MetricKind::Counter.as_str(),
            Self::Gauge(_) => MetricKind::Gauge.as_str(),
            Self::Histogram(_) => MetricKind::Histogram.as_str(),
        }
    }
}

/// A registered family and the label keys it was created with.
struct Family {
    /// Label keys, sorted.
    keys: Vec<&'static str>,
    /// Keys filled per series rather than per bound context.
    unbound: Vec<&'static str>,
    /// The registered instrument.
    instrument: Instrument,
}

/// A family with its bound label values already filled in; only unbound slots remain.
struct Curried {
    /// Handle onto the family's instrument.
    instrument: Instrument,
    /// One entry per family key; `None` where the value comes from an unbound dimension.
    slots: Vec<Option<String>>,
}

/// Drives series into long-lived prometheus instruments.
///
/// Instruments are created on first sight of a metric and registered with the backing
/// [`Registry`].  Handles pre-bound to a series' fixed labels are memoized per bound-label subset,
/// so repeated passes over the same topology reuse them and never create new series.  The registry
/// handles concurrent reads from scrapes on its own.
pub struct RegistrySink {
    /// Registry scrapes read from.
    registry: Registry,
    /// Families by metric name.
    families: HashMap<&'static str, Family>,
    /// Curried handles by metric name and bound label values.
    curried: HashMap<(&'static str, Vec<String>), Curried>,
}

impl RegistrySink {
    /// Feed instruments registered with `registry`.
    pub fn new(registry: Registry) -> Self {
        Self { registry, families: HashMap::new(), curried: HashMap::new() }
    }

    /// The backing registry (cheap to clone; clones share state).
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of distinct bound-label contexts seen so far.
    #[cfg(test)]
    pub fn curried_len(&self) -> usize {
        self.curried.len()
    }

    /// Create and register the family for `spec` on first use; reject a later spec for the same
    /// name with different label keys.
    fn ensure_family(&mut self, spec: &MetricSpec) -> MeshResult<()> {
        let name = spec.name();
        if !self.families.contains_key(name) {
            let instrument = Instrument::new(spec)?;
            instrument.register(&self.registry)?;
            debug!(metric = name, kind = spec.kind().as_str(), keys = spec.label_keys.len(), "registered instrument");
            self.families.insert(
                name,
                Family {
                    keys: spec.label_keys.clone(),
                    unbound: spec.unbound_keys.clone(),
                    instrument,
                },
            );
        }

        let family = &self.families[name];
        if family.keys != spec.label_keys {
            return Err(mismatch(name, &family.keys, spec.label_keys.iter().copied()));
        }
        Ok(())
    }
}

/// A [`MeshError::LabelSetMismatch`] for `metric`.
fn mismatch<'a>(metric: &str, registered: &[&str], requested: impl Iterator<Item = &'a str>) -> MeshError {
    MeshError::LabelSetMismatch {
        metric: metric.to_string(),
        registered: registered.iter().map(ToString::to_string).collect(),
        requested: requested.map(ToString::to_string).collect(),
    }
}

impl Sink for RegistrySink {
    fn bucket_mode(&self) -> BucketMode {
        BucketMode::Native
    }

    fn emit(&mut self, metric: &MetricSpec, labels: &Labels, observation: Observation) -> MeshResult<usize> {
        let name = metric.name();
        self.ensure_family(metric)?;
        let family = &self.families[name];
        if labels.len() != family.keys.len() || !family.keys.iter().all(|k| labels.contains_key(k)) {
            return Err(mismatch(name, &family.keys, labels.keys().copied()));
        }

        let bound: Vec<String> = family
            .keys
            .iter()
            .filter(|k| !family.unbound.contains(*k))
            .map(|k| labels[k].clone())
            .collect();

        let curried = match self.curried.entry((name, bound)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let slots = family
                    .keys
                    .iter()
                    .map(|k| (!family.unbound.contains(k)).then(|| labels[k].clone()))
                    .collect();
                entry.insert(Curried { instrument: family.instrument.clone(), slots })
            },
        };

        let values: Vec<&str> = curried
            .slots
            .iter()
            .zip(&family.keys)
            .map(|(slot, key)| slot.as_deref().unwrap_or_else(|| labels[key].as_str()))
            .collect();
        curried.instrument.apply(name, &values, observation)?;
        Ok(1)
    }
}
