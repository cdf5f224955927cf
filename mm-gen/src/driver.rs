//! Refresh drivers: when the expansion pipeline runs.
//!
//! A pass walks every pod of the topology, every metric of the catalog, and every template of that
//! (pod, metric) pair, expanding each into the sink.  [`ScrapeRenderer`] runs one text pass per scrape;
//! [`RefreshLoop`] runs one registry pass per tick for as long as the process lives.
use std::io::Write;
use std::sync::atomic::{
    AtomicU64,
    Ordering,
};
use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

use mm_core::MeshResult;
use prometheus::Registry;
use tokio::time::MissedTickBehavior;
use tracing::{
    debug,
    info,
    instrument,
};

use crate::catalog::{
    client_ids,
    BucketMode,
    Catalog,
    PodContext,
};
use crate::expand::expand;
use crate::simulate::Simulator;
use crate::sink::{
    RegistrySink,
    Sink,
    TextSink,
};
use crate::topology::Topology;

/// Default period of the background refresh loop.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// One full pass of `topology` × `catalog` into `sink`.  Returns the number of series written.
///
/// `catalog` must be resolved for the sink's bucket mode.
#[instrument(skip_all, fields(deployments = topology.deployments.len(), round = simulator.round()))]
pub fn run_pass<S: Sink + ?Sized>(
    topology: &Topology,
    catalog: &Catalog,
    simulator: &mut Simulator,
    sink: &mut S,
) -> MeshResult<usize> {
    debug_assert_eq!(catalog.bucket_mode(), sink.bucket_mode());
    let bucket_mode = sink.bucket_mode();
    let mut total = 0;

    for deployment in &topology.deployments {
        let clients = client_ids(deployment.fan_in);
        for pod in &deployment.pods {
            let ctx = PodContext::with_clients(deployment, pod, clients.clone());
            for spec in catalog.specs() {
                for mut template in spec.templates(&ctx) {
                    total += expand(&spec.series_name, &mut template.bound, &template.dimensions, &mut |_, labels| {
                        let observation = simulator.observe(spec.kind(), bucket_mode);
                        sink.emit(spec, labels, observation)
                    })?;
                }
            }
        }
    }

    sink.finish()?;
    Ok(total)
}

/// Outcome of one rendered scrape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderStats {
    /// Round the counters reported.
    pub round: u64,
    /// Series written.
    pub series: usize,
}

/// On-demand text rendering, one full pass per call.
///
/// Nothing is cached between calls.  The round counter is the only shared mutable state and is
/// atomic, so concurrent scrapes each get a distinct round.
#[derive(Debug)]
pub struct ScrapeRenderer {
    /// Topology every scrape renders.
    topology: Arc<Topology>,
    /// Catalog resolved for expanded buckets.
    catalog: Catalog,
    /// Round the next scrape reports.
    rounds: AtomicU64,
    /// Base seed; each round draws from `seed + round`.
    seed: Option<u64>,
}

impl ScrapeRenderer {
    /// A renderer whose first scrape reports round 1.
    #[must_use]
    pub fn new(topology: Arc<Topology>, seed: Option<u64>) -> Self {
        Self::starting_at(topology, 1, seed)
    }

    /// A renderer whose first scrape reports `first_round`.
    #[must_use]
    pub fn starting_at(topology: Arc<Topology>, first_round: u64, seed: Option<u64>) -> Self {
        Self {
            topology,
            catalog: Catalog::new(BucketMode::Expanded),
            rounds: AtomicU64::new(first_round),
            seed,
        }
    }

    /// Render one pass into `out`.
    pub fn render<W: Write>(&self, out: W) -> MeshResult<RenderStats> {
        let round = self.rounds.fetch_add(1, Ordering::SeqCst);
        let mut simulator = Simulator::at_round(round, self.seed.map(|s| s.wrapping_add(round)));
        let mut sink = TextSink::new(out);
        let series = run_pass(&self.topology, &self.catalog, &mut simulator, &mut sink)?;
        Ok(RenderStats { round, series })
    }
}

/// Background re-simulation of every series into a live registry.
pub struct RefreshLoop {
    /// Topology every tick refreshes.
    topology: Arc<Topology>,
    /// Catalog resolved for native buckets.
    catalog: Catalog,
    /// Round and random state carried across ticks.
    simulator: Simulator,
    /// Live registry sink.
    sink: RegistrySink,
    /// Tick period.
    period: Duration,
}

impl RefreshLoop {
    /// A loop over `topology` feeding a fresh registry.
    #[must_use]
    pub fn new(topology: Arc<Topology>, period: Duration, seed: Option<u64>) -> Self {
        Self {
            topology,
            catalog: Catalog::new(BucketMode::Native),
            simulator: Simulator::new(seed),
            sink: RegistrySink::new(Registry::new()),
            period,
        }
    }

    /// Handle to the registry scrapes should read from.
    #[must_use]
    pub fn registry(&self) -> Registry {
        self.sink.registry().clone()
    }

    /// Run a single pass now.
    pub fn tick(&mut self) -> MeshResult<usize> {
        self.simulator.advance();
        run_pass(&self.topology, &self.catalog, &mut self.simulator, &mut self.sink)
    }

    /// Tick forever at the configured period.  Only returns on a sink error (for example a label
    /// set conflict in the registry), which is fatal.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_ticks(None).await.map(|_| ())
    }

    /// Tick `limit` times (forever for `None`), then hand the loop back.
    ///
    /// Passes are CPU-bound and never suspend, so each one runs on the blocking pool.  A pass that
    /// overruns the period delays the next tick instead of triggering a burst of catch-up ticks.
    pub async fn run_ticks(mut self, limit: Option<u64>) -> anyhow::Result<Self> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period = ?self.period, pods = self.topology.pod_count(), "starting refresh loop");

        let mut ticks = 0;
        while limit.map_or(true, |limit| ticks < limit) {
            ticker.tick().await;
            let started = Instant::now();
            let (state, result) = tokio::task::spawn_blocking(move || {
                let result = self.tick();
                (self, result)
            })
            .await?;
            self = state;
            let series = result?;
            ticks += 1;
            debug!(series, round = self.simulator.round(), elapsed = ?started.elapsed(), "refreshed registry");
        }
        Ok(self)
    }
}
