//! The sidecar metric catalog.
//!
//! Each [`MetricDescriptor`] names one metric family, its kind, and which label family it belongs
//! to.  Resolving it against a [`BucketMode`] yields a [`MetricSpec`], which knows the family's full
//! label key set and can produce one [`SeriesTemplate`] per traffic direction for any pod: the bound
//! labels for that context plus the unbound dimensions still to be cross-multiplied.
use std::collections::BTreeSet;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::expand::{
    cardinality,
    Dimension,
    Labels,
};
use crate::topology::{
    Deployment,
    Pod,
};

/// Upper bounds (milliseconds) of the latency histogram buckets; `+Inf` is implied.
pub const LATENCY_BUCKETS_MS: [f64; 25] = [
    1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 100.0, 200.0, 300.0, 400.0, 500.0, 1000.0, 2000.0,
    3000.0, 4000.0, 5000.0, 10000.0, 20000.0, 30000.0, 40000.0, 50000.0,
];

/// `le` value of the unbounded top bucket.
pub const INF_BUCKET: &str = "+Inf";

/// Control plane namespace reported for every outbound destination.
pub const CONTROL_PLANE_NS: &str = "linkerd";

/// Namespace reported for every outbound destination.
pub const DST_NAMESPACE: &str = "default";

/// Kind reported for every workload.
pub const WORKLOAD_KIND: &str = "Deployment";

lazy_static! {
    /// `status_code` candidates.
    static ref STATUS_CODES: Arc<[String]> = ["200", "500", "404"].into_iter().map(String::from).collect();
    /// `peer` candidates for TCP metrics.
    static ref PEERS: Arc<[String]> = ["src", "dst"].into_iter().map(String::from).collect();
    /// `le` candidates of an expanded histogram, ending in `+Inf`.
    static ref BUCKET_LABELS: Arc<[String]> = LATENCY_BUCKETS_MS
        .iter()
        .map(ToString::to_string)
        .chain(std::iter::once(INF_BUCKET.to_string()))
        .collect();
}

/// Closed set of instrument kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonic counter.
    Counter,
    /// Point-in-time value.
    Gauge,
    /// Bucketed distribution.
    Histogram,
}

impl MetricKind {
    /// Lowercase name, as used in log fields and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

/// How histograms are represented by the sink a catalog is resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketMode {
    /// The sink buckets observations itself (live registry).
    Native,
    /// Buckets are expanded into one `<name>_bucket{le=..}` series per bound (text rendering).
    ///
    /// Each bucket line carries its own count; counts are not cumulative across buckets.  This is a
    /// deliberate simplification to reproduce sidecar line volume, not a histogram implementation.
    Expanded,
}

/// Traffic direction of a series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Traffic received by the pod.
    Inbound,
    /// Traffic sent by the pod to a destination.
    Outbound,
}

impl Direction {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Which label family a metric uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    /// Request/response metrics, expanded over status codes.
    Http {
        /// Whether series carry `classification` (and `grpc_status` outbound).
        classified: bool,
    },
    /// Connection metrics, expanded over the TCP peer side.
    Tcp,
}

/// Static description of one metric family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Family name.
    pub name: &'static str,
    /// Help text for registries that expose it.
    pub help: &'static str,
    /// Instrument kind.
    pub kind: MetricKind,
    /// Label family.
    pub family: Family,
}

/// The metrics a mesh proxy sidecar exposes.
pub const SIDECAR_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor {
        name: "response_total",
        help: "Total count of HTTP responses",
        kind: MetricKind::Counter,
        family: Family::Http { classified: true },
    },
    MetricDescriptor {
        name: "response_latency_ms",
        help: "Elapsed times between a request's headers being received and its response stream completing",
        kind: MetricKind::Histogram,
        family: Family::Http { classified: false },
    },
    MetricDescriptor {
        name: "tcp_open_connections",
        help: "Number of currently-open connections",
        kind: MetricKind::Gauge,
        family: Family::Tcp,
    },
    MetricDescriptor {
        name: "tcp_read_bytes_total",
        help: "Total count of bytes read from peers",
        kind: MetricKind::Counter,
        family: Family::Tcp,
    },
    MetricDescriptor {
        name: "tcp_write_bytes_total",
        help: "Total count of bytes written to peers",
        kind: MetricKind::Counter,
        family: Family::Tcp,
    },
];

/// Client identities for a fan-in of `n`.
#[must_use]
pub fn client_ids(n: usize) -> Arc<[String]> {
    (0..n)
        .map(|i| format!("client-{i}.namespace.serviceaccount.identity.linkerd.cluster.local"))
        .collect()
}

/// Name of the `i`th outbound destination.
#[must_use]
pub fn destination(i: usize) -> String {
    format!("dst-{i}")
}

/// Everything a template needs to know about the pod it renders for.
#[derive(Clone, Debug)]
pub struct PodContext<'a> {
    /// Owning deployment.
    pub deployment: &'a Deployment,
    /// The pod itself.
    pub pod: &'a Pod,
    /// `client_id` candidates, shared by every pod of the deployment.
    pub clients: Arc<[String]>,
}

impl<'a> PodContext<'a> {
    /// Context for `pod` of `deployment`, computing the client list from the fan-in.
    #[must_use]
    pub fn new(deployment: &'a Deployment, pod: &'a Pod) -> Self {
        Self { deployment, pod, clients: client_ids(deployment.fan_in) }
    }

    /// Context reusing a client list already computed for the deployment.
    #[must_use]
    pub const fn with_clients(deployment: &'a Deployment, pod: &'a Pod, clients: Arc<[String]>) -> Self {
        Self { deployment, pod, clients }
    }
}

/// Bound labels plus remaining dimensions for one (metric, pod, direction[, destination]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesTemplate {
    /// Direction this template renders.
    pub direction: Direction,
    /// Fixed labels.
    pub bound: Labels,
    /// Dimensions to cross-multiply, in order.
    pub dimensions: Vec<Dimension>,
}

impl SeriesTemplate {
    /// Number of series this template expands to.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        cardinality(&self.dimensions)
    }
}

/// A descriptor resolved for one bucket mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricSpec {
    /// The underlying descriptor.
    pub descriptor: &'static MetricDescriptor,
    /// Name series are emitted under (`<name>_bucket` for expanded histograms).
    pub series_name: String,
    /// Every label key a series of this metric carries, sorted.
    pub label_keys: Vec<&'static str>,
    /// Keys that come from dimensions rather than the bound context.
    pub unbound_keys: Vec<&'static str>,
    /// Bucket mode this spec was resolved for.
    pub bucket_mode: BucketMode,
}

impl MetricSpec {
    /// Resolve `descriptor` for `bucket_mode`.
    #[must_use]
    pub fn new(descriptor: &'static MetricDescriptor, bucket_mode: BucketMode) -> Self {
        let expanded_histogram = descriptor.kind == MetricKind::Histogram && bucket_mode == BucketMode::Expanded;
        let series_name = if expanded_histogram {
            format!("{}_bucket", descriptor.name)
        } else {
            descriptor.name.to_string()
        };

        let mut spec = Self {
            descriptor,
            series_name,
            label_keys: Vec::new(),
            unbound_keys: Vec::new(),
            bucket_mode,
        };

        // Probe both directions with an empty context to collect the key schema.
        let deployment = Deployment { name: String::new(), pods: vec![], fan_in: 0, fan_out: 0 };
        let pod = Pod {
            namespace: String::new(),
            name: String::new(),
            addr: String::new(),
            identity: String::new(),
        };
        let ctx = PodContext::new(&deployment, &pod);
        let inbound = spec.inbound_parts(&ctx);
        let outbound = spec.outbound_parts(&ctx, "");

        let unbound: BTreeSet<_> = inbound.1.iter().chain(&outbound.1).map(|d| d.name).collect();
        let keys: BTreeSet<_> = inbound.0.keys().chain(outbound.0.keys()).copied().chain(unbound.iter().copied()).collect();
        spec.unbound_keys = unbound.into_iter().collect();
        spec.label_keys = keys.into_iter().collect();
        spec
    }

    /// Name of the family.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Instrument kind.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.descriptor.kind
    }

    /// Templates for `ctx`: the inbound template, then one outbound template per fan-out target.
    #[must_use]
    pub fn templates(&self, ctx: &PodContext<'_>) -> Vec<SeriesTemplate> {
        let mut templates = Vec::with_capacity(1 + ctx.deployment.fan_out);
        templates.push(self.complete(Direction::Inbound, self.inbound_parts(ctx)));
        for i in 0..ctx.deployment.fan_out {
            let target = destination(i);
            templates.push(self.complete(Direction::Outbound, self.outbound_parts(ctx, &target)));
        }
        templates
    }

    /// Bind every schema key that is neither bound nor expanded to the empty string so the key set
    /// is the same in both directions.
    fn complete(&self, direction: Direction, (mut bound, dimensions): (Labels, Vec<Dimension>)) -> SeriesTemplate {
        for key in &self.label_keys {
            if !dimensions.iter().any(|d| d.name == *key) {
                bound.entry(*key).or_default();
            }
        }
        SeriesTemplate { direction, bound, dimensions }
    }

    /// The dimension the metric's label family multiplies over.
    fn family_dimension(&self) -> Dimension {
        match self.descriptor.family {
            Family::Http { .. } => Dimension::shared("status_code", STATUS_CODES.clone()),
            Family::Tcp => Dimension::shared("peer", PEERS.clone()),
        }
    }

    /// Unbound dimensions in expansion order; `clients` is only given inbound.
    fn dimensions(&self, clients: Option<&Arc<[String]>>) -> Vec<Dimension> {
        let mut dimensions = Vec::with_capacity(3);
        if let Some(clients) = clients {
            dimensions.push(Dimension::shared("client_id", clients.clone()));
        }
        dimensions.push(self.family_dimension());
        if self.descriptor.kind == MetricKind::Histogram && self.bucket_mode == BucketMode::Expanded {
            dimensions.push(Dimension::shared("le", BUCKET_LABELS.clone()));
        }
        dimensions
    }

    /// Bound labels and dimensions of the inbound template.
    fn inbound_parts(&self, ctx: &PodContext<'_>) -> (Labels, Vec<Dimension>) {
        let mut bound = workload_labels(Direction::Inbound, ctx);
        bound.insert("target_addr", ctx.pod.addr.clone());
        bound.insert("server_id", ctx.pod.identity.clone());
        if let Family::Http { classified } = self.descriptor.family {
            bound.insert("authority", ctx.pod.name.clone());
            if classified {
                bound.insert("classification", "failure".into());
            }
        }
        (bound, self.dimensions(Some(&ctx.clients)))
    }

    /// Bound labels and dimensions of the outbound template towards `target`.
    fn outbound_parts(&self, ctx: &PodContext<'_>, target: &str) -> (Labels, Vec<Dimension>) {
        let mut bound = workload_labels(Direction::Outbound, ctx);
        for key in [
            "authority",
            "target_addr",
            "server_id",
            "dst_deployment",
            "dst_pod",
            "dst_pod_template_hash",
            "dst_service",
            "dst_serviceaccount",
            "dst_workload_name",
        ] {
            bound.insert(key, target.to_string());
        }
        bound.insert("dst_control_plane_ns", CONTROL_PLANE_NS.into());
        bound.insert("dst_namespace", DST_NAMESPACE.into());
        bound.insert("dst_workload_kind", WORKLOAD_KIND.into());
        if let Family::Http { classified: true } = self.descriptor.family {
            bound.insert("classification", "failure".into());
            bound.insert("grpc_status", "0".into());
        }
        (bound, self.dimensions(None))
    }
}

/// Labels every series of a pod carries regardless of metric.
fn workload_labels(direction: Direction, ctx: &PodContext<'_>) -> Labels {
    Labels::from([
        ("direction", direction.as_str().to_string()),
        ("tls", "true".to_string()),
        ("namespace", ctx.pod.namespace.clone()),
        ("pod", ctx.pod.name.clone()),
        ("workload_name", ctx.deployment.name.clone()),
        ("workload_kind", WORKLOAD_KIND.to_string()),
    ])
}

/// Every metric of a descriptor set, resolved for one bucket mode.
#[derive(Clone, Debug)]
pub struct Catalog {
    /// Mode every spec was resolved for.
    bucket_mode: BucketMode,
    /// Resolved metrics, in declaration order.
    specs: Vec<MetricSpec>,
}

impl Catalog {
    /// The sidecar catalog.
    #[must_use]
    pub fn new(bucket_mode: BucketMode) -> Self {
        Self::with_metrics(SIDECAR_METRICS, bucket_mode)
    }

    /// A catalog over an arbitrary descriptor set.
    #[must_use]
    pub fn with_metrics(metrics: &'static [MetricDescriptor], bucket_mode: BucketMode) -> Self {
        let specs = metrics.iter().map(|d| MetricSpec::new(d, bucket_mode)).collect();
        Self { bucket_mode, specs }
    }

    /// Bucket mode the catalog was resolved for.
    #[must_use]
    pub const fn bucket_mode(&self) -> BucketMode {
        self.bucket_mode
    }

    /// Resolved metrics, in declaration order.
    #[must_use]
    pub fn specs(&self) -> &[MetricSpec] {
        &self.specs
    }

    /// Look a metric up by family name.
    #[cfg(test)]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricSpec> {
        self.specs.iter().find(|s| s.name() == name)
    }
}
