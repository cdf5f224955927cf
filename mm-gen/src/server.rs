//! HTTP scrape endpoint.
//!
//! Both servers answer `GET <path>` with the text exposition format and gzip the body when the
//! scraper accepts it.
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use prometheus::{
    Encoder,
    Registry,
    TextEncoder,
};
use rocket::config::LogLevel;
use rocket::http::{
    ContentType,
    Status,
};
use rocket::{
    Build,
    Rocket,
    State,
};
use tracing::{
    error,
    info,
};

use crate::driver::ScrapeRenderer;

mod gzip;

pub use gzip::{
    accepts_gzip,
    Gzip,
};

/// Default listen port (the sidecar's admin port).
pub const DEFAULT_PORT: u16 = 4191;

/// Default scrape path.
pub const DEFAULT_PATH: &str = "/metrics";

/// Content type of the text exposition format, `text/plain; version=0.0.4`.
#[must_use]
pub fn exposition_content_type() -> ContentType {
    ContentType::new("text", "plain").with_params(("version", "0.0.4"))
}

/// Where and how to listen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerOptions {
    /// Bind address.
    pub address: IpAddr,
    /// Bind port.
    pub port: u16,
    /// Path the metrics are served on.
    pub path: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            address: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl ServerOptions {
    /// Rocket settings for these options.
    fn rocket_config(&self) -> rocket::Config {
        rocket::Config {
            address: self.address,
            port: self.port,
            // requests are logged through tracing below
            log_level: LogLevel::Critical,
            ..rocket::Config::default()
        }
    }
}

/// Render a fresh pass for this scrape.
#[rocket::get("/")]
async fn text_metrics(renderer: &State<Arc<ScrapeRenderer>>) -> Result<(ContentType, Vec<u8>), Status> {
    let renderer = Arc::clone(renderer.inner());
    let started = Instant::now();
    let rendered = rocket::tokio::task::spawn_blocking(move || {
        let mut body = Vec::new();
        renderer.render(&mut body).map(|stats| (stats, body))
    })
    .await;

    match rendered {
        Ok(Ok((stats, body))) => {
            info!(series = stats.series, round = stats.round, bytes = body.len(), elapsed = ?started.elapsed(), "wrote timeseries");
            Ok((exposition_content_type(), body))
        },
        Ok(Err(err)) => {
            error!(%err, "failed to render metrics");
            Err(Status::InternalServerError)
        },
        Err(err) => {
            error!(%err, "render task panicked");
            Err(Status::InternalServerError)
        },
    }
}

/// Encode the registry's current state.
#[rocket::get("/")]
fn registry_metrics(registry: &State<Registry>) -> Result<(ContentType, Vec<u8>), Status> {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    match encoder.encode(&registry.gather(), &mut body) {
        Ok(()) => Ok((exposition_content_type(), body)),
        Err(err) => {
            error!(%err, "failed to encode registry");
            Err(Status::InternalServerError)
        },
    }
}

/// Rocket instance serving freshly rendered text on every scrape.
#[must_use]
pub fn text_server(renderer: Arc<ScrapeRenderer>, options: &ServerOptions) -> Rocket<Build> {
    rocket::custom(options.rocket_config())
        .attach(Gzip)
        .manage(renderer)
        .mount(options.path.as_str(), rocket::routes![text_metrics])
}

/// Rocket instance exposing the current state of a live registry.
#[must_use]
pub fn registry_server(registry: Registry, options: &ServerOptions) -> Rocket<Build> {
    rocket::custom(options.rocket_config())
        .attach(Gzip)
        .manage(registry)
        .mount(options.path.as_str(), rocket::routes![registry_metrics])
}

/// Launch `rocket` and serve until shutdown.  A failure to bind is logged and returned.
pub async fn serve(rocket: Rocket<Build>, options: &ServerOptions) -> anyhow::Result<()> {
    info!(address = %options.address, port = options.port, path = %options.path, "serving metrics");
    match rocket.launch().await {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(%err, "metrics server failed");
            Err(anyhow::anyhow!("metrics server failed: {err}"))
        },
    }
}
