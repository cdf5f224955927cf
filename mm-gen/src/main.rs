#![deny(
    // Strict on purpose: exceptions are made with inline allows so they get a second look.
    clippy::nursery,
    clippy::pedantic,
    missing_docs,
    clippy::missing_docs_in_private_items,
)]
//! `mm-gen` command line: serve or render synthetic sidecar metrics for a topology file.
use std::io::Write;
use std::net::IpAddr;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;
use std::time::Duration;

use clap::{
    Args,
    Parser,
    Subcommand,
};
use mm_core::{
    exit,
    logging,
};
use mm_gen::driver::DEFAULT_REFRESH_PERIOD;
use mm_gen::server::{
    self,
    ServerOptions,
    DEFAULT_PATH,
    DEFAULT_PORT,
};
use mm_gen::{
    Config,
    RefreshLoop,
    ScrapeRenderer,
    Topology,
};
use tracing::{
    error,
    info,
};

/// Synthetic service-mesh sidecar metrics for scrape pipeline load tests
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// What to do.
    #[command(subcommand)]
    command: Command,

    /// Logging verbosity (`trace`, `debug`, `info`, `warn`, `error`, or any filter directive).
    #[arg(short, long, default_value = "info", global = true, value_parser = parse_verbosity)]
    verbosity: String,

    /// Seed for gauge and histogram draws; random when omitted.
    #[arg(long, global = true)]
    seed: Option<u64>,
}

/// Subcommands.
#[derive(Subcommand)]
enum Command {
    /// Render the full corpus as exposition text on every scrape.
    ServeText(ServeArgs),

    /// Keep a live registry refreshed on a timer and serve its state.
    ServeLive {
        /// Listener and config.
        #[command(flatten)]
        serve: ServeArgs,

        /// Refresh period in milliseconds.
        #[arg(long, default_value_t = duration_ms(DEFAULT_REFRESH_PERIOD), value_parser = clap::value_parser!(u64).range(1..))]
        refresh_ms: u64,
    },

    /// Render one pass to stdout and exit.
    Render {
        /// Path to the topology config (JSON or YAML).
        config: PathBuf,

        /// Round the counters report.
        #[arg(long, default_value_t = 1)]
        round: u64,
    },
}

/// Listener and config shared by the serving commands.
#[derive(Args)]
struct ServeArgs {
    /// Path to the topology config (JSON or YAML).
    config: PathBuf,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    address: IpAddr,

    /// Port to bind.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Scrape path.
    #[arg(long, default_value = DEFAULT_PATH, value_parser = parse_scrape_path)]
    path: String,
}

impl ServeArgs {
    /// Server options for these arguments.
    fn options(&self) -> ServerOptions {
        ServerOptions { address: self.address, port: self.port, path: self.path.clone() }
    }
}

#[allow(clippy::cast_possible_truncation)] // one second fits
/// Whole milliseconds of `d`.
const fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Clap parser for `--verbosity`.
fn parse_verbosity(s: &str) -> Result<String, String> {
    if logging::is_valid_verbosity(s) {
        Ok(s.to_string())
    } else {
        Err(format!("not a valid log filter: {s}"))
    }
}

/// Clap parser for `--path`.
fn parse_scrape_path(s: &str) -> Result<String, String> {
    if s.starts_with('/') {
        Ok(s.to_string())
    } else {
        Err(format!("scrape path must start with '/', got: {s}"))
    }
}

/// Load the config and build the topology, or exit with the config exit code.
fn load_topology(path: &Path) -> Arc<Topology> {
    match Config::load(path) {
        Ok(config) => Arc::new(Topology::build(&config)),
        Err(err) => {
            error!(%err, "could not load topology");
            std::process::exit(err.exit_code());
        },
    }
}

/// Dispatch the parsed command.
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::ServeText(args) => {
            let topology = load_topology(&args.config);
            let renderer = Arc::new(ScrapeRenderer::new(topology, cli.seed));
            let options = args.options();
            server::serve(server::text_server(renderer, &options), &options).await
        },
        Command::ServeLive { serve, refresh_ms } => {
            let topology = load_topology(&serve.config);
            let refresh = RefreshLoop::new(topology, Duration::from_millis(refresh_ms), cli.seed);
            let options = serve.options();
            let rocket = server::registry_server(refresh.registry(), &options);
            tokio::select! {
                res = refresh.run() => res,
                res = server::serve(rocket, &options) => res,
            }
        },
        Command::Render { config, round } => {
            let topology = load_topology(&config);
            let renderer = ScrapeRenderer::starting_at(topology, round, cli.seed);
            let stdout = std::io::stdout();
            let stats = renderer.render(stdout.lock())?;
            std::io::stdout().flush()?;
            info!(series = stats.series, round = stats.round, "rendered corpus");
            Ok(())
        },
    }
}

/// Parse arguments, set up logging, run, and map failures to exit codes.
#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { exit::USAGE } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        },
    };

    // Conform to crate-standard logging.
    logging::setup(&cli.verbosity);

    if let Err(err) = run(cli).await {
        error!("{err:#}");
        std::process::exit(exit::RUNTIME);
    }
}
