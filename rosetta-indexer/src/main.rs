use std::panic;
use std::sync::Arc;

use alloy_primitives::B256;
use anyhow::Context;
use backtrace::Backtrace;
use clap::Parser;
use clap::Subcommand;
use mimalloc::MiMalloc;
use rosetta_indexer::config::Config;
use rosetta_indexer::monitor::run_monitor;
use rosetta_indexer::monitor::Progress;
use rosetta_indexer::monitor::Shutdown;
use rosetta_store::SqliteStore;
use rosetta_store::VersionedReader;
use rosetta_tracer::client::RpcChainClient;
use rosetta_tracer::Tracer;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing::span;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use warp::Filter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Clone, Debug)]
#[clap(version)]
struct Cli {
    /// Path to the configuration file.
    #[clap(short, long)]
    config: Option<String>,

    /// If set, output logs in JSON format.
    #[clap(short, long, action)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Debug)]
enum Command {
    /// Index registry and gas price minimum changes, following the chain head.
    Run,

    /// Print the ledger operations of one transaction as JSON.
    Trace {
        /// Hash of the transaction.
        #[clap(long)]
        tx: B256,
    },
}

fn setup_logging(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if json {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_env_filter(env_filter)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::fmt()
            .pretty()
            .compact()
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_env_filter(env_filter)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    }
    .context("setting up logging")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.json)?;

    panic::set_hook(Box::new(|panic_info| {
        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => {
                match panic_info.payload().downcast_ref::<String>() {
                    Some(s) => &s[..],
                    None => "Box<dyn Any>",
                }
            },
        };
        let (file, lineno, col) = match panic_info.location() {
            Some(l) => (l.file(), l.line(), l.column()),
            None => ("<unknown>", 0, 0),
        };

        error!(
            msg,
            file,
            lineno,
            col,
            "Panic occurred: {:?}",
            Backtrace::new(),
        );
    }));

    run(cli)
        .await
        .inspect_err(|err| error!("Indexer exited due to an error: {err:?}"))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let config = Config::load(cli.config)?;
    config.validate();
    debug!("Loaded configuration: {:?}", config);

    let store = Arc::new(
        SqliteStore::new(&config.store.path, config.store.read_pool_size)
            .with_context(|| format!("opening store at {}", config.store.path))?,
    );
    let client = Arc::new(RpcChainClient::connect(&config.node.url).context("creating node client")?);

    match cli.command {
        Command::Run => {
            let span = span!(
                Level::INFO,
                "indexer",
                "version" = version,
                "node" = config.node.url.as_str(),
            );
            let _guard = span.enter();
            info!("Starting indexer. version: {}", version);

            metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(([0, 0, 0, 0], config.prometheus.port))
                .install()
                .context("setting up Prometheus")?;

            run_indexer(&config, client, store).await
        },
        Command::Trace { tx } => {
            let tracer = Tracer::new(client, store, config.trace_settings());
            let operations = tracer
                .trace_by_hash(tx)
                .await
                .with_context(|| format!("tracing transaction {tx}"))?;
            println!("{}", serde_json::to_string_pretty(&operations)?);
            Ok(())
        },
    }
}

async fn run_indexer(
    config: &Config,
    client: Arc<RpcChainClient>,
    store: Arc<SqliteStore>,
) -> anyhow::Result<()> {
    let last_persisted = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || store.last_persisted_block())
            .await
            .context("reading the last persisted block")??
    };
    let progress = Arc::new(Progress::starting_at(last_persisted));

    // Start readiness and liveness check server
    let max_block_age_secs = config.health.max_block_age_secs;
    let health_port = config.health.port;
    let liveness_progress = Arc::clone(&progress);
    tokio::spawn(async move {
        let readiness_route = warp::path!("readiness")
            .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));
        let liveness_route = warp::path!("liveness").map(move || {
            if liveness_progress.idle_secs() <= max_block_age_secs {
                warp::reply::with_status("OK", warp::http::StatusCode::OK)
            } else {
                warp::reply::with_status("FAIL", warp::http::StatusCode::INTERNAL_SERVER_ERROR)
            }
        });
        let routes = readiness_route.or(liveness_route);
        warp::serve(routes)
            .run(([0, 0, 0, 0], health_port))
            .await;
    });

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupted, shutting down");
                    shutdown.trigger();
                },
                Err(err) => error!("listening for ctrl-c failed: {err}"),
            }
        });
    }

    run_monitor(
        client,
        store,
        config.monitor_settings(),
        progress,
        shutdown,
    )
    .await
}
