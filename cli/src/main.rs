//! arvex — command-line front end for the browse pipeline.

use anyhow::Context;
use arvex_routing::{
    GatewayPoolProvider, GatewayRouter, HttpLatencyProber, HttpPeerSource, RoutingStrategy,
};
use arvex_session::{init_logging, BrowseConfig, Browser, LogFormat, SearchStatus};
use arvex_types::{Identifier, Timestamp};
use arvex_verification::HttpContentFetcher;
use arvex_worker::WorkerHandle;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "arvex", about = "Verified permaweb browsing from the terminal")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "ARVEX_CONFIG")]
    config: Option<PathBuf>,

    /// Routing strategy: "preferred", "fastest", "random", or "roundRobin".
    #[arg(long, env = "ARVEX_STRATEGY")]
    strategy: Option<String>,

    /// Gateway used by the "preferred" strategy.
    #[arg(long, env = "ARVEX_GATEWAY")]
    gateway: Option<String>,

    /// Skip content verification entirely.
    #[arg(long, env = "ARVEX_NO_VERIFY")]
    no_verify: bool,

    /// Refuse to display content that failed verification.
    #[arg(long, env = "ARVEX_STRICT")]
    strict: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ARVEX_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "ARVEX_LOG_FORMAT")]
    log_format: Option<String>,

    /// Dump Prometheus metrics after the command finishes.
    #[arg(long, env = "ARVEX_METRICS")]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Search an identifier, verify it, and report the outcome.
    Browse {
        /// Transaction ID or ArNS name.
        input: String,

        /// Display blocked content anyway (strict mode override).
        #[arg(long)]
        proceed: bool,
    },
    /// Resolve an identifier to a gateway URL without verifying.
    Resolve {
        /// Transaction ID or ArNS name.
        input: String,
    },
    /// Print the current gateway pool.
    Gateways,
}

fn load_config(cli: &Cli) -> anyhow::Result<BrowseConfig> {
    let mut config = match &cli.config {
        Some(path) => BrowseConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => BrowseConfig::default(),
    };

    if let Some(strategy) = cli.strategy.as_deref() {
        config.routing_strategy = RoutingStrategy::from_str(strategy)
            .map_err(|e| anyhow::anyhow!("invalid --strategy: {e}"))?;
    }
    if let Some(gateway) = &cli.gateway {
        config.preferred_gateway = Some(gateway.clone());
        if cli.strategy.is_none() {
            config.routing_strategy = RoutingStrategy::Preferred;
        }
    }
    if cli.no_verify {
        config.verification_enabled = false;
    }
    if cli.strict {
        config.strict_verification = true;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_router(config: &BrowseConfig) -> GatewayRouter<HttpPeerSource, HttpLatencyProber> {
    let pool = GatewayPoolProvider::new(HttpPeerSource::new(), config.peer_endpoints());
    GatewayRouter::new(
        pool,
        HttpLatencyProber::new(),
        config.routing_strategy,
        config.preferred_gateway.clone(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(LogFormat::parse(&config.log_format), &config.log_level);

    match &cli.command {
        Command::Browse { input, proceed } => {
            browse(&cli, config, input, *proceed).await?;
        }
        Command::Resolve { input } => {
            let identifier = Identifier::classify(input)?;
            let mut router = build_router(&config);
            let gateway = router.select_gateway(Timestamp::now()).await;
            println!("{}", arvex_types::url::resolved_url(&identifier, &gateway));
        }
        Command::Gateways => {
            let mut router = build_router(&config);
            for gateway in router.gateway_pool(Timestamp::now()).await {
                println!("{gateway}");
            }
        }
    }
    Ok(())
}

async fn browse(cli: &Cli, config: BrowseConfig, input: &str, proceed: bool) -> anyhow::Result<()> {
    let router = build_router(&config);
    let worker = WorkerHandle::spawn(HttpContentFetcher::new());
    let mut browser = Browser::new(config, router, HttpLatencyProber::new(), worker).await?;

    tracing::info!(input, "starting search");
    browser.search(input).await?;

    if proceed {
        browser.proceed_anyway();
    }

    let session = browser.session();
    let status = session.status();
    let stats = session.stats();
    match status {
        SearchStatus::Verified => {
            println!("verified {} of {} resources", stats.verified, stats.total);
        }
        SearchStatus::Partial => {
            println!(
                "partially verified: {} of {} resources ({} failed)",
                stats.verified, stats.total, stats.failed
            );
            for path in &stats.failed_resources {
                println!("  failed: {path}");
            }
        }
        SearchStatus::Failed => {
            println!(
                "verification failed: {}",
                session.error().unwrap_or("unknown error")
            );
        }
        _ if session.is_unverified_path() => {
            println!("serving without verification");
        }
        _ => {}
    }

    if session.display_blocked() {
        println!("display blocked by strict verification; re-run with --proceed to override");
    } else if let Some(url) = session.resolved_url() {
        println!("{url}");
    }

    if session.is_finished() && browser.manual_retry_available() {
        println!("automatic retries exhausted; run the command again to retry");
    }

    if cli.metrics {
        dump_metrics(&browser)?;
    }

    browser.shutdown().await;
    if status == SearchStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

fn dump_metrics(
    browser: &Browser<HttpPeerSource, HttpLatencyProber, HttpLatencyProber>,
) -> anyhow::Result<()> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    encoder.encode(&browser.metrics().registry.gather(), &mut buf)?;
    print!("{}", String::from_utf8_lossy(&buf));
    Ok(())
}
