use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use netpulse::config::{LogFormat, NetpulseConfig};
use netpulse::connectivity::ConnectivityState;

#[derive(Parser)]
#[command(
    name = "netpulse",
    about = "Client-side network quality probe: latency, approximate throughput and signal grade",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (overrides NETPULSE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one diagnostics pass (latency, download, upload estimate, grade)
    Run {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Grade a latency value without touching the network
    Classify {
        /// Round-trip latency in milliseconds (omit for "no sample")
        #[arg(long)]
        latency: Option<u64>,

        /// Treat the host as offline
        #[arg(long)]
        offline: bool,
    },

    /// Serve the diagnostics API over HTTP
    Serve {
        /// Bind address (defaults to [server].bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

fn init_tracing(cfg: &NetpulseConfig, json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json_logs || cfg.logging.format == LogFormat::Json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = NetpulseConfig::resolve(cli.config.as_deref())?;
    init_tracing(&cfg, cli.json_logs);

    match cli.command {
        Commands::Run { json } => {
            let runner = netpulse::build_runner(&cfg)?;
            tracing::info!("Running network diagnostics");

            let result = tokio::select! {
                result = runner.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted, abandoning run");
                    return Ok(());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("\n=== netpulse Diagnostics ===");
                println!("{}", netpulse::report::format_summary(&result));
                println!("============================\n");
            }
        }
        Commands::Classify { latency, offline } => {
            let connectivity = ConnectivityState::from_reachable(!offline);
            let grade = netpulse::quality::classify(connectivity, latency);
            println!(
                "{} {} ({} bar{})",
                netpulse::report::signal_bars(grade.bars()),
                grade,
                grade.bars(),
                if grade.bars() == 1 { "" } else { "s" }
            );
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            tracing::info!(%bind, "Starting netpulse API");
            netpulse::serve(&cfg, &bind).await?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
