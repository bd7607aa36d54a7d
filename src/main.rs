use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error};

/// Web console for streaming network diagnostics
#[derive(Parser)]
#[command(name = "nettoolbox")]
#[command(about = "Run ping, whois, dig and friends from a browser, live", version)]
struct Cli {
    /// Address to bind (default: 0.0.0.0)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (default: 3000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,tower=debug", // -vvv shows everything including dependencies
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("nettoolbox started with verbosity level: {}", cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> nettoolbox::Result<()> {
    let mut config = nettoolbox::config::load(cli.config.as_deref()).await?;
    config.apply_overrides(cli.bind, cli.port);
    nettoolbox::server::run(config).await
}
