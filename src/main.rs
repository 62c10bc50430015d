use clap::{Parser, Subcommand};
use log::{info, warn};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use pagewatch::{Error, HttpFetcher, commands::App, config::Config};

#[derive(Parser)]
#[command(name = "pagewatch")]
#[command(version)]
#[command(about = "Monitor webpage changes from the CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a URL to monitor
    Add { url: String },
    /// Check a URL or all URLs for changes
    Check {
        /// URL or list number (all URLs when omitted)
        url: Option<String>,
    },
    /// List all monitored URLs
    List,
    /// Remove a URL from monitoring
    Remove {
        /// URL or list number
        url: String,
    },
    /// Continuously watch a URL for changes
    Watch {
        /// URL or list number; untracked URLs are added first
        url: String,
        /// Check interval in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Monitor multiple URLs continuously (all if none specified)
    Monitor {
        /// URLs or list numbers
        urls: Vec<String>,
        /// Check interval in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Open a URL in the browser
    Open {
        /// URL or list number
        url: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));
    let cli = Cli::parse();

    // Operation errors are reported, not turned into an exit status.
    if let Err(e) = run(cli).await {
        println!("✗ {e}");
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::load()?;
    let fetcher = HttpFetcher::new(config.timeout())?;
    let app = App::new(config.store(), fetcher);
    let interval = |flag: Option<u64>| {
        Duration::from_secs(flag.unwrap_or(config.config.check_interval_secs))
    };

    match cli.command {
        Commands::Add { url } => app.add(&url).await,
        Commands::Check { url } => app.check(url.as_deref()).await.map(drop),
        Commands::List => {
            app.list();
            Ok(())
        }
        Commands::Remove { url } => app.remove(&url).map(drop),
        Commands::Watch { url, interval: secs } => app
            .watch(&url, interval(secs), shutdown_token())
            .await
            .map(drop),
        Commands::Monitor { urls, interval: secs } => app
            .monitor(&urls, interval(secs), shutdown_token())
            .await
            .map(drop),
        Commands::Open { url } => app.open(&url).await.map(drop),
    }
}

/// Cancelled on the first Ctrl+C. The scheduler finishes its current check
/// before stopping; a second Ctrl+C exits immediately.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received, finishing the current check");
        trigger.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    token
}
