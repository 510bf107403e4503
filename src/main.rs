use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ongoing_game::analysis::AnalysisFixture;
use ongoing_game::backend::{Backends, SessionSource};
use ongoing_game::config::AppConfig;
use ongoing_game::fetch::{LcuClient, SgpClient};
use ongoing_game::publish::{BroadcastPublisher, FanoutPublisher, Publisher, TracingPublisher};
use ongoing_game::storage::SavedPlayerStore;
use ongoing_game::{OngoingGame, SessionSnapshot};

#[derive(Parser)]
#[command(name = "ongoing-game")]
#[command(about = "Player data and premade detection for the game in progress")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the local client and print engine events as JSON lines
    Watch {
        /// Override the configured poll interval (milliseconds)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Run the analyzers over a JSON fixture and print the result
    Analyze {
        /// Fixture with `teams`, `matchHistory` and an optional `threshold`
        fixture: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!("Starting ongoing-game v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Watch { interval_ms } => {
            let config = load_config(&cli.config)?;
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.poll_interval_ms));
            watch(config, interval).await?;
        }

        Commands::Analyze { fixture } => {
            let contents = std::fs::read_to_string(&fixture)
                .with_context(|| format!("Failed to read fixture {}", fixture.display()))?;
            let fixture: AnalysisFixture =
                serde_json::from_str(&contents).context("Failed to parse fixture")?;

            let report = fixture.run();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Missing config file means defaults; a broken one is an error.
fn load_config(path: &PathBuf) -> Result<AppConfig> {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    AppConfig::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

async fn watch(config: AppConfig, interval: Duration) -> Result<()> {
    let lcu = Arc::new(LcuClient::new(&config.primary)?);
    let sgp = Arc::new(SgpClient::new(&config.auxiliary)?);
    let saved = Arc::new(SavedPlayerStore::new(config.saved_players.path.clone()));

    let broadcast = Arc::new(BroadcastPublisher::new(256));
    let mut events = broadcast.subscribe();
    let publisher: Arc<dyn Publisher> = Arc::new(FanoutPublisher(vec![
        broadcast.clone() as Arc<dyn Publisher>,
        Arc::new(TracingPublisher),
    ]));

    let engine = OngoingGame::new(
        config.settings.clone(),
        Backends {
            primary: lcu.clone(),
            auxiliary: sgp.clone(),
            saved,
        },
        publisher,
    )?;

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("Failed to serialize event: {}", e),
                },
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = match lcu.snapshot().await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::debug!("Session unavailable: {}", e);
                        SessionSnapshot::default()
                    }
                };
                if let Some(me) = &snapshot.me {
                    sgp.set_active_server(&me.platform_id);
                }

                let batch = engine.observe_session(snapshot).await;
                if batch.issued() > 0 {
                    tracing::info!("Issued {} fetches ({} skipped)", batch.issued(), batch.skipped());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    engine.shutdown().await;
    drop(engine);
    printer.abort();
    Ok(())
}
