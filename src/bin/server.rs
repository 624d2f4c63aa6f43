use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pointfarm::db::memory::MemoryStorage;
use pointfarm::db::models::{NewUser, SettingsPatch};
use pointfarm::db::storage::Storage;
use pointfarm::farming::FarmingService;
use pointfarm::notifications::NotificationService;
use pointfarm::predictions::PredictionService;
use pointfarm::server::config::ServerConfig;

#[derive(Parser)]
#[command(name = "pointfarm-server", about = "Simulated channel-point farming backend")]
struct Args {
    /// Override the notification sweep interval, in seconds.
    #[arg(long)]
    sweep_interval: Option<u64>,
    /// Skip seeding the demo account and its channels.
    #[arg(long)]
    no_demo: bool,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false) // No ANSI colors in file
        .json(); // Log as JSON

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Combine layers and filter based on RUST_LOG
    // Default to `info` level if RUST_LOG is not set.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let args = Args::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(secs) = args.sweep_interval {
        config.sweep_interval_secs = secs;
    }

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let relay = Arc::new(NotificationService::new(Arc::clone(&storage)));
    let farming = FarmingService::new(Arc::clone(&storage));
    let predictions = PredictionService::new(Arc::clone(&storage), Arc::clone(&relay));

    let demo_session = if args.no_demo {
        None
    } else {
        Some(seed_demo(storage.as_ref(), &farming, &predictions, &config).await?)
    };

    let sweep = Arc::clone(&relay)
        .start_periodic_sweep(Duration::from_secs(config.sweep_interval_secs));

    info!("pointfarm server running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    farming.cleanup();
    sweep.abort();
    if let Some(session_id) = demo_session {
        if let Err(e) = storage.end_session(session_id).await {
            error!(error = %e, "failed to close demo session");
        }
    }

    Ok(())
}

/// Seeds the demo account, its channels and one pending bet, and starts the
/// uptime session. Returns the session id so shutdown can close it.
async fn seed_demo(
    storage: &dyn Storage,
    farming: &FarmingService,
    predictions: &PredictionService,
    config: &ServerConfig,
) -> Result<i32, Box<dyn Error>> {
    let user = match storage.get_user_by_username("demo").await? {
        Some(user) => user,
        None => {
            storage
                .create_user(NewUser {
                    username: "demo".to_string(),
                    // The account is for the simulation only and cannot be
                    // logged into.
                    password_hash: "!".to_string(),
                })
                .await?
        }
    };
    let session = storage.start_session(user.id).await?;

    storage
        .update_settings(
            user.id,
            SettingsPatch {
                discord_webhook: config.webhook_url.clone(),
                webhook_name: Some(config.webhook_name.clone()),
                ..Default::default()
            },
        )
        .await?;

    let mut channels = Vec::new();
    for name in ["xQc", "Pokimane", "shroud", "Ludwig", "Amouranth"] {
        channels.push(farming.add_channel(user.id, name).await?);
    }
    for channel in channels.iter().take(3) {
        farming.start_autofarm(channel.id).await?;
    }

    let total = storage
        .get_analytics(user.id)
        .await?
        .map(|a| a.total_points)
        .unwrap_or(0);
    let stake = predictions.calculate_bet_amount(user.id, total).await?;
    predictions
        .make_prediction(user.id, channels[0].id, "Will xQc win this game?", stake)
        .await?;

    info!(user_id = user.id, channels = channels.len(), "demo account seeded");
    Ok(session.id)
}
