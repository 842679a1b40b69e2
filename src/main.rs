use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use upbitbot::api::UpbitClient;
use upbitbot::config::AppConfig;
use upbitbot::engine::TradingEngine;
use upbitbot::notify::Notifier;

#[derive(Parser, Debug)]
#[command(name = "upbitbot", about = "Volatility-breakout trading bot for Upbit")]
struct Cli {
    /// Configuration file, extension optional
    #[arg(short, long, default_value = "Settings")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _guard = setup_logging();

    tracing::info!("🚀 Upbit breakout bot starting");

    let config = AppConfig::load(&cli.config)?;

    // API credentials stay in the environment, never in Settings.toml
    let access_key =
        std::env::var("UPBIT_ACCESS_KEY").expect("UPBIT_ACCESS_KEY not found in environment");
    let secret_key =
        std::env::var("UPBIT_SECRET_KEY").expect("UPBIT_SECRET_KEY not found in environment");

    // Environment wins over the config file for the webhook
    let webhook = std::env::var("DISCORD_WEBHOOK_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .or_else(|| config.notify.webhook());

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Window mode: {:?}", config.windows.mode);
    tracing::info!("  Breakout k: {}", config.strategy.k);
    tracing::info!("  Min order: {} KRW", config.strategy.min_order_krw);
    tracing::info!("  Confirmation: {:?}", config.execution.confirmation);
    tracing::info!(
        "  Notifications: {}",
        if webhook.is_some() { "on" } else { "off" }
    );
    tracing::info!("  Assets: {}", config.assets.len());
    for asset in &config.assets {
        tracing::info!("    - {} (weight {})", asset.symbol, asset.weight);
    }

    let exchange = UpbitClient::new(access_key, secret_key)?;
    let notifier = Notifier::new(webhook);
    let mut engine = TradingEngine::new(exchange, notifier, &config).await?;

    tokio::select! {
        result = engine.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("🛑 Shutdown signal received, stopping");
        }
    }

    tracing::info!("👋 Bot stopped");
    Ok(())
}

/// Console plus a daily-rolling file under logs/. The guard keeps the
/// background writer alive for the life of the process.
fn setup_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "upbitbot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("upbitbot=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    guard
}
