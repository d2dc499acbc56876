use anyhow::{Context, Result};
use hut_watch::{AppConfig, AvailabilityWatcher, EventDataClient, SmtpNotifier};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// Runs once and exits; scheduling is left to cron or a CI timer
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_logger()?;
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let source = EventDataClient::new(&config.upstream).context("failed to build HTTP client")?;
    tracing::debug!(base_url = source.base_url(), "Upstream session ready");
    let notifier = SmtpNotifier::new(config.mail.clone());
    let watcher = AvailabilityWatcher::new(config.watch, &config.mail, source, notifier);

    // Fetch failures are logged inside the run and still exit 0; a failed send does not
    let outcome = watcher.run().await.context("failed to send notification")?;
    tracing::debug!(status = ?outcome.status(), ?outcome, "Run finished");
    Ok(())
}

fn init_logger() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let subscriber = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(subscriber)
        .with(env_filter)
        .try_init()?;

    Ok(())
}
