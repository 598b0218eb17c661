// Jukebox jury bot entry point.
//
// Startup sequence:
// 1. Resolve the base directory (first argument, else the working directory)
// 2. Initialize tracing (log to file)
// 3. Load config
// 4. Build the Telegram client
// 5. Spawn the long-poll task
// 6. Spawn the app loop and wait for it or Ctrl+C

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use jukebox_bot::app;
use jukebox_bot::config;
use jukebox_bot::telegram;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Base directory
    let base_dir = match std::env::args_os().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };

    // 2. Tracing
    init_tracing(&base_dir)?;
    info!("Jukebox jury starting up in {}", base_dir.display());

    // 3. Config
    let config = config::load_config(&base_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: chat {}, rating scale {}, deterministic={}, results to {:?} as {:?}",
        config.telegram.chat_id,
        config.game.rating_scale,
        config.game.deterministic,
        config.results.sink,
        config.results.format
    );

    // 4. Telegram client
    let token = config
        .credentials
        .bot_token
        .as_deref()
        .context("bot token missing from credentials")?;
    let client = Arc::new(
        telegram::TelegramClient::new(
            &config.telegram.api_url,
            token,
            config.telegram.poll_timeout_secs,
        )
        .context("failed to build Telegram client")?,
    );

    // 5. Poller
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let poll_handle = tokio::spawn(telegram::poll_updates(
        Arc::clone(&client),
        config.telegram.poll_timeout_secs,
        inbound_tx,
    ));

    // 6. App loop
    let app_state = app::App::from_config(&config, client);
    let mut app_handle = tokio::spawn(app::run(inbound_rx, app_state));
    info!("Application ready");

    tokio::select! {
        res = &mut app_handle => match res {
            Ok(Ok(())) => info!("Application loop finished"),
            Ok(Err(e)) => error!("Application loop error: {}", e),
            Err(e) => error!("Application task failed: {}", e),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            app_handle.abort();
        }
    }

    poll_handle.abort();

    info!("Jukebox jury shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `<base>/logs/jukebox-jury.log`.
fn init_tracing(base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("jukebox-jury.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jukebox_bot=info,jukebox_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
