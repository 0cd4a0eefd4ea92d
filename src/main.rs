//! svg-relay — service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Init logger at default level
//!   3. Load config
//!   4. Re-apply logger filter at configured level
//!   5. Build provider + relay
//!   6. Bind HTTP channel and serve until ctrl-c

use svg_relay::{config, error::AppError, logger, relay::Relay, server};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    // Bootstrap logger at "info" before config is available.
    let log_handle = logger::init("info", false)?;

    let config = config::load()?;
    logger::set_level(&log_handle, &config.log_level)?;

    info!(
        provider = %config.llm.provider,
        model = %config.active_model(),
        response_format = config.relay.response_format.as_str(),
        bind = %config.server.bind,
        log_level = %config.log_level,
        "config loaded"
    );

    let relay = Relay::from_config(&config)?;
    let channel = server::HttpChannel::bind(&config.server.bind, server::AppState::new(relay)).await?;
    println!("✓ svg-relay listening: http://{}", channel.local_addr()?);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            return;
        }
        info!("ctrl-c received, shutting down");
        signal_token.cancel();
    });

    channel.run(shutdown).await
}
