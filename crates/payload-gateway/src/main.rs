//! Payload gateway demo server.
//!
//! Configuration comes from `PAYLOAD_ENC_CONFIG` (JSON file) and
//! `PAYLOAD_ENC_*` environment variables. Startup aborts without a master
//! secret.

use anyhow::{Context, Result};
use payload_gateway::{logging, GatewayConfig, GatewayService};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::load().context("invalid encryption configuration")?;

    logging::init_logging(config.encryption.debug, config.server.json_logs)
        .context("failed to initialise logging")?;

    info!(
        enabled = config.encryption.enabled,
        force = config.encryption.force_encryption,
        fallback = config.encryption.allow_plaintext_fallback,
        kdf = config.encryption.kdf_mode().as_str(),
        replay_window_ms = config.encryption.replay_window_ms,
        "Loaded encryption configuration"
    );

    if config.encryption.debug {
        warn!("Debug logging includes session tokens");
    }

    let service = GatewayService::new(config)?;

    info!(
        version = payload_envelope::VERSION,
        "Starting payload gateway. Press Ctrl+C to stop."
    );

    service
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await?;

    Ok(())
}
