use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use relay_core::{config::Config, service::ChannelService};
use relay_http::{hub, AppState};
use relay_openmeteo::OpenMeteoClient;

/// `relay` serves the channel (registering it with the hub first);
/// `relay register` only registers and exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relay_core::logging::init("relay")?;

    let cfg = Arc::new(Config::load()?);

    if std::env::args().nth(1).as_deref() == Some("register") {
        hub::register_channel(&cfg).await?;
        return Ok(());
    }

    let lookup = Arc::new(OpenMeteoClient::from_config(&cfg)?);
    let service = Arc::new(ChannelService::new(cfg.clone(), lookup)?);
    service.pin_welcome().await?;

    info!(
        channel = %cfg.channel_name,
        log = %cfg.message_file.display(),
        retention_days = cfg.max_message_age_days,
        "channel ready"
    );

    // Registration must not delay or block serving.
    {
        let cfg = cfg.clone();
        tokio::spawn(async move {
            let _ = hub::register_channel(&cfg).await;
        });
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for ctrl-c: {e}");
                return;
            }
            info!("shutting down");
            shutdown.cancel();
        });
    }

    relay_http::serve(AppState::new(cfg, service), shutdown).await
}
