//! VoIP Armor - Entry point

use std::net::SocketAddr;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use voip_armor::config::Config;
use voip_armor::error::ArmorError;
use voip_armor::server::{AppState, RateLimitConfig, RateLimiter, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    FmtSubscriber::builder()
        .with_max_level(if config.app.debug {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .init();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| ArmorError::Config(format!("Invalid SERVER_HOST: {}", e)))?;

    let mut state = AppState::new(config.app.name.clone(), config.app.version.clone());
    if config.rate_limit.enabled {
        state = state.with_rate_limiter(RateLimiter::new(RateLimitConfig::from(
            &config.rate_limit,
        )));
    }

    tracing::info!(
        name = %config.app.name,
        version = %config.app.version,
        rate_limit = config.rate_limit.enabled,
        "Starting VoIP Armor"
    );

    let server = Server::bind(addr, state).await?;
    server.run().await?;

    Ok(())
}
