use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_desk::api::router;
use session_desk::backend::HttpSessionBackend;
use session_desk::config::AppConfig;
use session_desk::state::{AppState, IdleReaper};

const REAPER_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "session_desk=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;
    let backend = Arc::new(HttpSessionBackend::new(&config)?);
    info!("using session backend at {}", config.api_base_url);

    let state = AppState::new(backend);
    tokio::spawn(IdleReaper::new(state.clone(), REAPER_INTERVAL, config.modal_idle_ttl).start());

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
