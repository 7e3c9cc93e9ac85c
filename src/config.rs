use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_MODAL_IDLE_SECS: u64 = 30 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: String,
    pub bind_addr: SocketAddr,
    /// How long an open attendance sheet or editor may go untouched before
    /// it is discarded.
    pub modal_idle_ttl: Duration,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let api_base_url = env::var("SESSION_API_BASE_URL")
            .map_err(|_| AppError::Config("SESSION_API_BASE_URL is not set".to_string()))?;
        let api_token = env::var("SESSION_API_TOKEN")
            .map_err(|_| AppError::Config("SESSION_API_TOKEN is not set".to_string()))?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let mut config = Self::new(api_base_url, api_token, &bind_addr)?;
        if let Ok(secs) = env::var("MODAL_IDLE_TTL_SECS") {
            config.modal_idle_ttl = parse_idle_ttl(&secs)?;
        }
        Ok(config)
    }

    pub fn new(api_base_url: String, api_token: String, bind_addr: &str) -> Result<Self, AppError> {
        let api_base_url = api_base_url.trim_end_matches('/').to_string();
        if api_base_url.is_empty() {
            return Err(AppError::Config("SESSION_API_BASE_URL is empty".to_string()));
        }
        let bind_addr = bind_addr
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid BIND_ADDR {}: {}", bind_addr, e)))?;

        Ok(Self {
            api_base_url,
            api_token,
            bind_addr,
            modal_idle_ttl: Duration::from_secs(DEFAULT_MODAL_IDLE_SECS),
        })
    }
}

fn parse_idle_ttl(raw: &str) -> Result<Duration, AppError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(AppError::Config(format!(
            "MODAL_IDLE_TTL_SECS must be a positive number of seconds, got {:?}",
            raw
        ))),
    }
}
