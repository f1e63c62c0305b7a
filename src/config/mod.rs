//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::util::rate_limit::COMMAND_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma separated; `*` allows any
    pub client_origin: String,

    /// How often a running match is simulated
    pub tick_period: Duration,
    /// How often the lobby scheduler wakes up
    pub scheduler_poll: Duration,
    /// Delay before a bot's first decision
    pub bot_initial_delay: Duration,
    /// Delay between a bot's decisions
    pub bot_update_delay: Duration,

    /// Commands per second allowed per player
    pub command_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PORT wins when the host provides one, then SERVER_ADDR
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8182".to_string()),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            tick_period: millis(&lookup, "TICK_PERIOD_MS", 3_000)?,
            scheduler_poll: millis(&lookup, "SCHEDULER_POLL_MS", 100)?,
            bot_initial_delay: millis(&lookup, "BOT_INITIAL_DELAY_MS", 5_000)?,
            bot_update_delay: millis(&lookup, "BOT_UPDATE_DELAY_MS", 30_000)?,

            command_rate_limit: parse(&lookup, "COMMAND_RATE_LIMIT", COMMAND_RATE_LIMIT)?,
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        None => Ok(default),
    }
}

fn millis<F>(lookup: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let ms: u64 = parse(lookup, name, default)?;
    if ms == 0 {
        return Err(ConfigError::Invalid(name));
    }
    Ok(Duration::from_millis(ms))
}

/// Configuration errors
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
