use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::info;

pub struct Config {
    pub api_url: String,
    pub host: String,
    pub port: u16,
    /// `development` serves the session cookie without `Secure`.
    pub environment: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            api_url: try_load("GOSSIP_API_URL", "http://localhost:3000")?,
            host: try_load("GOSSIP_HOST", "0.0.0.0")?,
            port: try_load("GOSSIP_PORT", "5173")?,
            environment: try_load("GOSSIP_ENV", "development")?,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value: {raw}"))
}
