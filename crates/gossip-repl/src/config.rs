use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, ensure};
use tracing::info;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3000";

pub struct Config {
    pub api_url: Url,
    pub ws_url: Url,
}

impl Config {
    /// Read and validate both endpoints before anything touches the network.
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            api_url: with_scheme(
                "GOSSIP_API_URL",
                try_load("GOSSIP_API_URL", DEFAULT_API_URL)?,
                &["http", "https"],
            )?,
            ws_url: with_scheme(
                "GOSSIP_WS_URL",
                try_load("GOSSIP_WS_URL", DEFAULT_WS_URL)?,
                &["ws", "wss"],
            )?,
        })
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
    parse(key, &raw)
}

fn parse<T: FromStr>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value: {raw}"))
}

fn with_scheme(key: &str, url: Url, schemes: &[&str]) -> anyhow::Result<Url> {
    ensure!(
        schemes.contains(&url.scheme()),
        "{key} must use {}, got {url}",
        schemes.join(" or ")
    );
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let api: Url = parse("GOSSIP_API_URL", DEFAULT_API_URL).unwrap();
        let ws: Url = parse("GOSSIP_WS_URL", DEFAULT_WS_URL).unwrap();
        assert!(with_scheme("GOSSIP_API_URL", api, &["http", "https"]).is_ok());
        assert!(with_scheme("GOSSIP_WS_URL", ws, &["ws", "wss"]).is_ok());
    }

    #[test]
    fn malformed_url_names_the_variable() {
        let err = parse::<Url>("GOSSIP_WS_URL", "not a url").unwrap_err();
        assert!(err.to_string().contains("GOSSIP_WS_URL"));
    }

    #[test]
    fn socket_url_must_be_websocket() {
        let url: Url = parse("GOSSIP_WS_URL", "http://127.0.0.1:3000").unwrap();
        let err = with_scheme("GOSSIP_WS_URL", url, &["ws", "wss"]).unwrap_err();
        assert!(err.to_string().contains("ws or wss"));
    }
}
