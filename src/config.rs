use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use anyhow::{Context, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_INDEX_PATH: &str = "static/index.html";

#[derive(Debug, Clone)]
pub struct Config {
    pub model_path: PathBuf,
    pub meta_path: PathBuf,
    pub addr: SocketAddr,
    pub index_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let model_path = get("MODEL_PATH").context("MODEL_PATH not set")?;
        let meta_path = get("META_PATH").context("META_PATH not set")?;

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host: IpAddr = host
            .parse()
            .with_context(|| format!("HOST {host:?} is not an IP address"))?;
        let port = match get("PORT") {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("PORT {p:?} is not a valid port"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            model_path: model_path.into(),
            meta_path: meta_path.into(),
            addr: SocketAddr::new(host, port),
            index_path: get("INDEX_PATH")
                .unwrap_or_else(|| DEFAULT_INDEX_PATH.to_string())
                .into(),
        })
    }
}
