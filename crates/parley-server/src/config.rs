use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_DB_PATH: &str = "parley.db";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_READERS: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub db_readers: usize,
}

impl Config {
    /// Read `PARLEY_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_path = lookup("PARLEY_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into());
        let host = lookup("PARLEY_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let port = match lookup("PARLEY_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid PARLEY_PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };
        let db_readers = match lookup("PARLEY_DB_READERS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid PARLEY_DB_READERS: {raw}"))?,
            None => DEFAULT_DB_READERS,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            host,
            port,
            db_readers,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().with_context(|| format!("invalid listen address: {addr}"))
    }
}
