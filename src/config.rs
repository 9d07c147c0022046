//! Runtime configuration, read from environment variables over the
//! compiled-in defaults in the crate root.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::{DEFAULT_BIND, DEFAULT_PORT, EXCLUDE_FOLDERS, GITHUB_API_URL, PUBLIC_DIR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidPort(String),
    InvalidBind(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort(v) => write!(f, "PORT must be a port number, got '{}'", v),
            ConfigError::InvalidBind(v) => {
                write!(f, "MDVIEW_BIND must be an IP address, got '{}'", v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    /// Contents API URL of the repository root to list.
    pub listing_url: String,
    pub exclude_folders: Vec<String>,
    /// Directory served as static files.
    pub public_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            port: DEFAULT_PORT,
            listing_url: GITHUB_API_URL.to_string(),
            exclude_folders: EXCLUDE_FOLDERS.iter().map(|s| s.to_string()).collect(),
            public_dir: PathBuf::from(PUBLIC_DIR),
        }
    }
}

impl Config {
    /// Read `PORT`, `MDVIEW_BIND`, `MDVIEW_LISTING_URL` and
    /// `MDVIEW_PUBLIC_DIR`. Unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(port) = get("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }
        if let Some(bind) = get("MDVIEW_BIND") {
            config.bind = bind.parse().map_err(|_| ConfigError::InvalidBind(bind))?;
        }
        if let Some(url) = get("MDVIEW_LISTING_URL") {
            config.listing_url = url;
        }
        if let Some(dir) = get("MDVIEW_PUBLIC_DIR") {
            config.public_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn exclude_folders(&self) -> Vec<&str> {
        self.exclude_folders.iter().map(String::as_str).collect()
    }
}
