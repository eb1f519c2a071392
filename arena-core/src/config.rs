//! Network configuration from the environment.
//!
//! Binaries load a `.env` file with `dotenvy` before calling
//! [`NetConfig::from_env`].

use thiserror::Error;

pub const DEFAULT_SERVER_HOST: &str = "localhost";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PVP_PORT: u16 = 7000;
pub const DEFAULT_CHAT_PORT: u16 = 8081;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid port in {var}: {value:?}")]
    InvalidPort { var: &'static str, value: String },
}

/// Hosts and ports for the relay and its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    /// Primary host clients dial.
    pub server_host: String,
    /// Tried once if the primary host cannot be reached.
    pub fallback_host: Option<String>,
    /// Address the relay listens on.
    pub bind_host: String,
    pub pvp_port: u16,
    pub chat_port: u16,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_SERVER_HOST.to_string(),
            fallback_host: None,
            bind_host: DEFAULT_BIND_HOST.to_string(),
            pvp_port: DEFAULT_PVP_PORT,
            chat_port: DEFAULT_CHAT_PORT,
        }
    }
}

impl NetConfig {
    /// Read `SERVER_HOST`, `FALLBACK_HOST`, `BIND_HOST`, `PVP_PORT` and `CHAT_PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            server_host: non_empty("SERVER_HOST").unwrap_or(defaults.server_host),
            fallback_host: non_empty("FALLBACK_HOST"),
            bind_host: non_empty("BIND_HOST").unwrap_or(defaults.bind_host),
            pvp_port: parse_port("PVP_PORT", non_empty("PVP_PORT"), defaults.pvp_port)?,
            chat_port: parse_port("CHAT_PORT", non_empty("CHAT_PORT"), defaults.chat_port)?,
        })
    }

    pub fn with_server_host(mut self, host: impl Into<String>) -> Self {
        self.server_host = host.into();
        self
    }

    pub fn with_fallback_host(mut self, host: impl Into<String>) -> Self {
        self.fallback_host = Some(host.into());
        self
    }

    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    pub fn with_pvp_port(mut self, port: u16) -> Self {
        self.pvp_port = port;
        self
    }

    pub fn with_chat_port(mut self, port: u16) -> Self {
        self.chat_port = port;
        self
    }

    /// `host:port` strings to dial for PvP, primary first.
    pub fn pvp_targets(&self) -> Vec<String> {
        let mut targets = vec![format!("{}:{}", self.server_host, self.pvp_port)];
        if let Some(fallback) = &self.fallback_host {
            targets.push(format!("{fallback}:{}", self.pvp_port));
        }
        targets
    }

    pub fn pvp_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.pvp_port)
    }

    pub fn chat_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.chat_port)
    }
}

fn parse_port(var: &'static str, value: Option<String>, default: u16) -> Result<u16, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort { var, value }),
    }
}
