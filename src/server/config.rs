use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::verify::VerifyOptions;

pub const ENV_CONFIG: &str = "MAILPROBE_CONFIG";
pub const ENV_API_KEY: &str = "MAILPROBE_API_KEY";
pub const ENV_ALLOWED_ORIGINS: &str = "MAILPROBE_ALLOWED_ORIGINS";
pub const ENV_PORT: &str = "PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("api_key is empty (set it in the config file or MAILPROBE_API_KEY)")]
    MissingApiKey,
    #[error("invalid listen address '{addr}': {source}")]
    ListenAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("invalid PORT value '{0}'")]
    Port(String),
    #[error("invalid CORS origin '{0}'")]
    Origin(String),
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "mailprobe=info,tower_http=info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LogConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Settings of the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub api_key: String,
    pub allowed_origins: Vec<String>,
    pub verify: VerifyOptions,
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            api_key: String::new(),
            allowed_origins: Vec::new(),
            verify: VerifyOptions::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Defaults, then the optional file (`path`, else `MAILPROBE_CONFIG`),
    /// then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(ENV_CONFIG).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            let port: u16 = port.trim().parse().map_err(|_| ConfigError::Port(port.clone()))?;
            let mut addr = self.socket_addr()?;
            addr.set_port(port);
            self.listen_addr = addr.to_string();
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(origins) = lookup(ENV_ALLOWED_ORIGINS) {
            self.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.socket_addr()?;
        for origin in &self.allowed_origins {
            HeaderValue::from_str(origin).map_err(|_| ConfigError::Origin(origin.clone()))?;
        }
        let probe = &self.verify.probe;
        for (name, value) in [
            ("verify.dns_timeout_ms", self.verify.dns_timeout_ms),
            ("verify.probe.timeout_ms", probe.timeout_ms),
            ("verify.probe.connect_timeout_ms", probe.connect_timeout_ms),
            ("verify.probe.command_timeout_ms", probe.command_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|source| ConfigError::ListenAddr {
                addr: self.listen_addr.clone(),
                source,
            })
    }
}
