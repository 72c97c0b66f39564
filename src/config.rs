use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CacheError, Result};
use crate::policy::{EligibilityPolicy, FreshnessPolicy, DEFAULT_TTL_SECONDS};

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
pub const TTL_ENV: &str = "HTTP_CACHE_TTL";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served by the file source.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub eligibility: EligibilityPolicy,
    pub last_modified: LastModifiedStrategy,
}

/// Where `Last-Modified` comes from for served files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastModifiedStrategy {
    #[default]
    TtlBaseline,
    FileModified,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            root: "./public".into(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            eligibility: EligibilityPolicy::default(),
            last_modified: LastModifiedStrategy::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // 优先使用 CONFIG_PATH 指定的配置文件
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_ttl_override(std::env::var(TTL_ENV).ok().as_deref())?;
        info!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CacheError::InvalidConfiguration(e.to_string()))
    }

    pub fn apply_ttl_override(&mut self, raw: Option<&str>) -> Result<()> {
        if let Some(raw) = raw {
            let policy: FreshnessPolicy = raw.parse()?;
            self.cache.ttl_seconds = policy.ttl_seconds();
        }
        Ok(())
    }

    pub fn freshness_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::new(self.cache.ttl_seconds)
    }

    pub fn addr(&self) -> Result<std::net::SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| CacheError::InvalidConfiguration(format!("bad listen address: {}", e)))
    }
}
