use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fs, path};

use crate::key::DEFAULT_NAMESPACE;
use crate::options::{CacheOptions, DEFAULT_TTL};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "redis_addr_default")]
    pub redis_addr: String,
    #[serde(default = "namespace_default")]
    pub namespace: String,
    #[serde(default = "ttl_secs_default")]
    pub ttl_secs: u64,
    #[serde(default = "log_level_default")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_addr: redis_addr_default(),
            namespace: namespace_default(),
            ttl_secs: ttl_secs_default(),
            log_level: log_level_default(),
        }
    }
}

impl Config {
    fn get_config_dir() -> anyhow::Result<path::PathBuf> {
        let config_dir = if let Ok(xdg_path) = env::var("XDG_CONFIG_HOME") {
            path::PathBuf::from(&xdg_path)
        } else {
            let home = env::var("HOME").with_context(|| "neither XDG_CONFIG_HOME nor HOME is set")?;
            path::Path::new(&home).join(".config")
        };

        Ok(config_dir.join("interactive_cache"))
    }

    fn config_path() -> anyhow::Result<path::PathBuf> {
        if let Ok(cfg_path) = env::var("INTERACTIVE_CACHE_CFG_PATH") {
            return Ok(path::PathBuf::from(cfg_path));
        }

        Ok(Self::get_config_dir()
            .with_context(|| "fail to locate config directory")?
            .join("config.toml"))
    }

    pub fn from_path(file_path: &path::Path) -> anyhow::Result<Self> {
        if !file_path.exists() {
            anyhow::bail!("Config file not found in {file_path:?}");
        }
        let content = fs::read_to_string(file_path).with_context(|| "fail to read config file")?;

        toml::from_str(&content).with_context(|| "fail to parse config from toml")
    }

    /// Load the config file if there is one, fall back to defaults otherwise,
    /// then apply the `REDIS_ADDR` override.
    pub fn load() -> anyhow::Result<Self> {
        let file_path = Self::config_path()?;
        let mut config = if file_path.exists() {
            Self::from_path(&file_path)?
        } else {
            tracing::debug!("no config file in {file_path:?}, using defaults");
            Self::default()
        };

        if let Ok(addr) = env::var("REDIS_ADDR") {
            config.redis_addr = addr;
        }

        Ok(config)
    }

    pub fn cache_options(&self) -> anyhow::Result<CacheOptions> {
        let opts = CacheOptions::builder()
            .namespace(self.namespace.clone())
            .ttl(Duration::from_secs(self.ttl_secs))
            .build();
        opts.validate()
            .with_context(|| format!("invalid ttl_secs = {}", self.ttl_secs))?;
        Ok(opts)
    }
}

fn redis_addr_default() -> String {
    "redis://localhost:6379".to_string()
}

fn namespace_default() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn ttl_secs_default() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn log_level_default() -> String {
    "INFO".to_string()
}

#[test]
fn validate_file_correctness() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let config = r#"
        redis_addr = "redis://localhost"
        namespace = "webook"
        log_level = "DEBUG"
    "#;
    fs::write(&path, config).unwrap();

    let config = Config::from_path(&path).unwrap();
    assert_eq!(config.redis_addr, "redis://localhost");
    assert_eq!(config.namespace, "webook");
    assert_eq!(config.ttl_secs, 900);

    let opts = config.cache_options().unwrap();
    assert_eq!(opts.namespace, "webook");
    assert_eq!(opts.ttl, Duration::from_secs(900));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::from_path(&dir.path().join("nope.toml")).is_err());
}

#[test]
fn zero_ttl_is_rejected() {
    let config: Config = toml::from_str("ttl_secs = 0").unwrap();
    let err = config.cache_options().unwrap_err();
    assert!(err.to_string().contains("ttl_secs = 0"));

    let config: Config = toml::from_str(&format!("ttl_secs = {}", i64::MAX)).unwrap();
    assert!(config.cache_options().is_err());
}
