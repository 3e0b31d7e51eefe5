//! Application configuration, loaded from environment (with `.env` support)
//! via `config` + `dotenvy`, following the teacher's `AppConfig::load()`
//! shape, trimmed to the fields the core actually reads.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub bind_addr: String,

    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    #[serde(default = "default_cache_depth")]
    pub cache_depth: usize,

    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Policy knobs for the matching core, resolved per DESIGN.md's Open
/// Question decisions.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_allow_self_trade")]
    pub allow_self_trade: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { allow_self_trade: default_allow_self_trade() }
    }
}

fn default_allow_self_trade() -> bool {
    true
}

fn default_lock_ttl_secs() -> u64 {
    5
}

fn default_cache_depth() -> usize {
    50
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("lock_ttl_secs", default_lock_ttl_secs() as i64)?
            .set_default("cache_depth", default_cache_depth() as i64)?
            .set_default("matching.allow_self_trade", default_allow_self_trade())?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
