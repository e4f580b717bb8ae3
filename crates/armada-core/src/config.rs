use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TIME_ZONE: &str = "UTC";
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 30_000;

/// Top-level config (armada.toml + ARMADA_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmadaConfig {
    #[serde(default)]
    pub periodic: PeriodicDispatchConfig,
}

/// Settings for the periodic job dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicDispatchConfig {
    /// IANA zone for cron specs on jobs that don't declare one.
    /// Override with env var: ARMADA_PERIODIC__DEFAULT_TIME_ZONE=Europe/Oslo
    #[serde(default = "default_time_zone")]
    pub default_time_zone: String,
    /// Upper bound for a single call into the eval dispatcher.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
}

impl Default for PeriodicDispatchConfig {
    fn default() -> Self {
        Self {
            default_time_zone: default_time_zone(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
        }
    }
}

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}
fn default_dispatch_timeout_ms() -> u64 {
    DEFAULT_DISPATCH_TIMEOUT_MS
}

impl ArmadaConfig {
    /// Load config from a TOML file with ARMADA_* env var overrides.
    ///
    /// Without an explicit path, `~/.armada/armada.toml` is used. A missing
    /// file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(path = %path, "loading config");

        Self::from_figment(Figment::new().merge(Toml::file(&path)))
    }

    fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        // Split on "__" so multi-word keys like default_time_zone survive:
        // ARMADA_PERIODIC__DEFAULT_TIME_ZONE -> periodic.default_time_zone
        let config: ArmadaConfig = figment
            .merge(Env::prefixed("ARMADA_").split("__"))
            .extract()
            .map_err(|e| crate::error::ArmadaError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.armada/armada.toml", home)
}
