use crate::consts::DEFAULT_CACHE_DIR;
use observability::conf::{Settings, TelemetryConfig};
use observability::telemetry::{init_tracing, TracingGuard};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

const ENV_PREFIX: &str = "KEYSETS";
const DEFAULT_SERVICE_NAME: &str = "keysets";

#[derive(Serialize, Deserialize, Validate, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KeysetsConfig {
    /// Root directory of the keyset cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[validate(nested)]
    pub telemetry: Option<TelemetryConfig>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

impl Default for KeysetsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            telemetry: None,
        }
    }
}

impl KeysetsConfig {
    /// The telemetry section, or a default one naming the keysets service.
    pub fn telemetry(&self) -> TelemetryConfig {
        self.telemetry.clone().unwrap_or_else(|| {
            TelemetryConfig::builder()
                .tracing_service_name(DEFAULT_SERVICE_NAME)
                .build()
        })
    }
}

/// Loads the configuration from the layered sources, with `config_file` on top
/// of the `config/` defaults when given.
pub fn init_conf(config_file: Option<&str>) -> anyhow::Result<KeysetsConfig> {
    let settings = match config_file {
        Some(path) => Settings::builder().path(path).env_prefix(ENV_PREFIX).build(),
        None => Settings::builder().env_prefix(ENV_PREFIX).build(),
    };
    let conf: KeysetsConfig = settings.init_conf()?;
    conf.validate()?;
    Ok(conf)
}

/// Loads and validates the configuration, then installs the tracing subscriber it describes.
pub fn init_conf_keysets_telemetry(
    config_file: Option<&str>,
) -> anyhow::Result<(KeysetsConfig, TracingGuard)> {
    let conf = init_conf(config_file)?;
    let guard = init_tracing(&conf.telemetry())?;
    Ok((conf, guard))
}
