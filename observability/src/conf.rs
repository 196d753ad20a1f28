use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use typed_builder::TypedBuilder;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FILE_PREFIX: &str = "keysets.log";

lazy_static::lazy_static! {
    pub(crate) static ref ENVIRONMENT: ExecutionEnvironment = mode();
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, TypedBuilder, Validate)]
pub struct TelemetryConfig {
    /// The service name attached to every log line.
    ///
    /// Service Name should contain the following pattern:
    ///
    /// ```text
    /// <service_name> := <alpha>_<service_name> | <alpha>
    /// <alpha> := [a-z]*
    /// ```
    #[builder(setter(into))]
    #[validate(length(min = 1))]
    tracing_service_name: String,

    // All the following settings are optional.
    /// Default filter directive when `RUST_LOG` is not set. Defaults to `info`.
    #[builder(default, setter(strip_option, into))]
    log_level: Option<String>,

    /// If this is set, the tracing system will use json logs.
    #[builder(default, setter(strip_option))]
    json_logs: Option<bool>,

    /// Directory for an additional plain-text log file. Stdout only when unset.
    #[builder(default, setter(strip_option, into))]
    log_dir: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Returns the service name.
    pub fn tracing_service_name(&self) -> &str {
        &self.tracing_service_name
    }

    /// Returns the default log filter directive.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Returns whether logs are emitted as json.
    pub fn json_logs(&self) -> bool {
        self.json_logs.unwrap_or(false)
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    pub fn log_file_prefix(&self) -> &'static str {
        DEFAULT_LOG_FILE_PREFIX
    }
}

#[derive(
    Default, Display, Deserialize, Serialize, Clone, EnumString, AsRefStr, Eq, PartialEq, Debug,
)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionEnvironment {
    #[default]
    Local,
    #[strum(serialize = "dev")]
    Development,
    Stage,
    #[strum(serialize = "prod")]
    Production,
    Integration,
}

/// The execution environment selected by the `RUN_MODE` variable.
pub fn execution_environment() -> &'static ExecutionEnvironment {
    &ENVIRONMENT
}

#[derive(TypedBuilder, Debug)]
pub struct Settings<'a> {
    #[builder(setter(strip_option), default = None)]
    path: Option<&'a str>,
    env_prefix: &'a str,
}

fn mode() -> ExecutionEnvironment {
    env::var("RUN_MODE")
        .map(|enum_str| ExecutionEnvironment::from_str(enum_str.as_str()).unwrap_or_default())
        .unwrap_or_else(|_| ExecutionEnvironment::Local)
}

impl Settings<'_> {
    /// Builds the configuration from the layered sources and deserializes it.
    ///
    /// Sources, lowest priority first: `config/default`, `config/<prefix>`,
    /// `config/<prefix>-<RUN_MODE>`, the explicit `path` (required when given)
    /// and finally `<PREFIX>__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be created or deserialized.
    pub fn init_conf<'de, T: Deserialize<'de> + std::fmt::Debug>(&self) -> Result<T, ConfigError> {
        let env_conf = config::Environment::default()
            .prefix(self.env_prefix)
            .separator("__")
            .list_separator(",");
        let mut config_builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!("config/{}", self.env_prefix.to_lowercase()))
                    .required(false),
            )
            .add_source(
                File::with_name(&format!(
                    "config/{}-{}",
                    self.env_prefix.to_lowercase(),
                    *ENVIRONMENT
                ))
                .required(false),
            );

        if let Some(path) = self.path {
            config_builder = config_builder.add_source(File::with_name(path).required(true))
        };

        let config = config_builder.add_source(env_conf).build()?;

        let settings: T = config.try_deserialize()?;

        tracing::debug!("settings loaded: {:?}", settings);

        Ok(settings)
    }
}
