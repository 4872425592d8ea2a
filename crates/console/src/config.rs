//! Console configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file: `--config PATH`, else `fingerprint-portal.toml` in the
//!    working directory if present
//! 3. Environment variables prefixed `FINGERPRINT_PORTAL__`, with `__`
//!    separating nested keys (`FINGERPRINT_PORTAL__RETRY__MAX_ATTEMPTS=5`)
//! 4. Command-line flags

use std::{path::PathBuf, time::Duration};

use bon::Builder;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fingerprint_portal_sdk::{validate_url, ClientConfig, RetryPolicy};
use fingerprint_portal_types::{parse_fingerprint_id, FingerprintId, ValidationConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};

use crate::error::{ClientSnafu, InvalidConfigSnafu, LoadConfigSnafu, RenderSnafu, Result};

/// Environment variable prefix, without the trailing separator.
pub const ENV_PREFIX: &str = "FINGERPRINT_PORTAL";

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "fingerprint-portal";

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Settings sections
// =============================================================================

/// Log output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
    /// JSON when stderr is not a terminal, text otherwise.
    #[default]
    Auto,
}

/// What the registration flow checks before submitting an enrollment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnrollGuard {
    /// Submit directly and let the backend decide.
    #[default]
    Trust,
    /// Re-read the alias set and refuse ids already in use without
    /// submitting. The refusal reads `duplicate id`.
    Verify,
}

fn default_max_conflict_retries() -> u32 {
    3
}

/// Enrollment behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Builder)]
pub struct RegistrationSettings {
    /// Pre-submit check. Default: `trust`.
    #[serde(default)]
    #[builder(default)]
    pub guard: EnrollGuard,
    /// How often `enroll --auto` re-proposes after a conflict. Default: 3.
    #[serde(default = "default_max_conflict_retries")]
    #[builder(default = default_max_conflict_retries())]
    pub max_conflict_retries: u32,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self { guard: EnrollGuard::default(), max_conflict_retries: default_max_conflict_retries() }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(100)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_jitter() -> bool {
    true
}

/// Retry of idempotent reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetrySettings {
    /// Total attempts including the first. Must be at least 1. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 100ms.
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub initial_backoff: Duration,
    /// Upper bound of the delay. Default: 2s.
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub max_backoff: Duration,
    /// Randomize delays. Default: true.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            jitter: default_jitter(),
        }
    }
}

impl RetrySettings {
    fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .initial_backoff(self.initial_backoff)
            .max_backoff(self.max_backoff)
            .jitter(self.jitter)
            .build()
    }
}

// =============================================================================
// ConsoleConfig
// =============================================================================

fn default_endpoint() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Complete console configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsoleConfig {
    /// Base URL of the fingerprint service. Default: `http://localhost:8000`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout. Default: 10s.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,
    /// TCP connect timeout. Default: 5s.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub connect_timeout: Duration,
    /// Directory identification images are written to. Unset: not saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<PathBuf>,
    /// Log output format. Default: `auto`.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Retry of idempotent reads.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Enrollment behaviour.
    #[serde(default)]
    pub registration: RegistrationSettings,
    /// Input limits.
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            image_dir: None,
            log_format: LogFormat::default(),
            retry: RetrySettings::default(),
            registration: RegistrationSettings::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Loads the file and environment layers.
    ///
    /// With `path` the file must exist; without it `fingerprint-portal.toml`
    /// is read if present.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConsoleError::LoadConfig`] if a source cannot
    /// be read or does not deserialize.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true),
        );

        builder.build().context(LoadConfigSnafu)?.try_deserialize().context(LoadConfigSnafu)
    }

    /// Checks values the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConsoleError::InvalidConfig`] naming the first
    /// offending value.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.endpoint)
            .map_err(|e| InvalidConfigSnafu { message: e.to_string() }.build())?;
        ensure!(
            !self.timeout.is_zero(),
            InvalidConfigSnafu { message: "timeout must be greater than zero" }
        );
        ensure!(
            !self.connect_timeout.is_zero(),
            InvalidConfigSnafu { message: "connect_timeout must be greater than zero" }
        );
        ensure!(
            self.retry.max_attempts >= 1,
            InvalidConfigSnafu { message: "retry.max_attempts must be at least 1" }
        );
        ensure!(
            self.retry.initial_backoff <= self.retry.max_backoff,
            InvalidConfigSnafu {
                message: "retry.initial_backoff must not exceed retry.max_backoff"
            }
        );
        self.validation
            .validate()
            .map_err(|e| InvalidConfigSnafu { message: e.to_string() }.build())?;
        Ok(())
    }

    /// Builds the backend client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ConsoleError::Client`] if the SDK rejects a
    /// value.
    pub fn client_config(&self) -> Result<ClientConfig> {
        ClientConfig::builder()
            .with_endpoint(self.endpoint.clone())
            .with_timeout(self.timeout)
            .with_connect_timeout(self.connect_timeout)
            .with_retry_policy(self.retry.to_policy())
            .build()
            .context(ClientSnafu)
    }

    /// Settings handed to every flow.
    #[must_use]
    pub fn flow_settings(&self) -> crate::flows::FlowSettings {
        crate::flows::FlowSettings::builder()
            .validation(self.validation.clone())
            .registration(self.registration.clone())
            .maybe_image_dir(self.image_dir.clone())
            .build()
    }
}

/// Renders the JSON schema of [`ConsoleConfig`].
///
/// # Errors
///
/// Returns [`crate::error::ConsoleError::Render`] if serialization fails.
pub fn generate_config_schema() -> Result<String> {
    let schema = schemars::schema_for!(ConsoleConfig);
    serde_json::to_string_pretty(&schema)
        .map(|json| json + "\n")
        .map_err(|e| RenderSnafu { what: "schema", message: e.to_string() }.build())
}

/// Renders the default configuration as TOML.
///
/// # Errors
///
/// Returns [`crate::error::ConsoleError::Render`] if serialization fails.
pub fn generate_config_example() -> Result<String> {
    let body = toml::to_string_pretty(&ConsoleConfig::default())
        .map_err(|e| RenderSnafu { what: "example", message: e.to_string() }.build())?;
    Ok(format!(
        "# fingerprint-portal configuration\n\
         # Every key is optional. Environment overrides use {ENV_PREFIX}__<KEY>.\n\
         # image_dir = \"./captures\"\n\n{body}"
    ))
}

// =============================================================================
// Command line
// =============================================================================

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "fingerprint-portal", version, about = "Fingerprint identity workflow client")]
pub struct Cli {
    /// Flags that override configuration.
    #[command(flatten)]
    pub overrides: Overrides,

    /// What to do.
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Flags layered over the file and environment configuration.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Configuration file (TOML).
    #[arg(long, short = 'c', global = true, env = "FINGERPRINT_PORTAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the fingerprint service.
    #[arg(long, global = true, env = "FINGERPRINT_PORTAL_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Per-request timeout, e.g. `10s` or `500ms`.
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Enroll an alias under a new identity number.
    Enroll {
        /// Alias to enroll.
        #[arg(long)]
        alias: String,
        /// Identity number; proposed from the directory when omitted.
        #[arg(long, value_parser = parse_id_arg)]
        id: Option<FingerprintId>,
        /// Re-propose and retry when the proposed id is taken concurrently.
        #[arg(long, conflicts_with = "id")]
        auto: bool,
    },
    /// Show the next unused identity number.
    Propose,
    /// Identify the fingerprint currently on the sensor.
    Identify {
        /// Save the scanned and matched images here.
        #[arg(long)]
        image_dir: Option<PathBuf>,
    },
    /// Show the match history of an alias.
    Matches {
        /// Alias (exact, case-sensitive).
        alias: String,
    },
    /// List every enrolled alias.
    Aliases,
    /// Revoke an enrolled identity.
    Delete {
        /// Identity number.
        id: String,
    },
    /// Line-oriented session with one active view at a time.
    Interactive,
    /// Inspect the configuration format.
    Config {
        /// Output to produce.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommands.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print the JSON schema of the configuration file.
    Schema,
    /// Print an example configuration file.
    Example,
}

fn parse_id_arg(text: &str) -> std::result::Result<FingerprintId, String> {
    parse_fingerprint_id(text).map_err(|e| e.to_string())
}

impl Overrides {
    /// Loads file and environment layers, applies these flags, validates.
    ///
    /// # Errors
    ///
    /// Returns a load or validation error.
    pub fn resolve(&self) -> Result<ConsoleConfig> {
        let mut config = ConsoleConfig::load(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Applies the flags that were given.
    pub fn apply(&self, config: &mut ConsoleConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
    }
}
