use crate::classify::Thresholds;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

// The registrar's own whois endpoint, not a generic resolver
const DEFAULT_SERVER: &str = "whois.gandi.net";
const DEFAULT_PORT: u16 = 43;
const DEFAULT_REGISTRAR: &str = "GANDI SAS";
const DEFAULT_BASE_DELAY_SECONDS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_RESPONSE_SIZE: usize = 1024 * 1024;
const DEFAULT_BUFFER_SIZE: usize = 8192;
const DEFAULT_RATE_LIMIT_MARKER: &str = "excessive access";
const MAX_RETRIES_CEILING: u32 = 10;
// One day between queries is already far beyond any registrar's rate limit
const MAX_BASE_DELAY_SECONDS: u64 = 86_400;
const MAX_BACKOFF_MULTIPLIER: u32 = 100;

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "DOMAIN_EXPIRY_CONFIG";

/// When the batch driver inserts the inter-query delay.
///
/// Whatever the placement, the rate limiter still guarantees the minimum
/// gap between two transport calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayPlacement {
    #[default]
    Before,
    After,
    Both,
}

impl DelayPlacement {
    pub fn before(self) -> bool {
        matches!(self, DelayPlacement::Before | DelayPlacement::Both)
    }

    pub fn after(self) -> bool {
        matches!(self, DelayPlacement::After | DelayPlacement::Both)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub port: u16,
    pub supported_registrar: String,
    pub base_delay_seconds: u64,
    pub max_retries: u32,
    pub backoff_multiplier: u32,
    pub whois_timeout_seconds: u64,
    pub max_response_size: usize,
    pub buffer_size: usize,
    pub rate_limit_marker: String,
    pub thresholds: Thresholds,
    pub delay_placement: DelayPlacement,
    pub domains_file: PathBuf,
    pub template_file: Option<PathBuf>,
    pub output_file: PathBuf,
    pub json_output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub server: String,
    pub port: u16,
    pub supported_registrar: String,
    pub base_delay_seconds: u64,
    pub max_retries: u32,
    pub backoff_multiplier: u32,
    pub whois_timeout_seconds: u64,
    pub max_response_size: usize,
    pub buffer_size: usize,
    pub rate_limit_marker: String,
    pub thresholds: ThresholdData,
    pub delay_placement: DelayPlacement,
    pub domains_file: PathBuf,
    #[serde(default)]
    pub template_file: Option<PathBuf>,
    pub output_file: PathBuf,
    #[serde(default)]
    pub json_output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ThresholdData {
    pub urgent_days: i64,
    pub soon_days: i64,
    // 0 disables the `recent` bucket
    pub recent_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            supported_registrar: DEFAULT_REGISTRAR.to_string(),
            base_delay_seconds: DEFAULT_BASE_DELAY_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            whois_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            rate_limit_marker: DEFAULT_RATE_LIMIT_MARKER.to_string(),
            thresholds,
            delay_placement: DelayPlacement::default(),
            domains_file: PathBuf::from("domains.txt"),
            template_file: None,
            output_file: PathBuf::from("public/index.html"),
            json_output_file: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file named by
    /// `DOMAIN_EXPIRY_CONFIG`, and environment overrides (in that order).
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut settings = Self::defaults()?;

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            settings = settings.add_source(config::File::with_name(&path));
        }

        settings = Self::apply_env_overrides(settings)?;

        let config = Self::from_data(settings.build()?.try_deserialize()?);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults plus the given file, ignoring the environment.
    pub fn from_file(path: &std::path::Path) -> Result<Self, config::ConfigError> {
        let settings = Self::defaults()?.add_source(config::File::from(path));
        let config = Self::from_data(settings.build()?.try_deserialize()?);
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let thresholds = Thresholds::default();

        config::Config::builder()
            .set_default("server", DEFAULT_SERVER)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("supported_registrar", DEFAULT_REGISTRAR)?
            .set_default("base_delay_seconds", DEFAULT_BASE_DELAY_SECONDS)?
            .set_default("max_retries", i64::from(DEFAULT_MAX_RETRIES))?
            .set_default("backoff_multiplier", i64::from(DEFAULT_BACKOFF_MULTIPLIER))?
            .set_default("whois_timeout_seconds", DEFAULT_TIMEOUT_SECONDS)?
            .set_default("max_response_size", DEFAULT_MAX_RESPONSE_SIZE as u64)?
            .set_default("buffer_size", DEFAULT_BUFFER_SIZE as u64)?
            .set_default("rate_limit_marker", DEFAULT_RATE_LIMIT_MARKER)?
            .set_default("thresholds.urgent_days", thresholds.urgent_days)?
            .set_default("thresholds.soon_days", thresholds.soon_days)?
            .set_default("thresholds.recent_days", thresholds.recent_days.unwrap_or(0))?
            .set_default("delay_placement", "before")?
            .set_default("domains_file", "domains.txt")?
            .set_default("output_file", "public/index.html")
    }

    fn from_data(data: ConfigData) -> Self {
        Config {
            server: data.server,
            port: data.port,
            supported_registrar: data.supported_registrar,
            base_delay_seconds: data.base_delay_seconds,
            max_retries: data.max_retries,
            backoff_multiplier: data.backoff_multiplier,
            whois_timeout_seconds: data.whois_timeout_seconds,
            max_response_size: data.max_response_size,
            buffer_size: data.buffer_size,
            rate_limit_marker: data.rate_limit_marker,
            thresholds: Thresholds {
                urgent_days: data.thresholds.urgent_days,
                soon_days: data.thresholds.soon_days,
                recent_days: (data.thresholds.recent_days > 0).then_some(data.thresholds.recent_days),
            },
            delay_placement: data.delay_placement,
            domains_file: data.domains_file,
            template_file: data.template_file,
            output_file: data.output_file,
            json_output_file: data.json_output_file,
        }
    }

    fn apply_env_overrides(mut settings: config::ConfigBuilder<config::builder::DefaultState>) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("WHOIS_SERVER", "server"),
            ("WHOIS_PORT", "port"),
            ("SUPPORTED_REGISTRAR", "supported_registrar"),
            ("BASE_DELAY_SECONDS", "base_delay_seconds"),
            ("QUERY_DELAY", "base_delay_seconds"),
            ("MAX_RETRIES", "max_retries"),
            ("BACKOFF_MULTIPLIER", "backoff_multiplier"),
            ("WHOIS_TIMEOUT_SECONDS", "whois_timeout_seconds"),
            ("WHOIS_TIMEOUT", "whois_timeout_seconds"),
            ("MAX_RESPONSE_SIZE", "max_response_size"),
            ("BUFFER_SIZE", "buffer_size"),
            ("RATE_LIMIT_MARKER", "rate_limit_marker"),
            ("URGENT_DAYS", "thresholds.urgent_days"),
            ("SOON_DAYS", "thresholds.soon_days"),
            ("RECENT_DAYS", "thresholds.recent_days"),
            ("DELAY_PLACEMENT", "delay_placement"),
            ("DOMAINS_FILE", "domains_file"),
            ("TEMPLATE_FILE", "template_file"),
            ("OUTPUT_FILE", "output_file"),
            ("JSON_OUTPUT_FILE", "json_output_file"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.trim().is_empty() {
            return Err(config::ConfigError::Message("server must not be empty".to_string()));
        }
        if self.supported_registrar.trim().is_empty() {
            return Err(config::ConfigError::Message("supported_registrar must not be empty".to_string()));
        }
        if self.max_retries > MAX_RETRIES_CEILING {
            return Err(config::ConfigError::Message(format!(
                "max_retries must be at most {}",
                MAX_RETRIES_CEILING
            )));
        }
        if self.base_delay_seconds > MAX_BASE_DELAY_SECONDS {
            return Err(config::ConfigError::Message(format!(
                "base_delay_seconds must be at most {}",
                MAX_BASE_DELAY_SECONDS
            )));
        }
        if !(1..=MAX_BACKOFF_MULTIPLIER).contains(&self.backoff_multiplier) {
            return Err(config::ConfigError::Message(format!(
                "backoff_multiplier must be between 1 and {}",
                MAX_BACKOFF_MULTIPLIER
            )));
        }
        if self.thresholds.soon_days < self.thresholds.urgent_days {
            return Err(config::ConfigError::Message(
                "thresholds.soon_days must not be below thresholds.urgent_days".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum gap between two consecutive whois queries.
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_seconds)
    }

    /// Wait inserted before a retry, a fixed multiple of the base delay.
    pub fn backoff(&self) -> Duration {
        self.base_delay()
            .checked_mul(self.backoff_multiplier)
            .unwrap_or(Duration::MAX)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_seconds)
    }
}
