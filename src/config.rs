use std::env;
use std::str::FromStr;

use thiserror::Error;
use tokio::time::Duration;

use crate::mix::{MixTable, MixTableError};
use crate::mysql::DbConfig;
use crate::poller::PollerConfig;
use crate::pool::{PoolConfig, ProfileSource};
use crate::profile::{Profile, ProfileRates};
use crate::utils::parse_duration_string;
use crate::worker::WorkerTimings;

/// Errors that can occur while reading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be a valid number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Invalid {var} format: '{value}'. {reason}")]
    InvalidDuration {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than 0")]
    MustBePositive(&'static str),

    #[error("LOAD_STATUS_URL must start with http:// or https://, got '{0}'")]
    InvalidStatusUrl(String),

    #[error("Invalid LOAD_PROFILE: {0}")]
    InvalidProfile(#[from] crate::profile::UnknownProfile),

    #[error("Invalid mix table in '{path}': {source}")]
    MixTable {
        path: String,
        #[source]
        source: MixTableError,
    },
}

/// Main configuration for the load generator.
#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub status_url: String,
    pub worker_count: usize,
    /// When set, the single-loop variant: this profile for the whole run, no polling.
    pub fixed_profile: Option<Profile>,
    pub rates: ProfileRates,
    pub mix: MixTable,
    pub mix_table_file: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub shutdown_grace: Duration,
    pub run_duration: Option<Duration>,
    pub timings: WorkerTimings,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = DbConfig::default();
        let db = DbConfig {
            host: env::var("DB_HOST").unwrap_or(defaults.host),
            port: parse_env("DB_PORT", defaults.port)?,
            user: env::var("DB_USER").unwrap_or(defaults.user),
            password: env::var("DB_PASS").unwrap_or(defaults.password),
            database: env::var("DB_NAME").unwrap_or(defaults.database),
            connect_timeout: duration_env("DB_CONNECT_TIMEOUT", defaults.connect_timeout)?,
        };

        let poller_defaults = PollerConfig::default();
        let status_url = env::var("LOAD_STATUS_URL").unwrap_or(poller_defaults.status_url);
        if !status_url.starts_with("http://") && !status_url.starts_with("https://") {
            return Err(ConfigError::InvalidStatusUrl(status_url));
        }

        let worker_count: usize = parse_env("LOAD_WORKERS", 5)?;
        if worker_count == 0 {
            return Err(ConfigError::MustBePositive("LOAD_WORKERS"));
        }

        let fixed_profile = match env::var("LOAD_PROFILE") {
            Ok(tag) if !tag.trim().is_empty() => Some(Profile::from_str(&tag)?),
            _ => None,
        };

        let default_rates = ProfileRates::default();
        let rates = ProfileRates {
            low: parse_env("LOW_OPS_PER_SEC", default_rates.low)?,
            med: parse_env("MED_OPS_PER_SEC", default_rates.med)?,
            high: parse_env("HIGH_OPS_PER_SEC", default_rates.high)?,
        };

        let mix_table_file = env::var("MIX_TABLE_FILE").ok().filter(|p| !p.is_empty());
        let mix = match &mix_table_file {
            Some(path) => MixTable::from_file(path).map_err(|source| ConfigError::MixTable {
                path: path.clone(),
                source,
            })?,
            None => MixTable::default(),
        };

        let poll_interval = duration_env("PROFILE_POLL_INTERVAL", poller_defaults.interval)?;
        if poll_interval.is_zero() {
            return Err(ConfigError::MustBePositive("PROFILE_POLL_INTERVAL"));
        }
        let poll_timeout = duration_env("PROFILE_FETCH_TIMEOUT", poller_defaults.timeout)?;
        if poll_timeout.is_zero() {
            return Err(ConfigError::MustBePositive("PROFILE_FETCH_TIMEOUT"));
        }
        let shutdown_grace = duration_env("SHUTDOWN_GRACE", Duration::from_secs(2))?;

        let run_duration = match env::var("RUN_DURATION") {
            Ok(value) if !value.trim().is_empty() => Some(
                parse_duration_string(&value).map_err(|reason| ConfigError::InvalidDuration {
                    var: "RUN_DURATION",
                    value,
                    reason,
                })?,
            ),
            _ => None,
        };

        Ok(Config {
            db,
            status_url,
            worker_count,
            fixed_profile,
            rates,
            mix,
            mix_table_file,
            poll_interval,
            poll_timeout,
            shutdown_grace,
            run_duration,
            timings: WorkerTimings::default(),
        })
    }

    /// Where the workers get their profile from.
    pub fn profile_source(&self) -> ProfileSource {
        match self.fixed_profile {
            Some(profile) => ProfileSource::Fixed(profile),
            None => ProfileSource::Poll(PollerConfig {
                status_url: self.status_url.clone(),
                interval: self.poll_interval,
                timeout: self.poll_timeout,
            }),
        }
    }

    /// Creates a PoolConfig from this Config.
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig {
            worker_count: self.worker_count,
            rates: self.rates,
            mix: self.mix.clone(),
            timings: self.timings,
            source: self.profile_source(),
        }
    }

    /// Prints the configuration summary.
    pub fn print_summary(&self) {
        println!("Starting load generator:");
        println!(
            "  Backend: {}@{}:{}/{}",
            self.db.user, self.db.host, self.db.port, self.db.database
        );
        println!("  Backend password: {}", mask(&self.db.password));
        println!("  Workers: {}", self.worker_count);
        match self.fixed_profile {
            Some(profile) => println!("  Profile: {} (fixed, polling disabled)", profile),
            None => println!(
                "  Profile: polled from {} every {:?} (timeout {:?})",
                self.status_url, self.poll_interval, self.poll_timeout
            ),
        }
        println!(
            "  Target ops/sec: low={} med={} high={}",
            self.rates.low, self.rates.med, self.rates.high
        );
        match &self.mix_table_file {
            Some(path) => println!("  Mix table: {}", path),
            None => println!("  Mix table: built-in"),
        }
        match self.run_duration {
            Some(d) => println!("  Run duration: {:?}", d),
            None => println!("  Run duration: until interrupted"),
        }
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "********"
    }
}

fn parse_env<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(default),
    }
}

fn duration_env(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(value) => {
            parse_duration_string(&value).map_err(|reason| ConfigError::InvalidDuration {
                var,
                value,
                reason,
            })
        }
        Err(_) => Ok(default),
    }
}
