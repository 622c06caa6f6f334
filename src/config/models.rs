// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, TryFromFloatSecsError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: InstanceDefaults,
    pub instances: Vec<InstanceConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Connection settings applied to every instance unless it overrides them.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceDefaults {
    /// `None` = don't retry, `Some(0)` = retry forever, `Some(n)` = n retries.
    #[serde(default = "default_retry")]
    pub retry: Option<u32>,
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

impl Default for InstanceDefaults {
    fn default() -> Self {
        Self {
            retry: default_retry(),
            retry_interval_secs: default_retry_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Path of a UNIX stats socket.
    pub socket: Option<PathBuf>,
    /// `host:port` of a stats socket bound to TCP.
    pub address: Option<String>,
    /// Overrides `defaults.retry`. Use the `no_retry` flag to force "don't retry".
    pub retry: Option<u32>,
    #[serde(default)]
    pub no_retry: bool,
    pub retry_interval_secs: Option<f64>,
    pub timeout_secs: Option<f64>,
}

impl InstanceConfig {
    pub fn retry(&self, defaults: &InstanceDefaults) -> Option<u32> {
        if self.no_retry {
            None
        } else {
            self.retry.or(defaults.retry)
        }
    }

    /// Fails on negative, non-finite or out-of-range seconds.
    pub fn retry_interval(
        &self,
        defaults: &InstanceDefaults,
    ) -> std::result::Result<Duration, TryFromFloatSecsError> {
        let secs = self
            .retry_interval_secs
            .unwrap_or(defaults.retry_interval_secs);
        Duration::try_from_secs_f64(secs)
    }

    pub fn timeout(
        &self,
        defaults: &InstanceDefaults,
    ) -> std::result::Result<Duration, TryFromFloatSecsError> {
        Duration::try_from_secs_f64(self.timeout_secs.unwrap_or(defaults.timeout_secs))
    }

    pub fn endpoint_label(&self) -> String {
        match (&self.socket, &self.address) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(addr)) => addr.clone(),
            (None, None) => "<unset>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            bail!("at least one instance must be configured");
        }
        check_secs("defaults.timeout_secs", self.defaults.timeout_secs, false)?;
        check_secs("defaults.retry_interval_secs", self.defaults.retry_interval_secs, true)?;

        for (idx, instance) in self.instances.iter().enumerate() {
            match (&instance.socket, &instance.address) {
                (Some(_), Some(_)) => {
                    bail!("instance {} sets both socket and address", idx)
                }
                (None, None) => bail!("instance {} needs a socket or an address", idx),
                _ => {}
            }
            let label = format!("instance {} ({})", idx, instance.endpoint_label());
            if let Some(timeout) = instance.timeout_secs {
                check_secs(&format!("{} timeout_secs", label), timeout, false)?;
            }
            if let Some(interval) = instance.retry_interval_secs {
                check_secs(&format!("{} retry_interval_secs", label), interval, true)?;
            }
        }
        Ok(())
    }
}

/// Seconds must convert to a `Duration`; zero only where `allow_zero`.
fn check_secs(what: &str, value: f64, allow_zero: bool) -> Result<()> {
    if !value.is_finite() {
        bail!("{} must be finite, got {}", what, value);
    }
    if value < 0.0 || (value == 0.0 && !allow_zero) {
        let bound = if allow_zero { "must not be negative" } else { "must be positive" };
        bail!("{} {}, got {}", what, bound, value);
    }
    if Duration::try_from_secs_f64(value).is_err() {
        bail!("{} is out of range, got {}", what, value);
    }
    Ok(())
}

fn default_retry() -> Option<u32> {
    Some(2)
}

fn default_retry_interval_secs() -> f64 {
    2.0
}

fn default_timeout_secs() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}
