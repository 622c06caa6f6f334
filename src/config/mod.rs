// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `HAPROXY_ADMIN__LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "HAPROXY_ADMIN";

/// Load configuration from a file (YAML or JSON), layered with environment overrides
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let format = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        _ => FileFormat::Json,
    };

    parse_config(&contents, format)
}

pub fn parse_config(contents: &str, format: FileFormat) -> Result<Config> {
    let settings = config::Config::builder()
        .add_source(File::from_str(contents, format))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .context("Failed to parse config")?;

    let config: Config = settings
        .try_deserialize()
        .context("Invalid config structure")?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_yaml_defaults_and_overrides() {
        let yaml = r#"
instances:
  - socket: /run/haproxy/admin1.sock
  - address: 127.0.0.1:9999
    retry: 0
    timeout_secs: 0.5
"#;
        let config = parse_config(yaml, FileFormat::Yaml).unwrap();
        let defaults = &config.defaults;

        assert_eq!(config.instances.len(), 2);
        assert_eq!(config.instances[0].retry(defaults), Some(2));
        assert_eq!(
            config.instances[0].retry_interval(defaults),
            Ok(Duration::from_secs(2))
        );
        assert_eq!(config.instances[1].retry(defaults), Some(0));
        assert_eq!(
            config.instances[1].timeout(defaults),
            Ok(Duration::from_millis(500))
        );
        assert_eq!(config.logging.level, "info");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_no_retry_flag() {
        let json = r#"{"instances": [{"socket": "/tmp/a.sock", "no_retry": true}]}"#;
        let config = parse_config(json, FileFormat::Json).unwrap();
        assert_eq!(config.instances[0].retry(&config.defaults), None);
    }

    #[test]
    fn test_rejects_instance_without_endpoint() {
        let json = r#"{"instances": [{"retry": 3}]}"#;
        assert!(parse_config(json, FileFormat::Json).is_err());
    }

    #[test]
    fn test_rejects_empty_instance_list() {
        let json = r#"{"instances": []}"#;
        assert!(parse_config(json, FileFormat::Json).is_err());
    }

    #[test]
    fn test_rejects_oversized_timeout() {
        let yaml = "instances:\n  - socket: /tmp/x.sock\n    timeout_secs: 1.0e300\n";
        let err = parse_config(yaml, FileFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn test_rejects_non_finite_seconds() {
        let json = r#"{"instances": [{"socket": "/tmp/a.sock"}]}"#;
        let config = parse_config(json, FileFormat::Json).unwrap();

        let mut infinite = config.clone();
        infinite.instances[0].timeout_secs = Some(f64::INFINITY);
        assert!(infinite.validate().is_err());

        let mut nan = config.clone();
        nan.defaults.retry_interval_secs = f64::NAN;
        assert!(nan.validate().is_err());

        let mut negative = config.clone();
        negative.instances[0].retry_interval_secs = Some(-0.5);
        assert!(negative.validate().is_err());

        let mut zero_interval = config;
        zero_interval.instances[0].retry_interval_secs = Some(0.0);
        assert!(zero_interval.validate().is_ok());
    }
}
