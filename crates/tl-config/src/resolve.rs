//! Configuration resolution.
//!
//! Precedence, highest first:
//!
//! 1. CLI flags ([`ConfigOverrides`])
//! 2. Environment (`TXLAT_TIMESLICE`, `TXLAT_DURATION`, `TXLAT_NEGATIVE_DELTA`)
//! 3. Config file (`--config`, `TXLAT_CONFIG`, or `$XDG_CONFIG_HOME/txlat/config.json`)
//! 4. Built-in defaults

use std::path::PathBuf;
use tracing::debug;

use crate::trace::{NegativeDeltaPolicy, TraceConfig};
use crate::validate::{ValidationError, ValidationResult};

/// Environment variable naming a config file.
pub const ENV_CONFIG: &str = "TXLAT_CONFIG";
/// Environment variable overriding the timeslice in seconds.
pub const ENV_TIMESLICE: &str = "TXLAT_TIMESLICE";
/// Environment variable overriding the duration in seconds.
pub const ENV_DURATION: &str = "TXLAT_DURATION";
/// Environment variable overriding the negative delta policy.
pub const ENV_NEGATIVE_DELTA: &str = "TXLAT_NEGATIVE_DELTA";

const CONFIG_DIR_NAME: &str = "txlat";
const CONFIG_FILE_NAME: &str = "config.json";

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub timeslice_secs: Option<u64>,
    pub duration_secs: Option<u64>,
    pub negative_delta: Option<NegativeDeltaPolicy>,
}

/// Where the base configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    File(PathBuf),
}

/// A validated configuration and its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: TraceConfig,
    pub source: ConfigSource,
}

/// Resolve using the process environment.
pub fn resolve_config(overrides: &ConfigOverrides) -> ValidationResult<ResolvedConfig> {
    resolve_config_with_env(overrides, |key| std::env::var(key).ok())
}

/// Resolve with an explicit environment lookup.
pub fn resolve_config_with_env<F>(
    overrides: &ConfigOverrides,
    env: F,
) -> ValidationResult<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file = overrides
        .config_file
        .clone()
        .or_else(|| env(ENV_CONFIG).map(PathBuf::from))
        .or_else(default_config_file);

    let (mut config, source) = match file {
        Some(path) => {
            debug!(path = %path.display(), "loading trace config");
            (TraceConfig::from_file(&path)?, ConfigSource::File(path))
        }
        None => (TraceConfig::default(), ConfigSource::Defaults),
    };

    if let Some(value) = env(ENV_TIMESLICE) {
        config.timeslice_secs = parse_secs(ENV_TIMESLICE, &value)?;
    }
    if let Some(value) = env(ENV_DURATION) {
        config.duration_secs = Some(parse_secs(ENV_DURATION, &value)?);
    }
    if let Some(value) = env(ENV_NEGATIVE_DELTA) {
        config.negative_delta = value.parse()?;
    }

    if let Some(secs) = overrides.timeslice_secs {
        config.timeslice_secs = secs;
    }
    if let Some(secs) = overrides.duration_secs {
        config.duration_secs = Some(secs);
    }
    if let Some(policy) = overrides.negative_delta {
        config.negative_delta = policy;
    }

    config.validate()?;
    Ok(ResolvedConfig { config, source })
}

fn parse_secs(field: &str, value: &str) -> ValidationResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{value}' is not a whole number of seconds"),
        })
}

/// `$XDG_CONFIG_HOME/txlat/config.json`, if it exists.
fn default_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn file_then_env_then_cli() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"timeslice_secs": 30, "duration_secs": 300}"#);

        let overrides = ConfigOverrides {
            config_file: Some(path.clone()),
            ..Default::default()
        };
        let resolved = resolve_config_with_env(&overrides, env_from(&[])).unwrap();
        assert_eq!(resolved.config.timeslice_secs, 30);
        assert_eq!(resolved.config.duration_secs, Some(300));
        assert_eq!(resolved.source, ConfigSource::File(path.clone()));

        let env = env_from(&[(ENV_TIMESLICE, "20"), (ENV_NEGATIVE_DELTA, "rebaseline")]);
        let resolved = resolve_config_with_env(&overrides, env).unwrap();
        assert_eq!(resolved.config.timeslice_secs, 20);
        assert_eq!(
            resolved.config.negative_delta,
            NegativeDeltaPolicy::Rebaseline
        );

        let overrides = ConfigOverrides {
            config_file: Some(path),
            timeslice_secs: Some(5),
            negative_delta: Some(NegativeDeltaPolicy::Skip),
            ..Default::default()
        };
        let env = env_from(&[(ENV_TIMESLICE, "20"), (ENV_NEGATIVE_DELTA, "rebaseline")]);
        let resolved = resolve_config_with_env(&overrides, env).unwrap();
        assert_eq!(resolved.config.timeslice_secs, 5);
        assert_eq!(resolved.config.negative_delta, NegativeDeltaPolicy::Skip);
    }

    #[test]
    fn env_config_path_is_used() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"cache_capacity": 4}"#);
        let env = env_from(&[(ENV_CONFIG, path.to_str().unwrap())]);
        let resolved = resolve_config_with_env(&ConfigOverrides::default(), env).unwrap();
        assert_eq!(resolved.config.cache_capacity, 4);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            config_file: Some(write_config(&dir, "{}")),
            ..Default::default()
        };
        let env = env_from(&[(ENV_DURATION, "forever")]);
        let err = resolve_config_with_env(&overrides, env).unwrap_err();
        assert!(err.to_string().contains(ENV_DURATION));
    }

    #[test]
    fn missing_file_is_io_error() {
        let overrides = ConfigOverrides {
            config_file: Some(PathBuf::from("/nonexistent/txlat/config.json")),
            ..Default::default()
        };
        let err = resolve_config_with_env(&overrides, env_from(&[])).unwrap_err();
        assert!(matches!(err, ValidationError::IoError(_)));
    }

    #[test]
    fn invalid_override_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{}");
        let overrides = ConfigOverrides {
            config_file: Some(path),
            timeslice_secs: Some(0),
            ..Default::default()
        };
        assert!(resolve_config_with_env(&overrides, env_from(&[])).is_err());
    }
}
