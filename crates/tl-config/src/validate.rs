//! Semantic validation for trace configuration.

use std::collections::HashSet;
use thiserror::Error;

use crate::trace::{TraceConfig, MAX_RESULT_BINS};

/// Errors from loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type alias for configuration operations.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

impl From<ValidationError> for tl_common::Error {
    fn from(err: ValidationError) -> Self {
        tl_common::Error::Config(err.to_string())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl TraceConfig {
    /// Check semantic constraints the type system cannot express.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.timeslice_secs == 0 {
            return Err(invalid("timeslice_secs", "must be at least 1 second"));
        }

        if self.duration_secs == Some(0) {
            return Err(invalid(
                "duration_secs",
                "must be positive; omit it for an unbounded trace",
            ));
        }

        if self.cache_capacity == 0 {
            return Err(invalid("cache_capacity", "must hold at least one collection"));
        }

        if self.result_range.min > self.result_range.max {
            return Err(invalid(
                "result_range",
                format!(
                    "min {} is greater than max {}",
                    self.result_range.min, self.result_range.max
                ),
            ));
        }
        match self.result_range.width() {
            Some(bins) if bins <= MAX_RESULT_BINS => {}
            _ => {
                return Err(invalid(
                    "result_range",
                    format!(
                        "[{}, {}] spans more than {MAX_RESULT_BINS} codes",
                        self.result_range.min, self.result_range.max
                    ),
                ))
            }
        }

        if self.probes.is_empty() {
            return Err(invalid("probes", "at least one probe is required"));
        }

        let mut seen = HashSet::new();
        for probe in &self.probes {
            if !seen.insert(probe.id) {
                return Err(invalid("probes", format!("duplicate probe id {}", probe.id)));
            }
            if probe.description.trim().is_empty() {
                return Err(invalid(
                    "probes",
                    format!("probe {} has an empty description", probe.id),
                ));
            }
            if probe.is_sampled() && probe.entry_symbol.is_none() {
                return Err(invalid(
                    "probes",
                    format!("sampled probe {} has no entry symbol", probe.id),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{ProbeSpec, ResultRange};
    use tl_common::ProbeId;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(TraceConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_timeslice_rejected() {
        let config = TraceConfig {
            timeslice_secs: 0,
            ..TraceConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeslice_secs"));
    }

    #[test]
    fn zero_duration_rejected() {
        let config = TraceConfig {
            duration_secs: Some(0),
            ..TraceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_result_range_rejected() {
        let config = TraceConfig {
            result_range: ResultRange { min: 10, max: -10 },
            ..TraceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_result_range_rejected() {
        let widest_allowed = TraceConfig {
            result_range: ResultRange {
                min: 0,
                max: MAX_RESULT_BINS as i64 - 1,
            },
            ..TraceConfig::default()
        };
        assert_eq!(widest_allowed.validate(), Ok(()));

        for (min, max) in [
            (0, MAX_RESULT_BINS as i64),
            (-1_000_000_000, 1_000_000_000),
            (i64::MIN, i64::MAX),
        ] {
            let config = TraceConfig {
                result_range: ResultRange { min, max },
                ..TraceConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("result_range"), "{err}");
        }
    }

    #[test]
    fn extreme_range_from_json_is_rejected() {
        let json = format!(
            r#"{{"result_range": {{"min": {}, "max": {}}}}}"#,
            i64::MIN,
            i64::MAX
        );
        let config = TraceConfig::parse_json(&json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_probe_ids_rejected() {
        let mut config = TraceConfig::default();
        let mut dup = config.probes[1].clone();
        dup.description = "dup".to_string();
        config.probes.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate probe id 1"));
    }

    #[test]
    fn sampled_probe_needs_entry_symbol() {
        let config = TraceConfig {
            probes: vec![ProbeSpec {
                id: ProbeId(4),
                description: "nameless".to_string(),
                entry_symbol: None,
                exit_symbol: None,
                sample_latency: true,
                sample_results: false,
            }],
            ..TraceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
