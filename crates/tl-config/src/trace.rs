//! Trace configuration types.
//!
//! Every field has a default, so an empty JSON object is a valid config
//! file and describes the built-in probe set.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tl_common::ProbeId;

use crate::validate::{ValidationError, ValidationResult};
use crate::CONFIG_SCHEMA_VERSION;

/// Default sampling timeslice: 10 minutes.
pub const DEFAULT_TIMESLICE_SECS: u64 = 600;

/// Largest result-code range a histogram may cover (bins per probe).
pub const MAX_RESULT_BINS: usize = 4096;

/// Default reconstruction cache capacity (collections).
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Complete trace configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TraceConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Seconds between two samples of the cumulative counters.
    #[serde(default = "default_timeslice_secs")]
    pub timeslice_secs: u64,

    /// Total trace duration in seconds; unbounded when absent.
    #[serde(default)]
    pub duration_secs: Option<u64>,

    /// What to do when a cumulative counter decreases between samples.
    #[serde(default)]
    pub negative_delta: NegativeDeltaPolicy,

    /// Result-code range covered by the reconstructed result histograms.
    #[serde(default)]
    pub result_range: ResultRange,

    /// Maximum number of reconstructed collections kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Probes seeded into a fresh store and sampled during a trace.
    #[serde(default = "default_probes")]
    pub probes: Vec<ProbeSpec>,
}

/// One instrumentation point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProbeSpec {
    pub id: ProbeId,

    pub description: String,

    /// Symbol whose entry starts the timer. Either an exact mangled name or
    /// a regex matched against whole symbol names.
    #[serde(default)]
    pub entry_symbol: Option<String>,

    /// Symbol (or whole-name regex) whose return stops the timer; the entry
    /// symbol when absent.
    #[serde(default)]
    pub exit_symbol: Option<String>,

    /// Whether the latency histogram of this probe is sampled.
    #[serde(default = "default_true")]
    pub sample_latency: bool,

    /// Whether the result-code counters of this probe are sampled.
    #[serde(default)]
    pub sample_results: bool,
}

impl ProbeSpec {
    /// The symbol whose return ends a measured span.
    pub fn exit_symbol(&self) -> Option<&str> {
        self.exit_symbol
            .as_deref()
            .or(self.entry_symbol.as_deref())
    }

    /// Whether any counters of this probe are sampled by the trace loop.
    pub fn is_sampled(&self) -> bool {
        self.sample_latency || self.sample_results
    }
}

/// Policy applied when a cumulative counter is observed to decrease.
///
/// Either way the regression is recorded as an anomaly and logged; the
/// policy only decides what is written for the affected interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NegativeDeltaPolicy {
    /// Write nothing for the affected family this interval and adopt the
    /// new snapshot as baseline.
    #[default]
    Skip,
    /// Assume the counters were reset: the new snapshot is the interval's
    /// activity and becomes the baseline.
    Rebaseline,
}

impl NegativeDeltaPolicy {
    pub fn name(self) -> &'static str {
        match self {
            NegativeDeltaPolicy::Skip => "skip",
            NegativeDeltaPolicy::Rebaseline => "rebaseline",
        }
    }
}

impl std::str::FromStr for NegativeDeltaPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(NegativeDeltaPolicy::Skip),
            "rebaseline" => Ok(NegativeDeltaPolicy::Rebaseline),
            other => Err(ValidationError::InvalidValue {
                field: "negative_delta".to_string(),
                reason: format!("unknown policy '{other}' (expected skip or rebaseline)"),
            }),
        }
    }
}

impl std::fmt::Display for NegativeDeltaPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive result-code range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResultRange {
    pub min: i64,
    pub max: i64,
}

impl ResultRange {
    /// Number of codes in the range, or `None` for an inverted range or
    /// one whose width does not fit in a `usize`.
    pub fn width(&self) -> Option<usize> {
        let span = self.max.checked_sub(self.min)?.checked_add(1)?;
        usize::try_from(span).ok().filter(|&n| n > 0)
    }

    /// Number of histogram bins covered by the range; 0 when `width` is `None`.
    pub fn bins(&self) -> usize {
        self.width().unwrap_or(0)
    }

    /// Bin index of a result code, if the code is inside the range.
    pub fn bin(&self, code: i64) -> Option<usize> {
        if code < self.min || code > self.max {
            return None;
        }
        usize::try_from(code.checked_sub(self.min)?).ok()
    }

    /// Result code represented by a bin index.
    pub fn code(&self, bin: usize) -> i64 {
        self.min + bin as i64
    }
}

impl Default for ResultRange {
    fn default() -> Self {
        Self { min: -99, max: 150 }
    }
}

fn default_schema_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

fn default_timeslice_secs() -> u64 {
    DEFAULT_TIMESLICE_SECS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_true() -> bool {
    true
}

/// Built-in probe set.
///
/// The transactor probe is seeded so exact-trace rows can refer to it, but
/// its histogram is not sampled: its entry point is shared with the
/// exact-trace path and two entry timers on one symbol would clobber each
/// other.
pub fn default_probes() -> Vec<ProbeSpec> {
    vec![
        ProbeSpec {
            id: ProbeId(0),
            description: "transactor".to_string(),
            entry_symbol: Some("_ZN6ripple10TransactorclEv".to_string()),
            exit_symbol: None,
            sample_latency: false,
            sample_results: false,
        },
        ProbeSpec {
            id: ProbeId(1),
            description: "payment".to_string(),
            entry_symbol: Some(
                "_ZN6ripple7Payment9preflightERKNS_16PreflightContextE".to_string(),
            ),
            exit_symbol: Some("_ZN6ripple7Payment7doApplyEv".to_string()),
            sample_latency: true,
            sample_results: true,
        },
        ProbeSpec {
            id: ProbeId(2),
            description: "offer_create".to_string(),
            entry_symbol: Some(
                "_ZN6ripple11CreateOffer9preflightERKNS_16PreflightContextE".to_string(),
            ),
            exit_symbol: Some("_ZN6ripple11CreateOffer7doApplyEv".to_string()),
            sample_latency: true,
            sample_results: true,
        },
    ]
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            timeslice_secs: DEFAULT_TIMESLICE_SECS,
            duration_secs: None,
            negative_delta: NegativeDeltaPolicy::default(),
            result_range: ResultRange::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            probes: default_probes(),
        }
    }
}

impl TraceConfig {
    /// Load a trace configuration from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_json(&content)
    }

    /// Parse a trace configuration from a JSON string.
    pub fn parse_json(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Look up a probe by id.
    pub fn probe(&self, id: ProbeId) -> Option<&ProbeSpec> {
        self.probes.iter().find(|p| p.id == id)
    }

    /// Probes the trace loop samples, in configuration order.
    pub fn sampled_probes(&self) -> impl Iterator<Item = &ProbeSpec> {
        self.probes.iter().filter(|p| p.is_sampled())
    }

    /// JSON Schema for the configuration file.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(TraceConfig))
            .unwrap_or(serde_json::Value::Null)
    }
}
