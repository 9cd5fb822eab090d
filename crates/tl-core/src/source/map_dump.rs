//! Snapshot source backed by map dumps of an external eBPF loader.
//!
//! The loader owns the uprobes and periodically exports its maps into a
//! directory:
//!
//! ```text
//! <dir>/probe-<id>.json   {"dist": [...], "result": [...], "tecs": [...], "negs": [...]}
//! <dir>/tx_exit.jsonl     one TransactionEvent per line, append-only
//! ```
//!
//! Snapshot files are rewritten whole by the loader; the event log is read
//! incrementally from the byte offset reached by the previous drain. A
//! trailing line without a newline is left for the next drain.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tl_common::ProbeId;
use tl_config::ProbeSpec;
use tracing::{debug, info};

use super::target::{count_symbols, resolve_target, TargetSpec};
use super::{ProbeSnapshot, SnapshotSource, SourceError, TransactionEvent};

/// File name prefix of per-probe snapshot dumps.
pub const SNAPSHOT_FILE_PREFIX: &str = "probe-";
/// File name of the exact-trace event log.
pub const TX_EVENTS_FILE: &str = "tx_exit.jsonl";

/// Reads cumulative counters from a dump directory.
#[derive(Debug)]
pub struct MapDumpSource {
    dir: PathBuf,
    target: TargetSpec,
    resolved: Option<PathBuf>,
    tx_offset: u64,
}

impl MapDumpSource {
    pub fn new(dir: impl Into<PathBuf>, target: TargetSpec) -> Self {
        Self {
            dir: dir.into(),
            target,
            resolved: None,
            tx_offset: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot dump for `probe`.
    pub fn snapshot_path(&self, probe: ProbeId) -> PathBuf {
        self.dir.join(format!("{SNAPSHOT_FILE_PREFIX}{}.json", probe.0))
    }

    /// Path of the exact-trace event log.
    pub fn events_path(&self) -> PathBuf {
        self.dir.join(TX_EVENTS_FILE)
    }
}

impl SnapshotSource for MapDumpSource {
    fn attach(&mut self, probes: &[ProbeSpec]) -> Result<usize, SourceError> {
        let binary = resolve_target(&self.target)?;

        let symbols: BTreeSet<&str> = probes
            .iter()
            .flat_map(|p| [p.entry_symbol.as_deref(), p.exit_symbol()])
            .flatten()
            .collect();
        let symbols: Vec<&str> = symbols.into_iter().collect();
        let matched = count_symbols(&binary, &symbols)?;
        if matched == 0 {
            return Err(SourceError::NoAttachPoints {
                target: binary.display().to_string(),
            });
        }

        // Events already in the log predate this run.
        self.tx_offset = match std::fs::metadata(self.events_path()) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(source) => {
                return Err(SourceError::Io {
                    path: self.events_path(),
                    source,
                })
            }
        };

        info!(
            target = %binary.display(),
            matched,
            symbols = symbols.len(),
            dump_dir = %self.dir.display(),
            "attached"
        );
        self.resolved = Some(binary);
        Ok(matched)
    }

    fn snapshot(&mut self, probe: &ProbeSpec) -> Result<ProbeSnapshot, SourceError> {
        if self.resolved.is_none() {
            return Err(SourceError::NotAttached);
        }
        let path = self.snapshot_path(probe.id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::MissingSnapshot(probe.id))
            }
            Err(source) => return Err(SourceError::Io { path, source }),
        };
        serde_json::from_str(&content).map_err(|e| SourceError::Malformed {
            path,
            reason: e.to_string(),
        })
    }

    fn drain_transactions(&mut self) -> Result<Vec<TransactionEvent>, SourceError> {
        if self.resolved.is_none() {
            return Err(SourceError::NotAttached);
        }
        let path = self.events_path();
        let io_err = |source| SourceError::Io {
            path: path.clone(),
            source,
        };

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };
        let len = file.metadata().map_err(io_err)?.len();
        if len < self.tx_offset {
            // Log was truncated or replaced by the loader.
            debug!(path = %path.display(), "event log shrank, reading from start");
            self.tx_offset = 0;
        }
        file.seek(SeekFrom::Start(self.tx_offset)).map_err(io_err)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(io_err)?;

        let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete = &buf[..=last_newline];

        let mut events = Vec::new();
        for line in complete.split(|&b| b == b'\n') {
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            let event: TransactionEvent =
                serde_json::from_slice(line).map_err(|e| SourceError::Malformed {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            events.push(event);
        }

        self.tx_offset += complete.len() as u64;
        debug!(events = events.len(), offset = self.tx_offset, "drained transaction events");
        Ok(events)
    }

    fn describe(&self) -> String {
        match &self.resolved {
            Some(binary) => format!("{} via {}", binary.display(), self.dir.display()),
            None => format!("<unattached> via {}", self.dir.display()),
        }
    }
}
