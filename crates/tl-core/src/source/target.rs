//! Trace target resolution and symbol matching.

use regex::bytes::RegexSet;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::SourceError;

/// What the user asked to trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSpec {
    pub pid: Option<u32>,
    pub exe: Option<PathBuf>,
}

impl TargetSpec {
    fn describe(&self) -> String {
        match (&self.exe, self.pid) {
            (Some(exe), Some(pid)) => format!("{} (pid {pid})", exe.display()),
            (Some(exe), None) => exe.display().to_string(),
            (None, Some(pid)) => format!("pid {pid}"),
            (None, None) => "<no target>".to_string(),
        }
    }
}

/// Resolve the executable to instrument.
///
/// A pid without an executable resolves through `/proc/<pid>/exe`. A bare
/// name without a path separator is looked up on `PATH`.
pub fn resolve_target(target: &TargetSpec) -> Result<PathBuf, SourceError> {
    let unresolved = || SourceError::TargetUnresolved(target.describe());

    let candidate = match (&target.exe, target.pid) {
        (Some(exe), _) => exe.clone(),
        (None, Some(pid)) => PathBuf::from(format!("/proc/{pid}/exe")),
        (None, None) => return Err(unresolved()),
    };

    let resolved = if candidate.components().count() > 1 || candidate.is_absolute() {
        candidate.is_file().then_some(candidate)
    } else {
        find_on_path(&candidate)
    };

    let resolved = resolved.ok_or_else(unresolved)?;
    let resolved = resolved.canonicalize().map_err(|_| unresolved())?;
    debug!(target = %resolved.display(), "resolved trace target");
    Ok(resolved)
}

fn find_on_path(name: &Path) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Number of distinct symbol names in the binary at `binary` matched by
/// any of `patterns`.
///
/// A pattern is a regex matched against whole symbol names, so a plain
/// mangled name matches only itself. Names are the maximal runs of symbol
/// characters in the file, which covers the string tables of an ELF image.
pub fn count_symbols(binary: &Path, patterns: &[&str]) -> Result<usize, SourceError> {
    let matcher = symbol_matcher(patterns)?;
    if matcher.is_empty() {
        return Ok(0);
    }
    let bytes = fs::read(binary).map_err(|source| SourceError::TargetUnreadable {
        path: binary.to_path_buf(),
        source,
    })?;

    let matched: BTreeSet<&[u8]> = bytes
        .split(|&b| !is_symbol_byte(b))
        .filter(|name| !name.is_empty() && matcher.is_match(name))
        .collect();
    debug!(
        binary = %binary.display(),
        patterns = matcher.len(),
        matched = matched.len(),
        "symbols matched"
    );
    Ok(matched.len())
}

fn symbol_matcher(patterns: &[&str]) -> Result<RegexSet, SourceError> {
    let anchored: Vec<String> = patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| format!("^(?:{p})$"))
        .collect();
    RegexSet::new(&anchored).map_err(|e| SourceError::InvalidSymbolPattern(e.to_string()))
}

fn is_symbol_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'$' | b'@')
}
