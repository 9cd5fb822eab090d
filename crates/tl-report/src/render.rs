//! Plain-text rendering of reconstructed stats.

use std::fmt::Write;
use tl_common::ProbeId;

use crate::reconstruct::ReconstructedStats;
use crate::summary::SeriesPoint;

/// Render a human-readable report, optionally restricted to one probe.
pub fn render_text(stats: &ReconstructedStats, probe: Option<ProbeId>) -> String {
    let mut out = String::new();
    let c = &stats.collection;
    let _ = writeln!(
        out,
        "collection {} [{} .. {}] build {}",
        c.id,
        stats.window.start.format_utc(),
        stats.window.end.format_utc(),
        if c.build_id.is_empty() { "-" } else { &c.build_id },
    );
    if !c.tags.is_empty() {
        let _ = writeln!(out, "tags: {}", c.tags.join(", "));
    }

    for record in stats
        .probes
        .iter()
        .filter(|p| probe.map_or(true, |id| id == p.id))
    {
        let _ = writeln!(out, "\nprobe {} ({})", record.id, record.description);

        let latency = points(&stats.latency_series, record.id);
        if !latency.is_empty() {
            let _ = writeln!(out, "  latency (log2 us):");
            write_series(&mut out, &latency);
        }
        if let Some(trimmed) = stats.trimmed_latency(record.id) {
            let _ = writeln!(out, "  latency histogram:");
            for (bucket, count) in trimmed.labelled().filter(|&(_, c)| c > 0) {
                let _ = writeln!(out, "    2^{bucket:<3} {count}");
            }
        }

        let results = points(&stats.result_series, record.id);
        if !results.is_empty() {
            let _ = writeln!(out, "  result codes:");
            write_series(&mut out, &results);
        }
        if let Some(trimmed) = stats.trimmed_results(record.id) {
            let _ = writeln!(out, "  result histogram:");
            for (code, count) in trimmed.labelled().filter(|&(_, c)| c > 0) {
                let _ = writeln!(out, "    {code:>4} {count}");
            }
        }
    }

    if stats.out_of_range_results > 0 {
        let _ = writeln!(
            out,
            "\n{} result counts outside [{}, {}]",
            stats.out_of_range_results, stats.result_range.min, stats.result_range.max
        );
    }
    if !stats.transactions.is_empty() {
        let _ = writeln!(out, "\n{} traced transactions", stats.transactions.len());
    }
    out
}

fn points(series: &[SeriesPoint], probe: ProbeId) -> Vec<&SeriesPoint> {
    series.iter().filter(|p| p.probe_id == probe).collect()
}

fn write_series(out: &mut String, points: &[&SeriesPoint]) {
    let _ = writeln!(
        out,
        "    {:<19} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "timestamp", "count", "mean", "median", "min", "max"
    );
    for p in points {
        let s = &p.summary;
        let _ = writeln!(
            out,
            "    {:<19} {:>8} {:>8.3} {:>8.3} {:>8.3} {:>8.3}",
            p.timestamp.format_utc(),
            s.count,
            s.mean,
            s.median,
            s.min,
            s.max
        );
    }
}
