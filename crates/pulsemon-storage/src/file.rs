//! Line-oriented JSON persistence for the memory backend.
//!
//! One metric per line, same shape as the wire metric, newline-terminated.
//! Synchronous mode appends and flushes on every write; periodic mode
//! rewrites the file truncated-and-whole from the current snapshot.

use crate::error::StorageError;
use pulsemon_common::model::Metric;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Append-only writer used by the synchronous persistence mode.
pub struct MetricsWriter {
    writer: BufWriter<File>,
}

impl MetricsWriter {
    /// Opens `path` truncated; previously persisted records are replaced by
    /// whatever the restarted process writes.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends one metric as a JSON line and flushes the buffer so the
    /// record is on disk before the write call returns.
    pub fn append(&mut self, metric: &Metric) -> Result<(), StorageError> {
        serde_json::to_writer(&mut self.writer, metric)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads every valid metric record from `path`. Malformed lines are skipped;
/// a missing file restores nothing.
pub fn read_metrics(path: impl AsRef<Path>) -> Result<Vec<Metric>, StorageError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut metrics = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Metric>(&line) {
            Ok(metric) => metrics.push(metric),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed persistence record");
            }
        }
    }
    Ok(metrics)
}

/// Rewrites `path` from scratch with the full snapshot, all gauges followed
/// by all counters.
pub fn write_snapshot(
    path: impl AsRef<Path>,
    gauges: &HashMap<String, f64>,
    counters: &HashMap<String, i64>,
) -> Result<(), StorageError> {
    let mut writer = MetricsWriter::create(path)?;
    for (name, value) in gauges {
        writer.append(&Metric::gauge(name.clone(), *value))?;
    }
    for (name, delta) in counters {
        writer.append(&Metric::counter(name.clone(), *delta))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsemon_common::model::MetricKind;
    use std::io::Write as _;

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let mut writer = MetricsWriter::create(&path).unwrap();
        writer.append(&Metric::gauge("Alloc", 12.5)).unwrap();
        writer.append(&Metric::counter("PollCount", 7)).unwrap();

        let metrics = read_metrics(&path).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0], Metric::gauge("Alloc", 12.5));
        assert_eq!(metrics[1], Metric::counter("PollCount", 7));
    }

    #[test]
    fn read_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"id":"ok","type":"gauge","value":1.0}}"#).unwrap();
        writeln!(file, "this is not json").unwrap();
        writeln!(file, r#"{{"id":"also-ok","type":"counter","delta":2}}"#).unwrap();

        let metrics = read_metrics(&path).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].kind, MetricKind::Counter);
    }

    #[test]
    fn read_from_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = read_metrics(dir.path().join("nope.json")).unwrap();
        assert!(metrics.is_empty());
    }

    #[test]
    fn snapshot_truncates_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let mut stale = MetricsWriter::create(&path).unwrap();
        for i in 0..10 {
            stale.append(&Metric::counter(format!("stale{i}"), i)).unwrap();
        }
        drop(stale);

        let gauges = HashMap::from([("g".to_string(), 1.5)]);
        let counters = HashMap::from([("c".to_string(), 2i64)]);
        write_snapshot(&path, &gauges, &counters).unwrap();

        let metrics = read_metrics(&path).unwrap();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.contains(&Metric::gauge("g", 1.5)));
        assert!(metrics.contains(&Metric::counter("c", 2)));
    }
}
