use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::ExtractConfig;
use crate::dataset::{FeatureRow, RowSink};
use crate::features::WindowStats;
use crate::filter::{admit, Admission, FilterStats};
use crate::flow::{Flow, FlowTable};
use crate::ingest::{CaptureReader, CaptureStats};
use crate::markov::TransitionMatrix;
use crate::window::segment_flow;

/// Everything learned from a single capture file.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureOutcome {
    pub pcap: String,
    pub stats: CaptureStats,
    pub filter: FilterStats,
    pub flows: usize,
    pub skipped_packets: u64,
    #[serde(skip)]
    pub rows: Vec<FeatureRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub flows: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_seen: usize,
    pub failed_files: usize,
    pub empty_files: usize,
    pub rows_written: u64,
    pub filter: FilterStats,
    pub captures: Vec<CaptureSummary>,
    pub elapsed_ms: u64,
}

pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    fn extract_flow(&self, flow: &Flow, pcap: &str) -> (Vec<FeatureRow>, FilterStats) {
        let mut stats = FilterStats {
            flows: 1,
            ..Default::default()
        };
        let seg = segment_flow(flow, &self.config.segment_params());

        if seg.discarded {
            stats.flows_discarded_encrypted += 1;
            tracing::debug!(
                flow = %flow.key,
                packets = flow.packets.len(),
                first = flow.first_timestamp(),
                last = flow.last_timestamp(),
                "long flow carries TLS, discarded"
            );
            return (Vec::new(), stats);
        }
        for _ in 0..seg.encrypted_windows {
            stats.record(Admission::Encrypted);
        }

        let flow_id = flow.key.to_string();
        let mut rows = Vec::new();
        for window in &seg.windows {
            let admission = admit(window.packets);
            stats.record(admission);
            if admission != Admission::Admitted {
                tracing::trace!(
                    flow = %window.key,
                    window = window.index,
                    start = window.start(),
                    end = window.end(),
                    ?admission,
                    "window dropped"
                );
                continue;
            }

            let features = WindowStats::from_packets(window.packets);
            let matrix = TransitionMatrix::from_packets(window.packets, &self.config.size_thresholds);
            rows.push(FeatureRow::new(&features, &matrix, flow_id.clone(), pcap.to_string()));
        }
        (rows, stats)
    }

    /// Featurizes every flow of `table`. Flows are handled in parallel but
    /// rows come back in flow order, windows in time order within a flow.
    pub fn extract_rows(&self, table: &FlowTable, pcap: &str) -> (Vec<FeatureRow>, FilterStats) {
        let per_flow: Vec<(Vec<FeatureRow>, FilterStats)> = table
            .flows()
            .par_iter()
            .map(|flow| self.extract_flow(flow, pcap))
            .collect();

        let mut rows = Vec::new();
        let mut stats = FilterStats::default();
        for (flow_rows, flow_stats) in per_flow {
            rows.extend(flow_rows);
            stats.merge(&flow_stats);
        }
        (rows, stats)
    }

    /// Reads one capture end to end. The file is released when the reader
    /// is dropped, on success and on error alike.
    pub fn process_capture(&self, path: &Path) -> Result<CaptureOutcome> {
        let mut reader = CaptureReader::open(path)?;
        let table = FlowTable::try_from_packets(&mut reader)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        let pcap = reader.filename().to_string();
        let stats = reader.stats().clone();
        drop(reader);

        let (rows, filter) = self.extract_rows(&table, &pcap);

        tracing::info!(
            file = %pcap,
            packets = stats.frames,
            flows = table.len(),
            windows = filter.windows,
            rows = rows.len(),
            "processed capture"
        );

        Ok(CaptureOutcome {
            pcap,
            stats,
            filter,
            flows: table.len(),
            skipped_packets: table.skipped_count(),
            rows,
        })
    }

    /// Capture files directly inside `dir`, sorted by file name.
    pub fn list_captures(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("cannot read directory {}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("cannot list {}", dir.display()))?
                .path();
            if path.is_file() && self.config.is_capture(&path) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Processes every capture in `dir` and streams the rows into `sink`.
    /// A capture that cannot be decoded is logged and skipped; sink errors
    /// abort the run.
    pub fn process_directory(&self, dir: &Path, sink: &mut dyn RowSink) -> Result<RunSummary> {
        let started = Instant::now();
        let files = self.list_captures(dir)?;
        let mut summary = RunSummary {
            files_seen: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            tracing::warn!(dir = %dir.display(), "no capture files found");
        }

        for path in files {
            let outcome = match self.process_capture(&path) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(file = %path.display(), "skipping capture: {e:#}");
                    summary.failed_files += 1;
                    summary.captures.push(CaptureSummary {
                        path,
                        rows: 0,
                        flows: 0,
                        error: Some(format!("{e:#}")),
                    });
                    continue;
                }
            };

            if outcome.rows.is_empty() {
                summary.empty_files += 1;
            }
            for row in &outcome.rows {
                sink.write_row(row)
                    .with_context(|| format!("failed to write rows from {}", outcome.pcap))?;
            }
            summary.rows_written += outcome.rows.len() as u64;
            summary.filter.merge(&outcome.filter);
            summary.captures.push(CaptureSummary {
                path,
                rows: outcome.rows.len(),
                flows: outcome.flows,
                error: None,
            });
        }

        sink.finish()?;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            files = summary.files_seen,
            failed = summary.failed_files,
            rows = summary.rows_written,
            "run complete"
        );
        Ok(summary)
    }
}
