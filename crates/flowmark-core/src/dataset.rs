use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::features::WindowStats;
use crate::markov::TransitionMatrix;

// ---------------------------------------------------------------------------
// FeatureRow: one admitted window, columns in a fixed order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Count(u64),
    Real(f64),
    Text(String),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Count(n) => write!(f, "{}", n),
            // whole reals keep a ".0" so the column reads as floating point
            Field::Real(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{:.1}", x)
            }
            Field::Real(x) => write!(f, "{}", x),
            Field::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    fields: Vec<(&'static str, Field)>,
}

impl FeatureRow {
    pub fn new(stats: &WindowStats, matrix: &TransitionMatrix, flow_id: String, pcap: String) -> Self {
        let mut fields = vec![
            ("packet_count", Field::Count(stats.packet_count)),
            ("min_size", Field::Count(stats.min_size)),
            ("max_size", Field::Count(stats.max_size)),
            ("avg_size", Field::Real(stats.avg_size)),
            ("duration_sec", Field::Real(stats.duration_sec)),
            ("pps", Field::Real(stats.pps)),
        ];
        fields.extend(matrix.entries().map(|(name, p)| (name, Field::Real(p))));
        fields.push(("flow_id", Field::Text(flow_id)));
        fields.push(("pcap", Field::Text(pcap)));
        Self { fields }
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub fn fields(&self) -> &[(&'static str, Field)] {
        &self.fields
    }

    pub fn get(&self, column: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, field)| field)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

pub trait RowSink {
    fn write_row(&mut self, row: &FeatureRow) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RowSink for Vec<FeatureRow> {
    fn write_row(&mut self, row: &FeatureRow) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

/// CSV output whose header is fixed by the first row written. Every later
/// row must carry exactly the same columns in the same order.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header: Option<Vec<&'static str>>,
    rows: u64,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        Ok(Self::from_csv_writer(writer))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self::from_csv_writer(csv::Writer::from_writer(inner))
    }

    fn from_csv_writer(writer: csv::Writer<W>) -> Self {
        Self {
            writer,
            header: None,
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("cannot flush csv output: {}", e.error()))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn write_row(&mut self, row: &FeatureRow) -> Result<()> {
        match &self.header {
            None => {
                let header: Vec<&'static str> = row.columns().collect();
                self.writer
                    .write_record(&header)
                    .context("failed to write csv header")?;
                self.header = Some(header);
            }
            Some(header) => {
                if !row.columns().eq(header.iter().copied()) {
                    anyhow::bail!(
                        "row schema [{}] does not match csv header [{}]",
                        row.columns().collect::<Vec<_>>().join(","),
                        header.join(",")
                    );
                }
            }
        }

        self.writer
            .write_record(row.fields().iter().map(|(_, field)| field.to_string()))
            .context("failed to write csv row")?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush csv output")?;
        Ok(())
    }
}
