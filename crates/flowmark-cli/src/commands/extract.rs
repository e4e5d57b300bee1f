use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use flowmark_core::config::ExtractConfig;
use flowmark_core::dataset::CsvSink;
use flowmark_core::pipeline::Extractor;

#[derive(Args)]
pub struct ExtractArgs {
    /// Directory holding the capture files
    pub input_dir: PathBuf,

    /// Output CSV path
    #[arg(short, long, default_value = "flows.csv")]
    pub output: PathBuf,

    /// Window span in minutes
    #[arg(long)]
    pub window_minutes: Option<f64>,

    /// Flows at least this many minutes long are not windowed
    #[arg(long)]
    pub long_flow_minutes: Option<f64>,

    /// Frames shorter than this many bytes are "small"
    #[arg(long)]
    pub small_threshold: Option<u32>,

    /// Frames of at least this many bytes are "large"
    #[arg(long)]
    pub large_threshold: Option<u32>,

    /// Capture file extension to pick up (repeatable)
    #[arg(short, long = "extension")]
    pub extensions: Vec<String>,

    /// Worker threads for flow featurization (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}

impl ExtractArgs {
    /// Command-line values win over the config file and environment.
    fn apply(&self, config: &mut ExtractConfig) -> Result<()> {
        if let Some(v) = self.window_minutes {
            config.window_minutes = v;
        }
        if let Some(v) = self.long_flow_minutes {
            config.long_flow_minutes = v;
        }
        if let Some(v) = self.small_threshold {
            config.size_thresholds.small = v;
        }
        if let Some(v) = self.large_threshold {
            config.size_thresholds.large = v;
        }
        if !self.extensions.is_empty() {
            config.capture_extensions = self.extensions.clone();
        }
        config.validate()
    }
}

pub fn run(args: ExtractArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = ExtractConfig::load(config_path)?;
    args.apply(&mut config)?;

    if args.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.jobs)
            .build_global()
            .context("failed to size the worker pool")?;
    }

    println!(
        "  {} {} -> {}",
        console::style("extracting").cyan().bold(),
        args.input_dir.display(),
        args.output.display(),
    );
    println!(
        "        window {} min, long flow {} min, sizes <{} / >={} bytes, extensions [{}]",
        config.window_minutes,
        config.long_flow_minutes,
        config.size_thresholds.small,
        config.size_thresholds.large,
        config.capture_extensions.join(", "),
    );

    let extractor = Extractor::new(config);
    let mut sink = CsvSink::create(&args.output)?;
    let summary = extractor.process_directory(&args.input_dir, &mut sink)?;

    for capture in &summary.captures {
        let name = capture
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match &capture.error {
            Some(err) => println!(
                "    {} {}  {}",
                console::style("FAIL").red().bold(),
                name,
                console::style(err).dim(),
            ),
            None => println!(
                "    {} {}  {} flows, {} rows",
                console::style(" ok ").green().bold(),
                name,
                capture.flows,
                console::style(capture.rows).green(),
            ),
        }
    }

    let f = &summary.filter;
    println!(
        "\n  {} {} rows from {} captures ({} failed, {} empty) in {:.1}s",
        console::style("done").green().bold(),
        console::style(summary.rows_written).green().bold(),
        summary.files_seen,
        summary.failed_files,
        summary.empty_files,
        summary.elapsed_ms as f64 / 1000.0,
    );
    println!(
        "        {} flows, {} windows: {} admitted, {} no handshake, {} encrypted; {} long flows dropped for TLS",
        f.flows,
        f.windows,
        f.windows_admitted,
        f.windows_no_handshake,
        f.windows_encrypted,
        f.flows_discarded_encrypted,
    );

    if summary.rows_written == 0 {
        println!(
            "  {} no window passed the filters; {} has no rows",
            console::style("warning:").yellow().bold(),
            args.output.display(),
        );
    }

    Ok(())
}
