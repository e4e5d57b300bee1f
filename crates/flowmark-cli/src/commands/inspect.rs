use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use flowmark_core::config::ExtractConfig;
use flowmark_core::pipeline::Extractor;

#[derive(Args)]
pub struct InspectArgs {
    /// Path to a PCAP or PCAPNG file
    pub capture: PathBuf,

    /// Print the admitted rows as well
    #[arg(long, default_value_t = false)]
    pub rows: bool,

    /// Emit machine-readable JSON instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: InspectArgs, config_path: Option<&Path>) -> Result<()> {
    let config = ExtractConfig::load(config_path)?;
    let extractor = Extractor::new(config);
    let outcome = extractor.process_capture(&args.capture)?;

    if args.json {
        let mut value = serde_json::to_value(&outcome)?;
        if args.rows {
            let rows = outcome
                .rows
                .iter()
                .map(|row| {
                    row.fields()
                        .iter()
                        .map(|(name, field)| Ok((name.to_string(), serde_json::to_value(field)?)))
                        .collect::<Result<serde_json::Map<String, serde_json::Value>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            value["rows"] = serde_json::to_value(rows)?;
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let stats = &outcome.stats;
    println!(
        "  {} {}",
        console::style("capture").cyan().bold(),
        args.capture.display(),
    );
    println!(
        "        {} frames, {} bytes, {} undecoded, {} skipped",
        console::style(stats.frames).green().bold(),
        stats.bytes,
        stats.undecoded,
        outcome.skipped_packets,
    );
    if let (Some(start), Some(end)) = (stats.capture_start(), stats.capture_end()) {
        println!(
            "        {} .. {}",
            start.format("%Y-%m-%d %H:%M:%S%.3f"),
            end.format("%Y-%m-%d %H:%M:%S%.3f"),
        );
    }

    let f = &outcome.filter;
    println!(
        "  {} {} flows, {} windows",
        console::style("filter").cyan().bold(),
        outcome.flows,
        f.windows,
    );
    println!("        admitted      {}", console::style(f.windows_admitted).green());
    println!("        no handshake  {}", f.windows_no_handshake);
    println!("        encrypted     {}", f.windows_encrypted);
    println!("        long TLS flow {}", f.flows_discarded_encrypted);

    if args.rows && !outcome.rows.is_empty() {
        println!("\n  {}", console::style("rows").cyan().bold());
        for row in &outcome.rows {
            let cells: Vec<String> = row
                .fields()
                .iter()
                .filter(|(name, _)| *name != "pcap")
                .map(|(name, field)| format!("{}={}", name, field))
                .collect();
            println!("    {}", cells.join(" "));
        }
    }

    Ok(())
}
