pub mod config;
pub mod extract;
pub mod inspect;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "flowmark",
    about = "Flow feature extraction for packet captures",
    long_about = "flowmark - Turns directories of packet captures into a CSV dataset of\n\
                  per-window TCP flow statistics and packet-size transition matrices.\n\n\
                  Only plaintext windows with a complete three-way handshake are kept.",
    version,
    propagate_version = true,
    styles = get_styles(),
)]
pub struct Cli {
    /// Config file (defaults to ~/.flowmark/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress the banner
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the feature dataset from every capture in a directory
    Extract(extract::ExtractArgs),

    /// Process a single capture and print what the filter kept
    Inspect(inspect::InspectArgs),

    /// Show the effective configuration or write the defaults
    Config(config::ConfigArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Extract(args) => extract::run(args, config),
        Commands::Inspect(args) => inspect::run(args, config),
        Commands::Config(args) => config::run(args, config),
    }
}

fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .usage(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .literal(
            clap::builder::styling::AnsiColor::BrightGreen
                .on_default()
                .bold(),
        )
        .placeholder(
            clap::builder::styling::AnsiColor::BrightWhite
                .on_default()
                .dimmed(),
        )
}
