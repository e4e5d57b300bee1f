use std::path::Path;

use anyhow::Result;
use clap::Args;

use flowmark_core::config::ExtractConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the default configuration to the config path
    #[arg(long, default_value_t = false)]
    pub init: bool,

    /// Overwrite an existing file when initializing
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

pub fn run(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    if args.init {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(ExtractConfig::config_path);
        if path.exists() && !args.force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        ExtractConfig::default().save(&path)?;
        println!(
            "  {} {}",
            console::style("wrote").green().bold(),
            path.display(),
        );
        return Ok(());
    }

    let config = ExtractConfig::load(config_path)?;
    println!(
        "  {} {}\n",
        console::style("effective config").cyan().bold(),
        console::style(
            config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(ExtractConfig::config_path)
                .display()
        )
        .dim(),
    );
    print!("{}", config.to_toml()?);
    Ok(())
}
