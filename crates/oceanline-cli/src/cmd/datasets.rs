//! Datasets subcommand - show the registry a fetch would use

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use oceanline_earthdata::DEFAULT_DATASETS;

use super::table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct DatasetsArgs {
    /// Data root (default: [output] root from config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: DatasetsArgs, config: &Config) -> Result<()> {
    let registry = config.registry(args.output.as_deref())?;

    let mut table = table(&["Name", "Short name", "Destination", "Description"]);
    for entry in registry.entries() {
        let description = DEFAULT_DATASETS
            .iter()
            .find(|d| d.short_name == entry.short_name)
            .map_or("", |d| d.description);
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(&entry.short_name),
            Cell::new(entry.destination.display()),
            Cell::new(description),
        ]);
    }

    let range = registry.range();
    eprintln!("\n{table}");
    eprintln!("Range: {range} ({} days)", range.days());
    Ok(())
}
