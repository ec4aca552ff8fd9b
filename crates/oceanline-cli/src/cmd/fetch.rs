//! Fetch subcommand - search and download every configured dataset

use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use comfy_table::Cell;
use indicatif::HumanBytes;
use oceanline_core::SharedProgress;
use oceanline_core::progress::fmt_num;
use oceanline_earthdata::registry::parse_date;
use oceanline_earthdata::{
    DateRange, EarthdataClient, FailurePolicy, FetchError, Registry, RunOptions, RunSummary,
    authenticate,
};

use super::{credentials, print_summary, table};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// First day to fetch (YYYY-MM-DD, default: [range] start)
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Last day to fetch, inclusive (YYYY-MM-DD, default: [range] end)
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// Datasets to fetch by name or short name (comma-separated, default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub dataset: Vec<String>,

    /// Data root (default: [output] root from config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep going after a dataset fails; exit non-zero at the end
    #[arg(long)]
    pub keep_going: bool,

    /// Search and report counts without downloading
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of granules per dataset
    #[arg(short = 'l', long)]
    pub limit: Option<NonZeroUsize>,
}

/// Registry from config, narrowed and re-ranged by the command line
fn build_registry(args: &FetchArgs, config: &Config) -> Result<Registry> {
    let mut registry = config.registry(args.output.as_deref())?;

    if args.start.is_some() || args.end.is_some() {
        let current = registry.range();
        let range = DateRange::new(
            args.start.unwrap_or(current.start()),
            args.end.unwrap_or(current.end()),
        )?;
        registry = registry.with_range(range);
    }
    if !args.dataset.is_empty() {
        registry = registry.select(&args.dataset)?;
    }
    Ok(registry)
}

pub fn run(args: FetchArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let registry = build_registry(&args, config)?;
    let options = RunOptions {
        policy: if args.keep_going {
            FailurePolicy::Continue
        } else {
            FailurePolicy::FailFast
        },
        dry_run: args.dry_run,
        limit: args.limit.map(NonZeroUsize::get),
    };

    let credentials = credentials(config)?;
    let client = EarthdataClient::new(config.endpoints());
    let session = authenticate(&client, &credentials).map_err(FetchError::from)?;
    // Logged at info by authenticate, which a TTY run filters out
    if progress.hides_info() {
        progress.println(format!("Auth status: {}", session.status()));
    }

    let summary = oceanline_earthdata::run(&client, session, &registry, &options, progress)?;

    if !progress.is_tty() {
        summary.log();
    }
    print_datasets(&summary);
    print_summary(
        "Fetch",
        &[
            ("Range", format!("{} ({} days)", registry.range(), registry.range().days())),
            (
                "Datasets",
                format!(
                    "{}/{} ({} failed)",
                    summary.outcomes.len() - summary.failed(),
                    summary.outcomes.len(),
                    summary.failed()
                ),
            ),
            ("Granules", fmt_num(summary.total_granules())),
            (
                "Files",
                format!(
                    "{} downloaded, {} already present",
                    fmt_num(summary.total_downloaded()),
                    fmt_num(summary.total_skipped())
                ),
            ),
            ("Size", HumanBytes(summary.total_bytes()).to_string()),
            ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
        ],
    );

    if summary.failed() > 0 {
        anyhow::bail!("{} of {} datasets failed", summary.failed(), summary.outcomes.len());
    }
    Ok(())
}

/// Per-dataset table on stderr
fn print_datasets(summary: &RunSummary) {
    let mut table = table(&["Dataset", "Short name", "Granules", "Files", "Status"]);
    for o in &summary.outcomes {
        let files = match o.report {
            Some(r) => format!("{} new, {} present", fmt_num(r.downloaded), fmt_num(r.skipped)),
            None => "-".to_string(),
        };
        let status = match &o.error {
            Some(e) => format!("failed ({}): {e}", e.kind()),
            None if o.report.is_none() => "searched".to_string(),
            None => "ok".to_string(),
        };
        table.add_row(vec![
            Cell::new(&o.name),
            Cell::new(&o.short_name),
            Cell::new(fmt_num(o.granules)),
            Cell::new(files),
            Cell::new(status),
        ]);
    }
    eprintln!("\n{table}");
}
