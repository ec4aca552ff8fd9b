//! CLI subcommands

pub mod auth;
pub mod datasets;
pub mod fetch;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use oceanline_earthdata::Credentials;

use crate::config::Config;

/// `[earthdata] token`, unless blank
fn config_token(config: &Config) -> Option<&str> {
    config.earthdata.token.as_deref().filter(|t| !t.trim().is_empty())
}

/// Credentials from `[earthdata] token`, else from `EARTHDATA_*` variables
pub fn credentials(config: &Config) -> Result<Credentials> {
    if let Some(token) = config_token(config) {
        return Ok(Credentials::Token(token.to_string()));
    }
    Credentials::from_env().context("No Earthdata credentials")
}

/// Where credentials would come from, for display
pub fn credential_source(config: &Config) -> &'static str {
    if config_token(config).is_some() {
        return "token (config)";
    }
    match Credentials::from_env() {
        Ok(Credentials::Token(_)) => "token (EARTHDATA_TOKEN)",
        Ok(Credentials::Basic { .. }) => "username/password (EARTHDATA_USERNAME)",
        Err(_) => "not set",
    }
}

/// Table with the shared look: UTF-8 borders, round corners, cyan header
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = table(&[title, "Value"]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
