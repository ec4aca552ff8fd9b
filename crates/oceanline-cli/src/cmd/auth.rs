//! Auth subcommand - log in and report the session

use anyhow::Result;
use oceanline_earthdata::{EarthdataClient, FetchError, authenticate};

use super::{credentials, print_summary};
use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let credentials = credentials(config)?;
    let client = EarthdataClient::new(config.endpoints());
    let session = authenticate(&client, &credentials).map_err(FetchError::from)?;

    print_summary(
        "Earthdata",
        &[
            ("User", session.username().unwrap_or("unknown").to_string()),
            ("Strategy", session.strategy().to_string()),
            (
                "Expires",
                session
                    .expires_at()
                    .map_or("unknown".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string()),
            ),
            ("URS URL", client.endpoints().urs_url.clone()),
        ],
    );
    Ok(())
}
