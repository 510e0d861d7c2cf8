//! One-shot ping against the lap API.

use serde_json::json;
use tracing::debug;

use lapbridge_core::dispatch::build_lap_client;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let bridge_cfg = config::bridge_config(global, &cfg)?;
    let client = build_lap_client(&bridge_cfg.api)?;

    debug!(url = %client.ping_url(), "sending ping");
    let status = client.ping().await?;

    let doc = json!({
        "url": client.ping_url().as_str(),
        "status": status.as_u16(),
    });
    output::print_output(&output::render_document(global.output, &doc), global.quiet);
    Ok(())
}
