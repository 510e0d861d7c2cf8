//! CLI configuration: thin wrapper around `lapbridge_config`.
//!
//! Adds flag overrides from `GlobalOpts` (--config, --api-url, --reader,
//! --token) on top of the shared file/env loading.

use std::path::PathBuf;

use secrecy::SecretString;

use lapbridge_config::{Config, ConfigError};
use lapbridge_core::BridgeConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config`, or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(lapbridge_config::config_path)
}

/// Load defaults ← file ← env, then apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = lapbridge_config::load_config(Some(&config_file(global)))?;
    apply_overrides(&mut cfg, global)?;
    Ok(cfg)
}

/// Apply `--api-url` and `--reader` to `cfg`.
pub fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref url) = global.api_url {
        cfg.api.url = Some(url.clone());
    }
    if let Some(ref address) = global.reader {
        cfg.reader.set_address(address).map_err(|e| match e {
            ConfigError::Validation { reason, .. } => CliError::Validation {
                field: "--reader".into(),
                reason,
            },
            other => other.into(),
        })?;
    }
    Ok(())
}

/// `--token` first, then the shared credential chain.
pub fn resolve_token(global: &GlobalOpts, cfg: &Config) -> Result<SecretString, CliError> {
    if let Some(token) = global.token.as_ref().filter(|t| !t.is_empty()) {
        return Ok(SecretString::from(token.clone()));
    }
    Ok(lapbridge_config::resolve_token(&cfg.api)?)
}

/// Full runtime config, including API credentials.
pub fn bridge_config(global: &GlobalOpts, cfg: &Config) -> Result<BridgeConfig, CliError> {
    // URL problems are reported before a missing token.
    cfg.api.parsed_url()?;
    let token = resolve_token(global, cfg)?;
    Ok(lapbridge_config::to_bridge_config(cfg, token)?)
}
