//! Config subcommand handlers.

use std::io::{self, BufRead};

use lapbridge_config::{Config, KEYRING_ACCOUNT, KEYRING_SERVICE};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            let path = config::config_file(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?.redacted();
            let out = match global.output {
                // Table mode shows the file form.
                OutputFormat::Table => toml::to_string_pretty(&cfg)
                    .map_err(|e| CliError::Config(Box::new(e.into())))?,
                format => output::render_document(format, &cfg),
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { force } => {
            let path = config::config_file(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let mut cfg = Config::default();
            config::apply_overrides(&mut cfg, global)?;
            lapbridge_config::save_config(&cfg, &path)?;

            if !global.quiet {
                eprintln!("✓ Configuration written to {}", path.display());
                if cfg.api.url.is_none() {
                    eprintln!("  Set [api] url, then store a token: lapbridge config set-token");
                }
            }
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken { token } => {
            let token = match token {
                Some(token) => token,
                None => read_token_line()?,
            };
            let token = token.trim();
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "must not be empty".into(),
                });
            }

            let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT).map_err(|e| {
                CliError::Keyring {
                    reason: format!("failed to access keyring: {e}"),
                }
            })?;
            entry.set_password(token).map_err(|e| CliError::Keyring {
                reason: format!("failed to store token: {e}"),
            })?;

            if !global.quiet {
                eprintln!("✓ Token stored in system keyring");
            }
            Ok(())
        }
    }
}

fn read_token_line() -> Result<String, CliError> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
