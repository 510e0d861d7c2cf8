//! Command dispatch: routes parsed CLI commands to handlers.

pub mod config_cmd;
pub mod ping;
pub mod run;

use clap::CommandFactory;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(&args, global).await,
        Command::Ping => ping::handle(global).await,
        // Config and completions never need the reader or the API.
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "lapbridge",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
