//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to [`run`] or
//! [`health`]. Each handler lives in its own submodule.

pub mod health;
pub mod run;

use crate::cli::{Cli, Commands};
use crate::error::McpoError;

pub async fn dispatch(cli: Cli) -> Result<(), McpoError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(args).await,
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  mcpo-guard v{version}\n\n  \
         No command provided. To get started:\n\n    \
         mcpo-guard run                    Start the server on 0.0.0.0:3000\n    \
         mcpo-guard health                 Check a running instance\n    \
         mcpo-guard --help                 See all commands and options\n"
    );
}
