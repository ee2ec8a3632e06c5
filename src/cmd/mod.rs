//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`].
//! Each handler lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::JunctionError;

pub async fn dispatch(cli: Cli) -> Result<(), JunctionError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args),
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
        "\n  junction v{version}: host and path based reverse-proxy router\n\n  \
         No command provided. To get started:\n\n    \
         junction run                        Start the router (auto-detects ./junction.yaml)\n    \
         junction run -s services.yaml       Start with a specific services file\n    \
         junction validate services.yaml     Check a services file\n    \
         junction --help                     See all commands and options\n"
    );
}
