//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], or [`health`].
//! Each handler lives in its own submodule.

pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::TandemError;

pub async fn dispatch(cli: Cli) -> Result<(), TandemError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
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
        "\n  tandem v{version}: comment dual-writer, wallpaper redirect, view counter\n\n  \
         No command provided. To get started:\n\n    \
         tandem init                  Generate a starter config\n    \
         tandem run                   Start the server (auto-detects ./tandem.yaml)\n    \
         tandem run -c edge.yaml      Start with a specific config file\n    \
         tandem --help                See all commands and options\n"
    );
}
