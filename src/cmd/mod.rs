//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each handler
//! lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::BroadcastError;

pub async fn dispatch(cli: Cli) -> Result<(), BroadcastError> {
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
        "\n  service-broadcast v{version} - broadcast HTTP to all service endpoints\n\n  \
         No command provided. To get started:\n\n    \
         service-broadcast run -a 10.0.0.1:80 -a 10.0.0.2:80      Broadcast to static targets\n    \
         service-broadcast run -s svc -p http -f endpoints.json   Follow an Endpoints file\n    \
         service-broadcast --help                                 See all commands and options\n"
    );
}
