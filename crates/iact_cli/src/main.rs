//! iact3 CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Stack failure
//! - 4: Configuration error
//! - 5: Parameter resolution error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use iact_config::ConfigError;
use iact_params::ResolveError;
use iact_stack::StackError;

mod commands;

use commands::{Cli, Commands, TestCommands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const STACK_FAILURE: u8 = 3;
    pub const CONFIG_ERROR: u8 = 4;
    pub const RESOLUTION_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,iact={}", level)));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();

    let fixture = cli.fixture.as_deref();
    let result = match cli.command {
        Commands::Test(TestCommands::Run(args)) => commands::run::execute(args, fixture).await,
        Commands::Test(TestCommands::Params(args)) => commands::params::execute(args, fixture).await,
        Commands::Test(TestCommands::Preview(args)) => {
            commands::preview::execute(args, fixture).await
        }
        Commands::Test(TestCommands::List(args)) => commands::list::execute(args, fixture).await,
        Commands::Test(TestCommands::Clean(args)) => commands::clean::execute(args, fixture).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<StackError>() {
            return match err {
                StackError::FailedStacks { .. } => ExitCodes::STACK_FAILURE,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if cause.is::<ConfigError>() {
            return ExitCodes::CONFIG_ERROR;
        }
        if cause.is::<ResolveError>() {
            return ExitCodes::RESOLUTION_ERROR;
        }
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("option") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn test_categorize_errors() {
        let failed = anyhow::Error::new(StackError::FailedStacks {
            count: 1,
            details: "{stack-1: failed}".into(),
        });
        assert_eq!(categorize_error(&failed), ExitCodes::STACK_FAILURE);

        let config: anyhow::Result<()> =
            Err(ConfigError::NotFound(PathBuf::from(".iact3.yml"))).context("Failed to load");
        assert_eq!(categorize_error(&config.unwrap_err()), ExitCodes::CONFIG_ERROR);

        let resolve = anyhow::Error::new(ResolveError::Template("unreachable".into()));
        assert_eq!(categorize_error(&resolve), ExitCodes::RESOLUTION_ERROR);

        let args = anyhow::anyhow!("missing --fixture argument");
        assert_eq!(categorize_error(&args), ExitCodes::INVALID_ARGS);

        assert_eq!(
            categorize_error(&anyhow::Error::new(StackError::Interrupted)),
            ExitCodes::GENERAL_ERROR
        );
    }
}
