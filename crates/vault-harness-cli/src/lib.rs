//! Command-line runtime for the vault test harness.
//!
//! Configuration flags come first and are handed to `ortho_config`; the
//! remaining tokens select a subcommand. `agent` (the default) provisions a
//! server with LDAP auth and waits for a termination signal, while `check`
//! performs a single start, initialize, unseal and stop cycle.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

mod config;
mod errors;
mod scenario;
mod shutdown;

use config::{ConfigLoader, OrthoConfigLoader, split_arguments};
pub(crate) use errors::AppError;
use shutdown::{ShutdownSignal, SystemShutdownSignal};

pub(crate) const CLI_TARGET: &str = module_path!();

#[derive(Debug, Parser)]
#[command(
    name = "vault-harness",
    version,
    about = "Runs a disposable Vault server for integration tests",
    after_help = "Configuration flags such as --address or --secret-shares must precede the command."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Subcommand)]
enum CliCommand {
    /// Start, unseal and configure LDAP auth, then wait for a signal.
    #[default]
    Agent,
    /// Start, unseal, print the seal status and stop.
    Check,
}

/// Runs the CLI with the provided arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, &OrthoConfigLoader, &SystemShutdownSignal)
}

fn run_with<I, W, E>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &dyn ConfigLoader,
    shutdown: &dyn ShutdownSignal,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_arguments(&args);
    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(usage) if !usage.use_stderr() => {
            return match write!(stdout, "{usage}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
        Err(usage) => return report(stderr, &AppError::CliUsage(usage)),
    };

    let result = loader.load(&split.config_arguments).and_then(|config| {
        let _telemetry = vault_harness::telemetry::initialise(&config)?;
        match cli.command.unwrap_or_default() {
            CliCommand::Agent => scenario::run_agent(&config, shutdown, stdout),
            CliCommand::Check => scenario::run_check(&config, stdout),
        }
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(target: CLI_TARGET, error = %failure, "harness command failed");
            report(stderr, &failure)
        }
    }
}

fn report<E: Write>(stderr: &mut E, failure: &AppError) -> ExitCode {
    if let Err(write_error) = writeln!(stderr, "{failure}") {
        error!(target: CLI_TARGET, error = %write_error, "failed to write to stderr");
    }
    ExitCode::FAILURE
}
