//! Binary entry point; see [`vault_harness_cli::run`].

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    vault_harness_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
