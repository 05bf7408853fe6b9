//! `oj`: the command-line client. Connects to the daemon's socket and
//! issues one RPC call per invocation, printing the result as JSON (or a
//! short human-readable line for the common cases) and mapping RPC error
//! kinds onto process exit codes.

mod client;
mod color;
mod commands;
mod exit_error;

use clap::Parser;
use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "oj", version, about = "Control the oddjobs daemon", styles = color::styles())]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(commands::run(cli.command)) {
        let exit_err = err.downcast::<ExitError>().unwrap_or_else(|e| ExitError::new(1, e.to_string()));
        eprintln!("{}", exit_err.message);
        std::process::exit(exit_err.code);
    }
}
