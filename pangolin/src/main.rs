mod cli;
mod commands;
mod config;
mod logging;
mod output;
mod paths;
mod supervisor;
mod tunnel;

use clap::Parser;

use cli::Cli;

fn main() {
    // Parse CLI arguments early so we can configure logging/output.
    let cli = Cli::parse();

    crate::output::set_verbose(cli.verbose);

    let log_guard = match logging::init(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            crate::output::error_stderr(&format!("Failed to set up log file: {e}"));
            std::process::exit(1);
        }
    };

    if let Err(e) = cli.run() {
        tracing::error!(error = %e, "command failed");
        crate::output::error_stderr(&e.to_string());
        // exit() skips destructors; flush the file writer first.
        drop(log_guard);
        std::process::exit(1);
    }
}
