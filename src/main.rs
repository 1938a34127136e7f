use clap::Parser;
use revanced_auto_patcher::{logging, Cli, RunOutcome};
use std::process::ExitCode;

/// Exit status when the user cancels with Ctrl-C
const EXIT_CANCELLED: u8 = 5;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!("Couldn't determine the working directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = revanced_auto_patcher::run(cli, &cwd) => match result {
            Ok(RunOutcome::Patched(path)) => {
                tracing::debug!("Patched APK written to {}", path.display());
                ExitCode::SUCCESS
            }
            Ok(RunOutcome::UpToDate) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::from(e.exit_code() as u8)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancel requested, exiting...");
            ExitCode::from(EXIT_CANCELLED)
        }
    }
}
