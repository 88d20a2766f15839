use std::process::ExitCode;

use mapengine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_app(app.config, app.controller) {
        error!(error = %err, "run_failed");
        return ExitCode::FAILURE;
    }

    info!("game_exited");
    ExitCode::SUCCESS
}
