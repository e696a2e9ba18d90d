use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use criminalidad::{app, logging, AppState, Config, Server};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        warn!(?missing, "database credentials not set; every query will fail");
    }
    info!(
        database = %config.pg,
        frontend = %config.frontend_dir.display(),
        data = %config.data_dir.display(),
        "starting"
    );

    let state = Arc::new(AppState::from_config(&config));
    match Server::bind(config.bind_addr).serve(app::router(state)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
