use std::process::ExitCode;

use pulsecheck_lib::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match pulsecheck_lib::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{} ({})", e, e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
