use clap::Parser;
use org_map_explorer::{Settings, logging, run};
use std::process::ExitCode;

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("Failed to start the async runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
