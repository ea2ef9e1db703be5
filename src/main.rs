// src/main.rs

use std::process::ExitCode;

use stubrunner::{cli, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("stubrunner: {err:#}");
        return ExitCode::FAILURE;
    }

    match stubrunner::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("stubrunner error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
