//! Generator binary: parse arguments, run one generation pass, exit.

use std::process::ExitCode;

use clap::Parser;

use rxgrpc::cli::{self, Cli};
use rxgrpc::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_telemetry();

    let args = Cli::parse();
    match cli::run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
