use std::process::ExitCode;

use clap::Parser;
use solvo::cli::{exit_code, Cli};
use solvo::logging::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(LoggingConfig::from_env(cli.verbose));

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}
