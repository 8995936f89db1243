//! Audio Vault CLI entry point

use std::process::ExitCode;

use clap::Parser;

use audio_vault::cli::{init_logging, run, Cli};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    run(cli).await
}
