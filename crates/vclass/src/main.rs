//! vclass CLI - read-side queries of the virtual classroom
//!
//! Binary name: `vclass`

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::process;

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the JSON response only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();

    if let Err(err) = cli::run(args).await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {err:#}");
        }
        #[allow(clippy::exit)]
        process::exit(cli::exit_code(&err));
    }
}
