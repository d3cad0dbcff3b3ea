// PassGuard — Application Entry Point
//
// Parses CLI arguments, initializes structured logging (with a filter that
// never emits secret values), and dispatches to the command handler.
// Uses the tokio async runtime for the UDS gateway.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use passguard::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=passguard=debug for verbose output; the default `info`
    // level never includes secret values.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("passguard=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
