//! mcp-bridge CLI entry point.

use clap::Parser;
use clap::error::ErrorKind;

use mcp_bridge::bridge::run_bridge;
use mcp_bridge::cli::Cli;

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            // Help and version included: stdout carries JSON-RPC only.
            eprint!("{}", e.render());
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    let config = match cli.into_connection_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let code = match run_bridge(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "bridge failed");
            eprintln!("mcp-bridge: {e}");
            1
        }
    };

    std::process::exit(code);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracing Init
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise tracing subscriber with stderr output.
///
/// When `verbose` is true, sets filter to `debug`. Otherwise, respects
/// `RUST_LOG`, defaulting to `info`. Stdout carries protocol traffic only.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
