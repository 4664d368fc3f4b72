//! Bokchoi CLI - Run scripts and notebooks on spot instances

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bokchoi_cli::cli::Cli;
use bokchoi_cli::output::json;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = cli.json;
    if let Err(e) = cli.run().await {
        match json::format_error(&format!("{e:#}")) {
            Ok(doc) if json => println!("{doc}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the `-v` level.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
