use clap::Parser;
use tracing_subscriber::EnvFilter;

use arm_plotter::runtime::{self, Args};

fn main() {
    // Setup logging (set RUST_LOG=info or debug). Logs go to stderr; stdout carries replies.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = runtime::run(args) {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
