//! tasksmith - local developer-workflow orchestrator
//!
//! Tracks a task graph, discovers work by inspecting source artifacts, and
//! hands ready tasks to an external code generator one role at a time.

use clap::Parser;
use tasksmith::cli::Cli;
use tasksmith::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose falls back to debug for this crate.
    // Ignore invalid/huge filters.
    let default_filter = if cli.verbose { "tasksmith=debug" } else { "off" };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
