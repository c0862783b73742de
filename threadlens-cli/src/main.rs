use clap::Parser;

use threadlens_core::error::{ErrorKind, StructuredError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "threadlens",
    version,
    about = "Analytical queries over a scraped forum-post dataset"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Map a failure onto a stable exit code.
///
/// Exit codes:
///   0 — success
///   1 — general/unknown error
///   2 — configuration error
///   3 — dataset load error (malformed or unreadable input)
///   4 — database error (open, handle closed, corruption)
///   5 — query error
///   6 — transaction error
///   7 — permission error
///   8 — resource error (memory, timeout)
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    if let Some(structured) = err.downcast_ref::<StructuredError>() {
        return match structured.kind {
            ErrorKind::Loading => 3,
            ErrorKind::Initialization | ErrorKind::Connection | ErrorKind::Corruption => 4,
            ErrorKind::Query => 5,
            ErrorKind::Transaction => 6,
            ErrorKind::Permission => 7,
            ErrorKind::Memory | ErrorKind::Timeout => 8,
            ErrorKind::Unknown => 1,
        };
    }
    if format!("{err:#}").to_lowercase().contains("config") {
        2
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            // Structured errors carry a user-facing summary alongside the
            // raw message.
            if let Some(structured) = e.downcast_ref::<StructuredError>() {
                eprintln!("Error: {}", structured.user_message);
                eprintln!("  detail: {structured}");
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(classify_exit_code(&e));
        }
    }
}
