use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ledger_coordinator::{parse_nodes, Coordinator, CrashPoint};
use tracing::error;

/// Transaction coordinator for the two-phase-commit account store.
#[derive(Parser, Debug)]
#[command(name = "ledger-coordinator")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind to.
    #[arg(long)]
    port: u16,

    /// Participants as `label:host:port,label:host:port,...`.
    #[arg(long)]
    nodes: String,

    /// Directory where the transaction log is stored.
    #[arg(long = "data-dir", default_value = "data")]
    data_dir: PathBuf,

    /// Milliseconds to wait before connecting to a participant.
    #[arg(long = "timeout-ms", default_value_t = 2000)]
    timeout_ms: u64,

    /// Terminate the process at this point in the 2PC round, for
    /// crash-recovery testing.
    #[arg(long = "crash-at", value_enum)]
    crash_at: Option<CrashPoint>,

    /// How long to sleep before exiting once `--crash-at` is hit.
    #[arg(long = "crash-delay-ms", default_value_t = 0)]
    crash_delay_ms: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    ledger_base::init_logging("coordinator");

    let nodes = match parse_nodes(&args.nodes) {
        Ok(n) => n,
        Err(e) => {
            error!(target: "coordinator", "failed to parse --nodes: {e}");
            return ExitCode::FAILURE;
        }
    };

    let coordinator = match Coordinator::open_with_crash_hook(
        nodes,
        &args.data_dir,
        Duration::from_millis(args.timeout_ms),
        args.crash_at,
        Duration::from_millis(args.crash_delay_ms),
    ) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!(target: "coordinator", "failed to open coordinator: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = ledger_coordinator::run(coordinator, &args.host, args.port) {
        error!(target: "coordinator", "server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
