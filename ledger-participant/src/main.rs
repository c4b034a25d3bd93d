use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ledger_participant::AccountStore;
use tracing::error;

/// Distributed account data node (participant) for one labeled shard of
/// accounts.
#[derive(Parser, Debug)]
#[command(name = "ledger-participant")]
struct Args {
    /// Logical node identifier, e.g. N1, N2, N3.
    #[arg(long = "node-id")]
    node_id: String,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind to.
    #[arg(long)]
    port: u16,

    /// Directory where node state/logs are stored.
    #[arg(long = "data-dir", default_value = "data")]
    data_dir: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    ledger_base::init_logging("participant");

    let store = match AccountStore::open(&args.node_id, &args.data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(target: "participant", "failed to open account store: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = ledger_participant::run(store, &args.host, args.port) {
        error!(target: "participant", "server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
