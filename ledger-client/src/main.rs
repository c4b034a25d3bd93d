use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;

/// One-shot TRANSFER client. Exits 0 whether the transfer committed or
/// aborted; a nonzero exit means the request itself could not be made.
#[derive(Parser, Debug)]
#[command(name = "ledger-client")]
struct Args {
    #[arg(long = "coord-host", default_value = "127.0.0.1")]
    coord_host: String,

    #[arg(long = "coord-port")]
    coord_port: u16,

    #[arg(long = "from-node")]
    from_node: String,

    #[arg(long = "from-account")]
    from_account: String,

    #[arg(long = "to-node")]
    to_node: String,

    #[arg(long = "to-account")]
    to_account: String,

    #[arg(long)]
    amount: i64,

    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    ledger_base::init_logging("client");

    let result = ledger_client::transfer(
        &args.coord_host,
        args.coord_port,
        &args.from_node,
        &args.from_account,
        &args.to_node,
        &args.to_account,
        args.amount,
        Duration::from_millis(args.timeout_ms),
    );

    match result {
        Ok(success) => {
            println!("{{\"success\": {success}}}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(target: "client", "transfer request failed: {e}");
            ExitCode::FAILURE
        }
    }
}
