use std::io::BufReader;
use std::net::TcpStream;
use std::time::Duration;

use ledger_base::{err, Result};
use ledger_wire::{recv_message, send_message, Message};
use tracing::info;

/// Send a single TRANSFER to the coordinator and return whether it
/// committed. This is the entire client: one connection, one request,
/// one reply, no retry and no session state.
pub fn transfer(
    coord_host: &str,
    coord_port: u16,
    from_node: &str,
    from_account: &str,
    to_node: &str,
    to_account: &str,
    amount: i64,
    timeout: Duration,
) -> Result<bool> {
    let mut stream = TcpStream::connect((coord_host, coord_port))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    send_message(
        &mut stream,
        &Message::Transfer {
            from_node: from_node.to_string(),
            from_account: from_account.to_string(),
            to_node: to_node.to_string(),
            to_account: to_account.to_string(),
            amount,
        },
    )?;

    match recv_message(BufReader::new(stream))? {
        Message::TransferResult { success } => {
            info!(target: "client", success, "transfer result");
            Ok(success)
        }
        Message::Error { error } => Err(err(format!("coordinator reported an error: {error}"))),
        other => Err(err(format!("unexpected reply type {}", other.kind()))),
    }
}
