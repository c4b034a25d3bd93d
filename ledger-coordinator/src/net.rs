use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use ledger_base::{err, Result};
use ledger_wire::{recv_message, send_message, Message, Operation};
use tracing::warn;

/// Bounded number of phase-2 retries before the coordinator gives up on
/// an unresponsive participant and completes the transaction anyway
/// (spec.md §9's recommended resolution to the outstanding-acks open
/// question).
pub const PHASE2_RETRIES: u32 = 3;

fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| err(format!("could not resolve {host}:{port}")))?;
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}

/// Send PREPARE to one participant and interpret the reply as a vote.
/// Any transport failure (timeout, refused, malformed reply) counts as
/// a NO vote, never propagates as an error to the caller.
pub fn prepare_on_node(host: &str, port: u16, timeout: Duration, txid: &str, operations: &[Operation]) -> bool {
    match try_prepare(host, port, timeout, txid, operations) {
        Ok(vote) => vote,
        Err(e) => {
            warn!(target: "coordinator", %host, port, "PREPARE failed: {e}");
            false
        }
    }
}

fn try_prepare(host: &str, port: u16, timeout: Duration, txid: &str, operations: &[Operation]) -> Result<bool> {
    let mut stream = connect(host, port, timeout)?;
    send_message(
        &mut stream,
        &Message::Prepare {
            txid: txid.to_string(),
            operations: operations.to_vec(),
        },
    )?;
    let reply = recv_message(BufReader::new(stream))?;
    Ok(matches!(reply, Message::VoteCommit { .. }))
}

/// Send COMMIT to one participant, retrying a bounded number of times.
/// Failure after all retries is logged and otherwise ignored: the
/// outcome was already decided durably before phase 2 began.
pub fn commit_on_node(host: &str, port: u16, timeout: Duration, txid: &str, operations: &[Operation]) {
    for attempt in 1..=PHASE2_RETRIES {
        match try_commit(host, port, timeout, txid, operations) {
            Ok(()) => return,
            Err(e) => warn!(target: "coordinator", %host, port, attempt, "COMMIT failed: {e}"),
        }
    }
    warn!(target: "coordinator", %host, port, %txid, "giving up on COMMIT after {PHASE2_RETRIES} attempts");
}

fn try_commit(host: &str, port: u16, timeout: Duration, txid: &str, operations: &[Operation]) -> Result<()> {
    let mut stream = connect(host, port, timeout)?;
    send_message(
        &mut stream,
        &Message::Commit {
            txid: txid.to_string(),
            operations: operations.to_vec(),
        },
    )?;
    recv_message(BufReader::new(stream))?;
    Ok(())
}

/// Send ABORT to one participant, retrying a bounded number of times.
/// Participants treat ABORT for an unknown or already-forgotten txid
/// as a no-op, so this is safe to send during recovery even if the
/// participant never saw a PREPARE for this txid.
pub fn abort_on_node(host: &str, port: u16, timeout: Duration, txid: &str) {
    for attempt in 1..=PHASE2_RETRIES {
        match try_abort(host, port, timeout, txid) {
            Ok(()) => return,
            Err(e) => warn!(target: "coordinator", %host, port, attempt, "ABORT failed: {e}"),
        }
    }
    warn!(target: "coordinator", %host, port, %txid, "giving up on ABORT after {PHASE2_RETRIES} attempts");
}

fn try_abort(host: &str, port: u16, timeout: Duration, txid: &str) -> Result<()> {
    let mut stream = connect(host, port, timeout)?;
    send_message(
        &mut stream,
        &Message::Abort {
            txid: txid.to_string(),
        },
    )?;
    recv_message(BufReader::new(stream))?;
    Ok(())
}
