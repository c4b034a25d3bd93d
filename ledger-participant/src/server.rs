use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use ledger_base::Result;
use ledger_wire::{recv_message, send_message, AckStatus, Message};
use tracing::{error, info, warn};

use crate::store::AccountStore;

pub fn run(store: Arc<AccountStore>, host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port))?;
    info!(target: "participant", node = store.node_label(), %host, %port, "listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "participant", "failed to accept connection: {e}");
                continue;
            }
        };
        let store = Arc::clone(&store);
        thread::spawn(move || {
            if let Err(e) = handle_connection(stream, &store) {
                warn!(target: "participant", "connection error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, store: &AccountStore) -> Result<()> {
    let peer = stream.peer_addr().ok();
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    let message = match recv_message(reader) {
        Ok(m) => m,
        Err(e) => {
            warn!(target: "participant", ?peer, "dropping connection: {e}");
            return Ok(());
        }
    };

    let reply = dispatch(store, message)?;
    send_message(&mut writer, &reply)
}

fn dispatch(store: &AccountStore, message: Message) -> Result<Message> {
    match message {
        Message::Prepare { txid, operations } => {
            let vote = store.prepare(&txid, &operations)?;
            Ok(if vote {
                Message::VoteCommit { txid }
            } else {
                Message::VoteAbort { txid }
            })
        }
        Message::Commit { txid, operations } => {
            let status = store.commit(&txid, &operations)?;
            Ok(Message::Ack { txid, status })
        }
        Message::Abort { txid } => {
            store.abort(&txid)?;
            Ok(Message::Ack {
                txid,
                status: AckStatus::Aborted,
            })
        }
        Message::Read { account_id } => {
            let balance = store.read(&account_id);
            Ok(Message::ReadResult { account_id, balance })
        }
        other => {
            error!(target: "participant", kind = other.kind(), "unexpected message type");
            Ok(Message::error(format!("unexpected message type {}", other.kind())))
        }
    }
}
