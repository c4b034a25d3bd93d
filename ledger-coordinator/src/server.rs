use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use ledger_base::Result;
use ledger_wire::{recv_message, send_message, Message};
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;

pub fn run(coordinator: Arc<Coordinator>, host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port))?;
    info!(target: "coordinator", %host, %port, "listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "coordinator", "failed to accept connection: {e}");
                continue;
            }
        };
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            if let Err(e) = handle_connection(stream, &coordinator) {
                warn!(target: "coordinator", "connection error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, coordinator: &Coordinator) -> Result<()> {
    let peer = stream.peer_addr().ok();
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    let message = match recv_message(reader) {
        Ok(m) => m,
        Err(e) => {
            warn!(target: "coordinator", ?peer, "dropping connection: {e}");
            return Ok(());
        }
    };

    let reply = dispatch(coordinator, message);
    send_message(&mut writer, &reply)
}

fn dispatch(coordinator: &Coordinator, message: Message) -> Message {
    match message {
        Message::Transfer {
            from_node,
            from_account,
            to_node,
            to_account,
            amount,
        } => match coordinator.transfer(&from_node, &from_account, &to_node, &to_account, amount) {
            Ok(success) => Message::TransferResult { success },
            Err(e) => {
                error!(target: "coordinator", "transfer failed: {e}");
                Message::error(format!("{e}"))
            }
        },
        other => {
            error!(target: "coordinator", kind = other.kind(), "unexpected message type");
            Message::error(format!("unexpected message type {}", other.kind()))
        }
    }
}
