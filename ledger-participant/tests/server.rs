use std::io::BufReader;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ledger_participant::AccountStore;
use ledger_wire::{recv_message, send_message, AckStatus, Message, Operation};
use tempfile::tempdir;
use test_log::test;

fn spawn(label: &str, port: u16, data_dir: &std::path::Path) -> Arc<AccountStore> {
    let store = Arc::new(AccountStore::open(label, data_dir).unwrap());
    let run_store = Arc::clone(&store);
    thread::spawn(move || ledger_participant::run(run_store, "127.0.0.1", port).unwrap());
    thread::sleep(Duration::from_millis(100));
    store
}

fn roundtrip(port: u16, msg: &Message) -> Message {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    send_message(&mut stream, msg).unwrap();
    recv_message(BufReader::new(stream)).unwrap()
}

#[test]
fn prepare_commit_read_over_the_wire() {
    let dir = tempdir().unwrap();
    let store = spawn("N1", 17301, dir.path());
    store.commit("seed", &[Operation { account_id: "A".into(), delta: 100 }]).unwrap();

    let vote = roundtrip(
        17301,
        &Message::Prepare {
            txid: "t1".into(),
            operations: vec![Operation { account_id: "A".into(), delta: -30 }],
        },
    );
    assert_eq!(vote, Message::VoteCommit { txid: "t1".into() });

    let ack = roundtrip(
        17301,
        &Message::Commit {
            txid: "t1".into(),
            operations: vec![Operation { account_id: "A".into(), delta: -30 }],
        },
    );
    assert_eq!(
        ack,
        Message::Ack {
            txid: "t1".into(),
            status: AckStatus::Committed,
        }
    );

    let read = roundtrip(17301, &Message::Read { account_id: "A".into() });
    assert_eq!(
        read,
        Message::ReadResult {
            account_id: "A".into(),
            balance: 70,
        }
    );
}

#[test]
fn abort_over_the_wire_is_acknowledged() {
    let dir = tempdir().unwrap();
    let _store = spawn("N1", 17302, dir.path());

    let ack = roundtrip(17302, &Message::Abort { txid: "never-seen".into() });
    assert_eq!(
        ack,
        Message::Ack {
            txid: "never-seen".into(),
            status: AckStatus::Aborted,
        }
    );
}

#[test]
fn prepare_votes_abort_over_the_wire_on_insufficient_balance() {
    let dir = tempdir().unwrap();
    let store = spawn("N1", 17303, dir.path());
    store.commit("seed", &[Operation { account_id: "A".into(), delta: 5 }]).unwrap();

    let vote = roundtrip(
        17303,
        &Message::Prepare {
            txid: "t1".into(),
            operations: vec![Operation { account_id: "A".into(), delta: -50 }],
        },
    );
    assert_eq!(vote, Message::VoteAbort { txid: "t1".into() });
}
