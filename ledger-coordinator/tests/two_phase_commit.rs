use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ledger_coordinator::Coordinator;
use ledger_participant::AccountStore;
use ledger_txn::{CoordinatorLogEntry, JsonlLog, Phase};
use tempfile::tempdir;
use test_log::test;

fn spawn_participant(label: &str, port: u16, data_dir: &std::path::Path) -> Arc<AccountStore> {
    let store = Arc::new(AccountStore::open(label, data_dir).expect("open store"));
    let run_store = Arc::clone(&store);
    thread::spawn(move || {
        ledger_participant::run(run_store, "127.0.0.1", port).expect("participant server");
    });
    // Give the listener a moment to bind before the coordinator dials it.
    thread::sleep(Duration::from_millis(100));
    store
}

fn open_coordinator(nodes: BTreeMap<String, (String, u16)>, data_dir: &std::path::Path) -> Coordinator {
    Coordinator::open(nodes, data_dir, Duration::from_millis(500)).expect("open coordinator")
}

#[test]
fn happy_path_transfer_commits_on_both_nodes() {
    let n1_dir = tempdir().unwrap();
    let n2_dir = tempdir().unwrap();
    let coord_dir = tempdir().unwrap();

    let n1 = spawn_participant("N1", 17101, n1_dir.path());
    let n2 = spawn_participant("N2", 17102, n2_dir.path());
    n1.commit("seed", &[ledger_wire::Operation { account_id: "A".into(), delta: 100 }])
        .unwrap();
    n2.commit("seed", &[ledger_wire::Operation { account_id: "B".into(), delta: 0 }])
        .unwrap();

    let mut nodes = BTreeMap::new();
    nodes.insert("N1".to_string(), ("127.0.0.1".to_string(), 17101));
    nodes.insert("N2".to_string(), ("127.0.0.1".to_string(), 17102));
    let coordinator = open_coordinator(nodes, coord_dir.path());

    let success = coordinator.transfer("N1", "A", "N2", "B", 40).unwrap();
    assert!(success);
    assert_eq!(n1.read("A"), 60);
    assert_eq!(n2.read("B"), 40);
}

#[test]
fn insufficient_funds_aborts_and_leaves_balances_untouched() {
    let n1_dir = tempdir().unwrap();
    let n2_dir = tempdir().unwrap();
    let coord_dir = tempdir().unwrap();

    let n1 = spawn_participant("N1", 17111, n1_dir.path());
    let n2 = spawn_participant("N2", 17112, n2_dir.path());
    n1.commit("seed", &[ledger_wire::Operation { account_id: "A".into(), delta: 5 }])
        .unwrap();

    let mut nodes = BTreeMap::new();
    nodes.insert("N1".to_string(), ("127.0.0.1".to_string(), 17111));
    nodes.insert("N2".to_string(), ("127.0.0.1".to_string(), 17112));
    let coordinator = open_coordinator(nodes, coord_dir.path());

    let success = coordinator.transfer("N1", "A", "N2", "B", 50).unwrap();
    assert!(!success);
    assert_eq!(n1.read("A"), 5);
    assert_eq!(n2.read("B"), 0);
}

#[test]
fn unreachable_participant_at_prepare_votes_abort() {
    let n1_dir = tempdir().unwrap();
    let coord_dir = tempdir().unwrap();

    let n1 = spawn_participant("N1", 17121, n1_dir.path());
    n1.commit("seed", &[ledger_wire::Operation { account_id: "A".into(), delta: 100 }])
        .unwrap();

    let mut nodes = BTreeMap::new();
    nodes.insert("N1".to_string(), ("127.0.0.1".to_string(), 17121));
    // N2 is never started; the coordinator should time out dialing it and
    // treat the missing vote as abort, not hang or error.
    nodes.insert("N2".to_string(), ("127.0.0.1".to_string(), 17122));
    let coordinator = Coordinator::open(nodes, coord_dir.path(), Duration::from_millis(200)).unwrap();

    let success = coordinator.transfer("N1", "A", "N2", "B", 10).unwrap();
    assert!(!success);
    assert_eq!(n1.read("A"), 100);
}

#[test]
fn recovery_resends_commit_for_a_commit_decided_transaction() {
    let n1_dir = tempdir().unwrap();
    let coord_dir = tempdir().unwrap();

    let n1 = spawn_participant("N1", 17131, n1_dir.path());
    n1.commit("seed", &[ledger_wire::Operation { account_id: "A".into(), delta: 100 }])
        .unwrap();

    // Simulate a coordinator that crashed after logging COMMIT but
    // before it finished (or even started) sending phase-2 COMMITs.
    let log = JsonlLog::open(coord_dir.path().join("coordinator_tx_log.jsonl"));
    let mut node_ops = BTreeMap::new();
    node_ops.insert(
        "N1".to_string(),
        vec![ledger_wire::Operation { account_id: "A".into(), delta: -10 }],
    );
    log.append(&CoordinatorLogEntry::new("crash-commit-txid", Phase::Start, Some(node_ops.clone()), None))
        .unwrap();
    log.append(&CoordinatorLogEntry::new("crash-commit-txid", Phase::Prepare, Some(node_ops.clone()), None))
        .unwrap();
    log.append(&CoordinatorLogEntry::new(
        "crash-commit-txid",
        Phase::Commit,
        Some(node_ops),
        Some("all_voted_commit".into()),
    ))
    .unwrap();
    // No COMPLETE entry: recovery must treat this as unfinished.

    let mut nodes = BTreeMap::new();
    nodes.insert("N1".to_string(), ("127.0.0.1".to_string(), 17131));
    let _coordinator = open_coordinator(nodes, coord_dir.path());

    // Recovery ran during open(): the missed COMMIT should have reached N1.
    assert_eq!(n1.read("A"), 90);

    let entries: Vec<CoordinatorLogEntry> = log.read_all().unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.phase, Phase::Complete);
    assert_eq!(last.status.as_deref(), Some("committed_during_recovery"));
}

#[test]
fn recovery_aborts_a_transaction_left_undecided() {
    let n1_dir = tempdir().unwrap();
    let coord_dir = tempdir().unwrap();

    let n1 = spawn_participant("N1", 17141, n1_dir.path());
    n1.commit("seed", &[ledger_wire::Operation { account_id: "A".into(), delta: 100 }])
        .unwrap();

    // Simulate a coordinator that crashed after PREPARE but before any
    // commit/abort decision was logged.
    let log = JsonlLog::open(coord_dir.path().join("coordinator_tx_log.jsonl"));
    let mut node_ops = BTreeMap::new();
    node_ops.insert(
        "N1".to_string(),
        vec![ledger_wire::Operation { account_id: "A".into(), delta: -10 }],
    );
    log.append(&CoordinatorLogEntry::new("crash-undecided-txid", Phase::Start, Some(node_ops.clone()), None))
        .unwrap();
    log.append(&CoordinatorLogEntry::new("crash-undecided-txid", Phase::Prepare, Some(node_ops), None))
        .unwrap();
    // No COMMIT, no ABORT, no COMPLETE.

    let mut nodes = BTreeMap::new();
    nodes.insert("N1".to_string(), ("127.0.0.1".to_string(), 17141));
    let _coordinator = open_coordinator(nodes, coord_dir.path());

    // The transaction never committed at N1, so the seeded balance stands.
    assert_eq!(n1.read("A"), 100);

    let entries: Vec<CoordinatorLogEntry> = log.read_all().unwrap();
    let phases: Vec<Phase> = entries.iter().map(|e| e.phase).collect();
    assert!(phases.contains(&Phase::Abort));
    assert_eq!(*phases.last().unwrap(), Phase::Complete);
}
