use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use ledger_base::{err, Result};
use ledger_txn::{group_operations, CoordinatorLogEntry, JsonlLog, NodeOps, Phase, Txid};
use tracing::{info, warn};

use crate::config::{CrashPoint, NodeMap};
use crate::net::{abort_on_node, commit_on_node, prepare_on_node};

pub struct Coordinator {
    nodes: NodeMap,
    timeout: Duration,
    log: JsonlLog,
    /// Held for the entire duration of a 2PC round: transactions are
    /// serialized one at a time so the log order is a total order.
    round_lock: Mutex<()>,
    /// Failure-injection hook used by crash-recovery tests; `None` in
    /// normal operation.
    crash_at: Option<CrashPoint>,
    crash_delay: Duration,
}

struct InFlight {
    node_ops: Option<NodeOps>,
    commit_decided: bool,
}

impl Coordinator {
    /// Opens (or creates) the transaction log, runs startup recovery
    /// over any entries left from a previous run, and returns a
    /// coordinator ready to accept new TRANSFERs.
    pub fn open(nodes: NodeMap, data_dir: &std::path::Path, timeout: Duration) -> Result<Coordinator> {
        Coordinator::open_with_crash_hook(nodes, data_dir, timeout, None, Duration::from_millis(0))
    }

    /// Like [`Coordinator::open`], but with the failure-injection hooks
    /// from spec.md §6 wired in: at `crash_at`, sleep `crash_delay` and
    /// then terminate the process. Used to drive crash-recovery tests.
    pub fn open_with_crash_hook(
        nodes: NodeMap,
        data_dir: &std::path::Path,
        timeout: Duration,
        crash_at: Option<CrashPoint>,
        crash_delay: Duration,
    ) -> Result<Coordinator> {
        std::fs::create_dir_all(data_dir)?;
        let log = JsonlLog::open(data_dir.join("coordinator_tx_log.jsonl"));
        let coordinator = Coordinator {
            nodes,
            timeout,
            log,
            round_lock: Mutex::new(()),
            crash_at,
            crash_delay,
        };
        coordinator.recover()?;
        Ok(coordinator)
    }

    fn maybe_crash(&self, point: CrashPoint) {
        if self.crash_at == Some(point) {
            warn!(target: "coordinator", ?point, "failure injection: terminating process");
            std::thread::sleep(self.crash_delay);
            std::process::exit(1);
        }
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// Replay the log, find transactions left in flight by a prior
    /// crash, and resolve each one to a terminal state before accepting
    /// new work.
    fn recover(&self) -> Result<()> {
        let entries: Vec<CoordinatorLogEntry> = self.log.read_all()?;
        let mut in_flight: HashMap<String, InFlight> = HashMap::new();

        for entry in entries {
            match entry.phase {
                Phase::Start | Phase::Prepare => {
                    let state = in_flight.entry(entry.txid).or_insert(InFlight {
                        node_ops: None,
                        commit_decided: false,
                    });
                    if entry.node_ops.is_some() {
                        state.node_ops = entry.node_ops;
                    }
                }
                Phase::Commit => {
                    let state = in_flight.entry(entry.txid).or_insert(InFlight {
                        node_ops: None,
                        commit_decided: false,
                    });
                    state.commit_decided = true;
                    if entry.node_ops.is_some() {
                        state.node_ops = entry.node_ops;
                    }
                }
                Phase::Abort | Phase::Complete => {
                    in_flight.remove(&entry.txid);
                }
            }
        }

        if in_flight.is_empty() {
            info!(target: "coordinator", "no incomplete transactions found, system is consistent");
            return Ok(());
        }
        warn!(target: "coordinator", count = in_flight.len(), "found incomplete transactions from a previous run, resolving them");

        let mut txids: Vec<String> = in_flight.keys().cloned().collect();
        txids.sort();
        for txid in txids {
            let state = in_flight.remove(&txid).expect("just listed this key");
            let node_ops = state.node_ops.unwrap_or_default();
            if state.commit_decided {
                info!(target: "coordinator", %txid, "recovering commit-decided transaction");
                for (label, ops) in &node_ops {
                    if let Some((host, port)) = self.nodes.get(label) {
                        commit_on_node(host, *port, self.timeout, &txid, ops);
                    }
                }
                self.log.append(&CoordinatorLogEntry::new(
                    &txid,
                    Phase::Complete,
                    None,
                    Some("committed_during_recovery".into()),
                ))?;
            } else {
                info!(target: "coordinator", %txid, "recovering undecided transaction as abort");
                for (label, _ops) in &node_ops {
                    if let Some((host, port)) = self.nodes.get(label) {
                        abort_on_node(host, *port, self.timeout, &txid);
                    }
                }
                self.log.append(&CoordinatorLogEntry::new(
                    &txid,
                    Phase::Abort,
                    None,
                    Some("recovered".into()),
                ))?;
                self.log.append(&CoordinatorLogEntry::new(
                    &txid,
                    Phase::Complete,
                    None,
                    Some("aborted_during_recovery".into()),
                ))?;
            }
        }
        Ok(())
    }

    /// Run one TRANSFER to completion and report whether it committed.
    pub fn transfer(
        &self,
        from_node: &str,
        from_account: &str,
        to_node: &str,
        to_account: &str,
        amount: i64,
    ) -> Result<bool> {
        if amount <= 0 {
            return Err(err("amount must be a positive integer"));
        }
        if !self.nodes.contains_key(from_node) {
            return Err(err(format!("unknown node {from_node:?}")));
        }
        if !self.nodes.contains_key(to_node) {
            return Err(err(format!("unknown node {to_node:?}")));
        }

        let txid = Txid::generate();
        let node_ops = group_operations(from_node, from_account, to_node, to_account, amount);

        info!(
            target: "coordinator", %txid, from_node, from_account, to_node, to_account, amount,
            "starting transaction"
        );
        self.log
            .append(&CoordinatorLogEntry::new(txid.as_str(), Phase::Start, Some(node_ops.clone()), None))?;

        // Transactions are serialized one at a time through this lock,
        // held for the full two-phase round.
        let _guard = self.round_lock.lock().expect("round lock poisoned");

        self.log
            .append(&CoordinatorLogEntry::new(txid.as_str(), Phase::Prepare, Some(node_ops.clone()), None))?;
        self.maybe_crash(CrashPoint::Prepare);

        let mut all_yes = true;
        for (label, ops) in &node_ops {
            let Some((host, port)) = self.nodes.get(label) else {
                all_yes = false;
                continue;
            };
            let vote = prepare_on_node(host, *port, self.timeout, txid.as_str(), ops);
            info!(target: "coordinator", %txid, node = %label, vote, "received vote");
            if !vote {
                all_yes = false;
            }
        }

        if all_yes {
            info!(target: "coordinator", %txid, "all nodes voted commit, committing");
            self.log.append(&CoordinatorLogEntry::new(
                txid.as_str(),
                Phase::Commit,
                Some(node_ops.clone()),
                Some("all_voted_commit".into()),
            ))?;
            self.maybe_crash(CrashPoint::BeforeCommit);
            for (label, ops) in &node_ops {
                if let Some((host, port)) = self.nodes.get(label) {
                    commit_on_node(host, *port, self.timeout, txid.as_str(), ops);
                }
            }
            self.maybe_crash(CrashPoint::AfterCommit);
            self.log.append(&CoordinatorLogEntry::new(
                txid.as_str(),
                Phase::Complete,
                None,
                Some("committed".into()),
            ))?;
            Ok(true)
        } else {
            info!(target: "coordinator", %txid, "at least one node voted abort, aborting");
            self.log.append(&CoordinatorLogEntry::new(
                txid.as_str(),
                Phase::Abort,
                Some(node_ops.clone()),
                Some("vote_abort".into()),
            ))?;
            for (label, _ops) in &node_ops {
                if let Some((host, port)) = self.nodes.get(label) {
                    abort_on_node(host, *port, self.timeout, txid.as_str());
                }
            }
            self.log.append(&CoordinatorLogEntry::new(
                txid.as_str(),
                Phase::Complete,
                None,
                Some("aborted".into()),
            ))?;
            Ok(false)
        }
    }
}
