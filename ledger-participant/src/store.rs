use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ledger_base::Result;
use ledger_txn::{Action, JsonlLog, ParticipantLogEntry};
use ledger_wire::{AckStatus, Operation};
use tracing::{info, warn};

/// In-memory balance map, per-account locks, and write-ahead log for the
/// accounts owned by one participant node.
///
/// Locks are released at the end of PREPARE; the participant does not
/// hold a lock between PREPARE and COMMIT. Correctness instead relies
/// on the coordinator serializing transactions and on COMMIT re-running
/// the same non-negativity check PREPARE used.
pub struct AccountStore {
    node_label: String,
    state_path: PathBuf,
    log: JsonlLog,
    accounts: Mutex<HashMap<String, i64>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// txid -> terminal outcome, derived from the log at startup and
    /// kept current thereafter, so a repeated COMMIT or ABORT for a
    /// txid that already reached a terminal state is acknowledged
    /// without re-applying or re-logging anything.
    completed: Mutex<HashMap<String, AckStatus>>,
}

impl AccountStore {
    pub fn open(node_label: impl Into<String>, data_dir: &std::path::Path) -> Result<AccountStore> {
        fs::create_dir_all(data_dir)?;
        let node_label = node_label.into();
        let state_path = data_dir.join(format!("node_{node_label}_state.json"));
        let log = JsonlLog::open(data_dir.join(format!("node_{node_label}_log.jsonl")));

        let accounts = load_state(&state_path)?;
        let completed = replay_completed(&log)?;

        info!(
            target: "participant",
            node = %node_label,
            accounts = accounts.len(),
            completed = completed.len(),
            "account store opened"
        );

        Ok(AccountStore {
            node_label,
            state_path,
            log,
            accounts: Mutex::new(accounts),
            locks: Mutex::new(HashMap::new()),
            completed: Mutex::new(completed),
        })
    }

    pub fn node_label(&self) -> &str {
        &self.node_label
    }

    fn account_lock(&self, account_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn balance_of(&self, account_id: &str) -> i64 {
        *self
            .accounts
            .lock()
            .expect("accounts map poisoned")
            .get(account_id)
            .unwrap_or(&0)
    }

    fn persist(&self) -> Result<()> {
        let accounts = self.accounts.lock().expect("accounts map poisoned").clone();
        let tmp_path = self.state_path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(&accounts)?;
        fs::write(&tmp_path, body)?;
        {
            let f = fs::File::open(&tmp_path)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &self.state_path)?;
        Ok(())
    }

    pub fn read(&self, account_id: &str) -> i64 {
        // Intentionally lock-free with respect to the per-account locks:
        // a READ may observe a stale or mid-transaction value.
        self.balance_of(account_id)
    }

    fn completed_status(&self, txid: &str) -> Option<AckStatus> {
        self.completed.lock().expect("completed map poisoned").get(txid).copied()
    }

    fn mark_completed(&self, txid: &str, status: AckStatus) {
        self.completed
            .lock()
            .expect("completed map poisoned")
            .insert(txid.to_string(), status);
    }

    /// Returns `true` (VOTE_COMMIT) or `false` (VOTE_ABORT).
    pub fn prepare(&self, txid: &str, operations: &[Operation]) -> Result<bool> {
        let mut account_ids: Vec<String> = operations.iter().map(|op| op.account_id.clone()).collect();
        account_ids.sort_unstable();
        account_ids.dedup();

        let locks: Vec<Arc<Mutex<()>>> = account_ids.iter().map(|acc| self.account_lock(acc)).collect();
        let mut acquired: Vec<std::sync::MutexGuard<'_, ()>> = Vec::new();

        for (acc, lock) in account_ids.iter().zip(locks.iter()) {
            match lock.try_lock() {
                Ok(guard) => acquired.push(guard),
                Err(_) => {
                    drop(acquired);
                    self.log.append(&ParticipantLogEntry::prepare_failed(
                        txid,
                        format!("lock_contention_on_{acc}"),
                    ))?;
                    warn!(target: "participant", %txid, account = %acc, "lock contention, voting abort");
                    return Ok(false);
                }
            }
        }

        let mut shadow: HashMap<&str, i64> = HashMap::new();
        for acc in &account_ids {
            shadow.insert(acc.as_str(), self.balance_of(acc));
        }
        for op in operations {
            let bal = shadow.entry(op.account_id.as_str()).or_insert(0);
            *bal += op.delta;
            if *bal < 0 {
                drop(acquired);
                self.log
                    .append(&ParticipantLogEntry::prepare_failed(txid, "insufficient_balance"))?;
                info!(target: "participant", %txid, "insufficient balance, voting abort");
                return Ok(false);
            }
        }

        self.log
            .append(&ParticipantLogEntry::prepare_ok(txid, operations.to_vec()))?;
        info!(target: "participant", %txid, "prepare ok, voting commit");
        Ok(true)
    }

    /// Returns the status to ACK with.
    pub fn commit(&self, txid: &str, operations: &[Operation]) -> Result<AckStatus> {
        if let Some(status @ AckStatus::Committed) = self.completed_status(txid) {
            info!(target: "participant", %txid, "commit already applied, replaying ack");
            return Ok(status);
        }

        for op in operations {
            let lock = self.account_lock(&op.account_id);
            let _guard = lock.lock().expect("account lock poisoned");
            let old_balance = self.balance_of(&op.account_id);
            let new_balance = old_balance + op.delta;
            if new_balance < 0 {
                self.log.append(&ParticipantLogEntry::commit_failed(txid))?;
                warn!(target: "participant", %txid, account = %op.account_id, "commit failed, non-negativity re-check tripped");
                return Ok(AckStatus::Failed);
            }
            self.log.append(&ParticipantLogEntry::update(
                txid,
                &op.account_id,
                op.delta,
                old_balance,
                new_balance,
            ))?;
            self.accounts
                .lock()
                .expect("accounts map poisoned")
                .insert(op.account_id.clone(), new_balance);
            self.persist()?;
        }

        self.log.append(&ParticipantLogEntry::commit(txid))?;
        self.mark_completed(txid, AckStatus::Committed);
        info!(target: "participant", %txid, "committed");
        Ok(AckStatus::Committed)
    }

    pub fn abort(&self, txid: &str) -> Result<()> {
        if matches!(self.completed_status(txid), Some(AckStatus::Aborted)) {
            info!(target: "participant", %txid, "abort already recorded, no-op");
            return Ok(());
        }
        self.log.append(&ParticipantLogEntry::abort(txid))?;
        self.mark_completed(txid, AckStatus::Aborted);
        info!(target: "participant", %txid, "aborted");
        Ok(())
    }
}

fn load_state(path: &std::path::Path) -> Result<HashMap<String, i64>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let body = fs::read_to_string(path)?;
    let accounts = serde_json::from_str(&body)?;
    Ok(accounts)
}

fn replay_completed(log: &JsonlLog) -> Result<HashMap<String, AckStatus>> {
    let entries: Vec<ParticipantLogEntry> = log.read_all()?;
    let mut completed = HashMap::new();
    for entry in entries {
        match entry.action {
            Some(Action::Commit) => {
                completed.insert(entry.txid, AckStatus::Committed);
            }
            Some(Action::Abort) => {
                completed.insert(entry.txid, AckStatus::Aborted);
            }
            _ => {}
        }
    }
    Ok(completed)
}
