use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ledger_base::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// An append-only JSON-lines file, fsynced after every append.
///
/// Both the coordinator's transaction log and each participant's
/// write-ahead log are one of these; only the entry type differs.
#[derive(Clone, Debug)]
pub struct JsonlLog {
    path: PathBuf,
}

impl JsonlLog {
    pub fn open(path: impl Into<PathBuf>) -> JsonlLog {
        JsonlLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and fsync before returning, so the entry is
    /// durable by the time the caller's next action (sending a wire
    /// message, releasing a lock) becomes observable.
    pub fn append<T: Serialize>(&self, entry: &T) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every well-formed entry in file order. Lines that fail to
    /// parse as `T` are logged and skipped rather than aborting the
    /// scan, the same tolerance the original Python recovery loop
    /// gives malformed or incomplete lines.
    pub fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(entry) => out.push(entry),
                Err(e) => warn!(target: "ledger", "skipping malformed log line: {e}"),
            }
        }
        Ok(out)
    }
}

/// Phase of a coordinator transaction-log entry. The coordinator's
/// log order for a single txid is always START -> PREPARE ->
/// (COMMIT|ABORT) -> COMPLETE.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, serde::Deserialize)]
pub enum Phase {
    #[serde(rename = "START")]
    Start,
    #[serde(rename = "PREPARE")]
    Prepare,
    #[serde(rename = "COMMIT")]
    Commit,
    #[serde(rename = "ABORT")]
    Abort,
    #[serde(rename = "COMPLETE")]
    Complete,
}

#[derive(Clone, Debug, Serialize, serde::Deserialize)]
pub struct CoordinatorLogEntry {
    pub txid: String,
    pub phase: Phase,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ops: Option<crate::grouping::NodeOps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CoordinatorLogEntry {
    pub fn new(
        txid: impl Into<String>,
        phase: Phase,
        node_ops: Option<crate::grouping::NodeOps>,
        status: Option<String>,
    ) -> CoordinatorLogEntry {
        CoordinatorLogEntry {
            txid: txid.into(),
            phase,
            timestamp: now_secs(),
            node_ops,
            status,
        }
    }
}

/// Action recorded in a participant's write-ahead log.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, serde::Deserialize)]
pub enum Action {
    #[serde(rename = "prepare_ok")]
    PrepareOk,
    #[serde(rename = "prepare_failed")]
    PrepareFailed,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "commit")]
    Commit,
    #[serde(rename = "commit_failed")]
    CommitFailed,
    #[serde(rename = "abort")]
    Abort,
}

#[derive(Clone, Debug, Default, Serialize, serde::Deserialize)]
pub struct ParticipantLogEntry {
    pub txid: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operations: Option<Vec<ledger_wire::Operation>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_balance: Option<i64>,
}

impl ParticipantLogEntry {
    pub fn prepare_ok(txid: impl Into<String>, operations: Vec<ledger_wire::Operation>) -> Self {
        ParticipantLogEntry {
            txid: txid.into(),
            action: Some(Action::PrepareOk),
            operations: Some(operations),
            ..Default::default()
        }
    }

    pub fn prepare_failed(txid: impl Into<String>, reason: impl Into<String>) -> Self {
        ParticipantLogEntry {
            txid: txid.into(),
            action: Some(Action::PrepareFailed),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn update(
        txid: impl Into<String>,
        account_id: impl Into<String>,
        delta: i64,
        old_balance: i64,
        new_balance: i64,
    ) -> Self {
        ParticipantLogEntry {
            txid: txid.into(),
            action: Some(Action::Update),
            account_id: Some(account_id.into()),
            delta: Some(delta),
            old_balance: Some(old_balance),
            new_balance: Some(new_balance),
            ..Default::default()
        }
    }

    pub fn commit(txid: impl Into<String>) -> Self {
        ParticipantLogEntry {
            txid: txid.into(),
            action: Some(Action::Commit),
            ..Default::default()
        }
    }

    pub fn commit_failed(txid: impl Into<String>) -> Self {
        ParticipantLogEntry {
            txid: txid.into(),
            action: Some(Action::CommitFailed),
            ..Default::default()
        }
    }

    pub fn abort(txid: impl Into<String>) -> Self {
        ParticipantLogEntry {
            txid: txid.into(),
            action: Some(Action::Abort),
            ..Default::default()
        }
    }
}
