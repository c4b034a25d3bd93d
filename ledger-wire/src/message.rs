use serde::{Deserialize, Serialize};

/// A signed balance change to a single account, carried inside a
/// PREPARE or COMMIT payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub account_id: String,
    pub delta: i64,
}

/// The outcome a participant reports for a phase-2 request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AckStatus {
    #[serde(rename = "COMMITTED")]
    Committed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "ABORTED")]
    Aborted,
}

/// Every message exchanged between client, coordinator, and participants.
///
/// Serializes as a single JSON object tagged by `type`, matching the
/// wire table in the system's external interfaces: `{"type": "PREPARE",
/// "txid": "...", "operations": [...]}` and so on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "TRANSFER")]
    Transfer {
        from_node: String,
        from_account: String,
        to_node: String,
        to_account: String,
        amount: i64,
    },
    #[serde(rename = "TRANSFER_RESULT")]
    TransferResult { success: bool },
    #[serde(rename = "PREPARE")]
    Prepare {
        txid: String,
        operations: Vec<Operation>,
    },
    #[serde(rename = "VOTE_COMMIT")]
    VoteCommit { txid: String },
    #[serde(rename = "VOTE_ABORT")]
    VoteAbort { txid: String },
    #[serde(rename = "COMMIT")]
    Commit {
        txid: String,
        operations: Vec<Operation>,
    },
    #[serde(rename = "ABORT")]
    Abort { txid: String },
    #[serde(rename = "ACK")]
    Ack { txid: String, status: AckStatus },
    #[serde(rename = "READ")]
    Read { account_id: String },
    #[serde(rename = "READ_RESULT")]
    ReadResult { account_id: String, balance: i64 },
    #[serde(rename = "ERROR")]
    Error { error: String },
}

impl Message {
    pub fn error(msg: impl Into<String>) -> Message {
        Message::Error { error: msg.into() }
    }

    /// The `type` discriminant, mostly useful for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Transfer { .. } => "TRANSFER",
            Message::TransferResult { .. } => "TRANSFER_RESULT",
            Message::Prepare { .. } => "PREPARE",
            Message::VoteCommit { .. } => "VOTE_COMMIT",
            Message::VoteAbort { .. } => "VOTE_ABORT",
            Message::Commit { .. } => "COMMIT",
            Message::Abort { .. } => "ABORT",
            Message::Ack { .. } => "ACK",
            Message::Read { .. } => "READ",
            Message::ReadResult { .. } => "READ_RESULT",
            Message::Error { .. } => "ERROR",
        }
    }
}
