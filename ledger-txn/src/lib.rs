mod grouping;
mod log;
mod txid;

pub use grouping::{group_operations, NodeOps};
pub use log::{Action, CoordinatorLogEntry, JsonlLog, ParticipantLogEntry, Phase};
pub use txid::Txid;
