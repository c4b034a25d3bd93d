mod config;
mod coordinator;
mod net;
mod server;

pub use config::{parse_nodes, CrashPoint, NodeMap};
pub use coordinator::Coordinator;
pub use net::PHASE2_RETRIES;
pub use server::run;
