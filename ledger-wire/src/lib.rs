mod framing;
mod message;

pub use framing::{recv_message, send_message};
pub use message::{AckStatus, Message, Operation};
