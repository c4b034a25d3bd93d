// Each message is a single JSON object, UTF-8, terminated with a newline
// byte. The receiver reads until the first newline and parses the
// preceding bytes; any further bytes delivered in the same read are
// discarded by convention (one message per connection). Malformed JSON
// is reported as an `Error` result rather than propagated as a panic,
// so a caller can fold it into a NO vote / closed-connection outcome.

use std::io::{BufRead, Write};

use ledger_base::{err, Result};
use tracing::warn;

use crate::message::Message;

pub fn send_message<W: Write>(mut writer: W, msg: &Message) -> Result<()> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read a single newline-terminated JSON message.
///
/// Returns an error if the peer closes before sending any bytes, or if
/// the line received is not valid JSON / not a known message shape.
pub fn recv_message<R: BufRead>(mut reader: R) -> Result<Message> {
    let mut line = String::new();
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Err(err("connection closed before any message was received"));
    }
    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
    serde_json::from_str(trimmed).map_err(|e| {
        warn!(target: "ledger", "malformed message: {e}");
        err(format!("malformed message: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AckStatus, Operation};
    use std::io::{BufReader, Cursor};
    use test_log::test;

    #[test]
    fn round_trips_through_a_newline() {
        let msg = Message::Prepare {
            txid: "abc123".into(),
            operations: vec![Operation {
                account_id: "A".into(),
                delta: -10,
            }],
        };
        let mut buf = Vec::new();
        send_message(&mut buf, &msg).unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));
        let got = recv_message(BufReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn discards_trailing_bytes_in_the_same_read() {
        let mut buf = Vec::new();
        send_message(&mut buf, &Message::Ack {
            txid: "t1".into(),
            status: AckStatus::Committed,
        }).unwrap();
        buf.extend_from_slice(b"{\"type\":\"ABORT\",\"txid\":\"t2\"}\n");
        let got = recv_message(BufReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(
            got,
            Message::Ack {
                txid: "t1".into(),
                status: AckStatus::Committed,
            }
        );
    }

    #[test]
    fn empty_stream_is_an_error() {
        let got = recv_message(BufReader::new(Cursor::new(Vec::new())));
        assert!(got.is_err());
    }

    #[test]
    fn malformed_json_is_an_error_not_a_panic() {
        let got = recv_message(BufReader::new(Cursor::new(b"not json\n".to_vec())));
        assert!(got.is_err());
    }
}
