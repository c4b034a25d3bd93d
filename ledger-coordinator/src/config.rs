use std::collections::BTreeMap;

use clap::ValueEnum;
use ledger_base::{err, Result};

/// node_label -> (host, port), parsed from `--nodes label:host:port,...`.
pub type NodeMap = BTreeMap<String, (String, u16)>;

pub fn parse_nodes(spec: &str) -> Result<NodeMap> {
    let mut nodes = NodeMap::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let fields: Vec<&str> = part.split(':').collect();
        let [label, host, port] = fields[..] else {
            return Err(err(format!("malformed node entry {part:?}, expected label:host:port")));
        };
        let port: u16 = port
            .parse()
            .map_err(|_| err(format!("malformed port in node entry {part:?}")))?;
        nodes.insert(label.to_string(), (host.to_string(), port));
    }
    Ok(nodes)
}

/// Where the coordinator should terminate itself, for deterministic
/// crash-recovery testing. Mirrors spec.md's `{PREPARE, BEFORE_COMMIT,
/// AFTER_COMMIT}` failure-injection hooks.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CrashPoint {
    /// Before sending any PREPARE.
    Prepare,
    /// After logging COMMIT but before sending any phase-2 COMMIT.
    BeforeCommit,
    /// After sending phase-2 COMMITs.
    AfterCommit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn parses_comma_separated_nodes() {
        let nodes = parse_nodes("N1:127.0.0.1:6001,N2:127.0.0.1:6002").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes["N1"], ("127.0.0.1".to_string(), 6001));
        assert_eq!(nodes["N2"], ("127.0.0.1".to_string(), 6002));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(parse_nodes("N1:127.0.0.1").is_err());
        assert!(parse_nodes("N1:127.0.0.1:notaport").is_err());
    }
}
