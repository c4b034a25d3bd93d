use std::collections::BTreeMap;

use ledger_wire::Operation;

/// Per-participant operation lists for one transaction, keyed by node
/// label. `BTreeMap` keeps the iteration order deterministic, which in
/// turn keeps the coordinator log and the order PREPARE is fanned out
/// in stable across runs (not load-bearing for correctness, just nice
/// for reading logs).
pub type NodeOps = BTreeMap<String, Vec<Operation>>;

/// Build the per-participant operation lists for a single TRANSFER.
///
/// When `from_node == to_node` the two operations land in the same
/// list under that one node label; there is no special case needed for
/// this, it falls out of inserting into the same map entry twice.
pub fn group_operations(
    from_node: &str,
    from_account: &str,
    to_node: &str,
    to_account: &str,
    amount: i64,
) -> NodeOps {
    let mut node_ops: NodeOps = BTreeMap::new();
    node_ops
        .entry(from_node.to_string())
        .or_default()
        .push(Operation {
            account_id: from_account.to_string(),
            delta: -amount,
        });
    node_ops
        .entry(to_node.to_string())
        .or_default()
        .push(Operation {
            account_id: to_account.to_string(),
            delta: amount,
        });
    node_ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn cross_node_transfer_yields_one_op_per_node() {
        let ops = group_operations("N1", "A", "N2", "B", 10);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops["N1"], vec![Operation { account_id: "A".into(), delta: -10 }]);
        assert_eq!(ops["N2"], vec![Operation { account_id: "B".into(), delta: 10 }]);
    }

    #[test]
    fn same_node_transfer_collapses_into_one_list() {
        let ops = group_operations("N1", "A", "N1", "B", 10);
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops["N1"],
            vec![
                Operation { account_id: "A".into(), delta: -10 },
                Operation { account_id: "B".into(), delta: 10 },
            ]
        );
    }
}
