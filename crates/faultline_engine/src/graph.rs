//! Call graph reconstruction.
//!
//! Rebuilds the parent/child forest of one run from the flat ordered
//! call list. A call whose parent is absent from the input is promoted
//! to a root rather than dropped, and a parent link that would close a
//! cycle is broken the same way, so malformed inputs never crash or
//! recurse forever.

use std::collections::HashMap;

use faultline_core::{CallId, CallRecord};
use serde::Serialize;

/// One node of the reconstructed call tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallNode {
    /// The call itself
    #[serde(flatten)]
    pub call: CallRecord,
    /// Children in input order
    pub children: Vec<CallNode>,
}

/// Total node count across a forest
#[must_use]
pub fn node_count(forest: &[CallNode]) -> usize {
    forest
        .iter()
        .map(|node| 1 + node_count(&node.children))
        .sum()
}

/// Build the forest for one run's calls.
///
/// Children keep the input ordering; a call becomes a root when its
/// parent id is absent, unknown in the input set, or would close a
/// cycle.
#[must_use]
pub fn build_call_graph(calls: &[CallRecord]) -> Vec<CallNode> {
    let mut index_of: HashMap<CallId, usize> = HashMap::new();
    for (idx, call) in calls.iter().enumerate() {
        index_of.insert(call.id, idx);
    }

    // Resolve each call's parent to an index within the input set.
    let mut parent: Vec<Option<usize>> = calls
        .iter()
        .map(|call| {
            call.parent_call_id
                .and_then(|pid| index_of.get(&pid).copied())
        })
        .collect();

    // Break cycles: walking the parent chain from any node must
    // terminate. A link that leads back to its own node is severed,
    // promoting that node to a root.
    for idx in 0..parent.len() {
        let mut cursor = parent[idx];
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == idx {
                parent[idx] = None;
                break;
            }
            steps += 1;
            if steps > parent.len() {
                parent[idx] = None;
                break;
            }
            cursor = parent[current];
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); calls.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (idx, parent_idx) in parent.iter().enumerate() {
        match parent_idx {
            Some(p) => children[*p].push(idx),
            None => roots.push(idx),
        }
    }

    roots
        .into_iter()
        .map(|idx| assemble(idx, calls, &children))
        .collect()
}

fn assemble(idx: usize, calls: &[CallRecord], children: &[Vec<usize>]) -> CallNode {
    CallNode {
        call: calls[idx].clone(),
        children: children[idx]
            .iter()
            .map(|&child| assemble(child, calls, children))
            .collect(),
    }
}
