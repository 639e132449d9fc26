use std::collections::HashSet;
use std::hash::BuildHasherDefault;

use seahash::SeaHasher;
use tracing::debug;

use crate::error::{Result, inconsistent};
use crate::metadata::{Column, NodeId, NodeType, Snapshot, read_node_id};

pub type IdHasher = BuildHasherDefault<SeaHasher>;
pub type NodeIdSet = HashSet<NodeId, IdHasher>;

/// Adds `node_id` and every record between it and the periodic node to `ids`.
/// These are the records whose results are keyed by bin id.
pub fn collect_ancestor_ids<S: Snapshot + ?Sized>(snapshot: &S, node_id: &NodeId, ids: &mut NodeIdSet) -> Result<()> {
    let mut stack = vec![node_id.clone()];
    while let Some(id) = stack.pop() {
        match id.node_type() {
            NodeType::Filter | NodeType::Query | NodeType::Aggregation => {
                let child = read_node_id(snapshot, &id, Column::ChildNodeId)?;
                ids.insert(id);
                stack.push(child);
            }
            NodeType::PeriodicQuery => {
                debug!(periodic = %id, "reached periodic node");
                ids.insert(id);
            }
            NodeType::Projection | NodeType::Join | NodeType::StatementPattern => {
                return inconsistent(format!("unsupported node type in periodic ancestor chain: {}", id));
            }
        }
    }
    Ok(())
}

pub fn ancestor_ids<S: Snapshot + ?Sized>(snapshot: &S, node_id: &NodeId) -> Result<NodeIdSet> {
    let mut ids = NodeIdSet::default();
    collect_ancestor_ids(snapshot, node_id, &mut ids)?;
    Ok(ids)
}
