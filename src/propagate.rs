//! Propagation of the bin id through the metadata records above a periodic
//! node.
//!
//! Every record between the periodic node and the terminal Query record gets
//! [`PERIODIC_BIN_ID`] as the first variable of its order, so results are
//! physically keyed by bin first and a whole bin can be scanned or deleted
//! as one range.

use tracing::{debug, info};

use crate::error::{Result, inconsistent};
use crate::metadata::{
    Column, MetadataStore, NodeId, NodeType, PERIODIC_BIN_ID, QueryGraph, read_node_id, read_variable_order,
};

/// Walks from `node_id` up to the query's terminal record, prepending the bin
/// id on the way. Returns the number of records rewritten.
///
/// Must run inside the caller's transaction: on error, records already
/// rewritten are left for the caller to roll back.
pub fn propagate_bin<S: MetadataStore + ?Sized>(store: &mut S, graph: &QueryGraph, node_id: &NodeId) -> Result<usize> {
    let mut rewritten = 0;
    let mut current = node_id.clone();
    loop {
        debug!(node = %current, "propagating bin id");
        match current.node_type() {
            NodeType::Aggregation => {
                prepend_bin(store, &current, Column::VariableOrder)?;
                prepend_bin(store, &current, Column::GroupByVariableOrder)?;
                rewritten += 1;
            }
            NodeType::PeriodicQuery => {
                if &current != graph.periodic_id() {
                    return inconsistent(format!(
                        "{} is not the registered periodic node {}; a query cannot have more than one",
                        current,
                        graph.periodic_id()
                    ));
                }
                prepend_bin(store, &current, Column::VariableOrder)?;
                rewritten += 1;
            }
            NodeType::Filter => (),
            NodeType::Query => {
                if &current != graph.query_id() {
                    return inconsistent(format!(
                        "{} is not the registered query node {}; a query cannot have more than one",
                        current,
                        graph.query_id()
                    ));
                }
                prepend_bin(store, &current, Column::VariableOrder)?;
                rewritten += 1;
                info!(query = %current, records = rewritten, "bin id propagated");
                return Ok(rewritten);
            }
            NodeType::Projection | NodeType::Join | NodeType::StatementPattern => {
                return inconsistent(format!(
                    "{} is out of place: bin-id propagation only traverses Filter/Aggregation/PeriodicWindow/Query chain",
                    current
                ));
            }
        }
        current = read_node_id(store, &current, Column::ParentNodeId)?;
    }
}

fn prepend_bin<S: MetadataStore + ?Sized>(store: &mut S, id: &NodeId, column: Column) -> Result<()> {
    let order = read_variable_order(store, id, column)?.prepend(PERIODIC_BIN_ID)?;
    store.put(id, column, &order.to_stored())
}
