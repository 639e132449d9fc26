//! Bucketed results and their expiry.

use std::collections::BTreeMap;

use tracing::info;

use crate::ancestors::ancestor_ids;
use crate::error::Result;
use crate::metadata::{NodeId, Snapshot};

/// One computed row, variable name to value, in variable name order.
pub type ResultRow = BTreeMap<String, serde_json::Value>;

/// Storage that can drop everything a record holds under one bin id.
pub trait BinPurger {
    /// Deletes the results of `node_id` under `bin_id`, returning how many
    /// rows went away.
    fn purge_bin(&mut self, node_id: &NodeId, bin_id: i64) -> Result<usize>;
}

/// Deletes bin `bin_id` from every record between `root_id` and its periodic
/// node. Returns the number of rows deleted.
pub fn expire_bin<S>(store: &mut S, root_id: &NodeId, bin_id: i64) -> Result<usize>
where
    S: Snapshot + BinPurger + ?Sized,
{
    let mut ids: Vec<NodeId> = ancestor_ids(&*store, root_id)?.into_iter().collect();
    ids.sort();
    let mut deleted = 0;
    for id in &ids {
        deleted += store.purge_bin(id, bin_id)?;
    }
    info!(root = %root_id, bin = bin_id, records = ids.len(), rows = deleted, "bin expired");
    Ok(deleted)
}
