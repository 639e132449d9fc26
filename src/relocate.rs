//! Moves the periodic window directly below its anchor.
//!
//! The anchor is the outermost Projection, Group or Dedup above the periodic
//! window. Keeping the window right under it means only the anchor and the
//! nodes above it carry the bin id in their variable orders.

use tracing::debug;

use crate::algebra::{OpId, Operator, OperatorTree};
use crate::error::{PeriodicError, Result, invalid};

/// Returns the anchor the periodic node `id` belongs under.
pub fn anchor_of(tree: &OperatorTree, id: OpId) -> Option<OpId> {
    let mut anchor = None;
    let mut current = tree.parent(id);
    while let Some(ancestor) = current {
        if tree.operator(ancestor).is_anchor() {
            anchor = Some(ancestor);
        }
        current = tree.parent(ancestor);
    }
    anchor
}

/// Relocates the periodic window, if there is one. Running it twice leaves
/// the tree as the first run did.
pub fn relocate(tree: &mut OperatorTree) -> Result<()> {
    let Some(periodic) = tree.find(|op| matches!(op, Operator::PeriodicWindow(_))) else {
        return Ok(());
    };
    let Some(anchor) = anchor_of(tree, periodic) else {
        return invalid("periodic window requires a projection, group or dedup above it");
    };
    if tree.child(anchor) == Some(periodic) {
        return Ok(());
    }
    debug!(anchor = tree.operator(anchor).kind(), "moving periodic window below anchor");
    tree.detach(periodic)
        .ok_or_else(|| PeriodicError::InvalidArgument("periodic window without an argument".into()))?;
    tree.insert_below(anchor, periodic)
        .ok_or_else(|| PeriodicError::InvalidArgument("anchor must have a single argument".into()))?;
    Ok(())
}
