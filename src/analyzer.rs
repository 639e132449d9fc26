//! Recognition of the periodic window predicate and its placement in an
//! operator tree.
//!
//! A periodic query carries a filter of the form
//! `FILTER(function:periodic(?time, 2, 0.5, time:hours))`. The analyzer turns
//! that filter into a [`Operator::PeriodicWindow`] holding a validated
//! [`WindowDescriptor`].

use tracing::{debug, info};

use crate::algebra::{OpId, Operator, OperatorTree, ValueExpr};
use crate::datatype::Value;
use crate::error::{PeriodicError, Result, invalid};
use crate::relocate::relocate;
use crate::window::{TimeUnit, WindowDescriptor};

pub const PERIODIC_FUNCTION: &str = "http://org.apache.rya/function#periodic";

/// A periodic window ready to be spliced in above `child`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicWindowNode {
    pub descriptor: WindowDescriptor,
    pub child: OpId,
}

/// Returns the periodic window a function call describes, or `None` when the
/// call is not the periodic function.
pub fn recognize(function_call: &ValueExpr, child: OpId) -> Result<Option<PeriodicWindowNode>> {
    match function_call {
        ValueExpr::FunctionCall { iri, args } if iri.as_str() == PERIODIC_FUNCTION => {
            let descriptor = parse_arguments(args)?;
            Ok(Some(PeriodicWindowNode { descriptor, child }))
        }
        _ => Ok(None),
    }
}

fn parse_arguments(args: &[ValueExpr]) -> Result<WindowDescriptor> {
    let [temporal, window, period, unit] = args else {
        return invalid(format!("periodic function takes 4 arguments, got {}", args.len()));
    };
    let temporal_variable = match temporal {
        ValueExpr::Var(var) if var.value().is_none() => var.name().to_string(),
        ValueExpr::Var(var) => {
            return invalid(format!("temporal variable ?{} must not be bound", var.name()));
        }
        _ => return invalid("first periodic argument must be a variable"),
    };
    let unit = match unit {
        ValueExpr::Constant(Value::Iri(iri)) => TimeUnit::from_iri(iri)?,
        _ => return invalid("fourth periodic argument must be a time unit"),
    };
    let window = duration(window, "window")?;
    let period = duration(period, "period")?;
    WindowDescriptor::from_durations(window, period, unit, temporal_variable)
}

fn duration(arg: &ValueExpr, name: &str) -> Result<f64> {
    match arg {
        ValueExpr::Constant(Value::Literal(literal)) => literal.as_duration(),
        _ => invalid(format!("{} duration must be a literal", name)),
    }
}

/// Replaces the filter holding the periodic predicate with a periodic window
/// node over the filter's child. Returns the placed node, if any. The whole
/// tree is checked before anything is replaced, so a rejected tree is left
/// as it was.
pub fn place(tree: &mut OperatorTree) -> Result<Option<OpId>> {
    let mut found: Option<(OpId, PeriodicWindowNode)> = None;
    let mut stack: Vec<OpId> = tree.root().into_iter().collect();
    while let Some(id) = stack.pop() {
        if let Operator::Filter(condition) = tree.operator(id) {
            let child = tree.child(id).ok_or_else(|| {
                PeriodicError::InvalidArgument("filter without an argument".into())
            })?;
            if let Some(node) = recognize(condition, child)? {
                if found.is_some() {
                    return Err(PeriodicError::MultiplePeriodicNodes);
                }
                found = Some((id, node));
            }
        }
        stack.extend(tree.children(id).iter().rev());
    }
    let Some((filter, node)) = found else {
        return Ok(None);
    };
    debug!(window = %node.descriptor, "replacing periodic filter");
    Ok(Some(tree.substitute(filter, Operator::PeriodicWindow(node.descriptor))))
}

/// The descriptor of the tree's periodic window, if one has been placed.
pub fn periodic_node(tree: &OperatorTree) -> Option<&WindowDescriptor> {
    tree.preorder()
        .into_iter()
        .find_map(|id| match tree.operator(id) {
            Operator::PeriodicWindow(descriptor) => Some(descriptor),
            _ => None,
        })
}

/// Places the periodic window and moves it to its anchor in one go. On error
/// the tree is restored.
pub fn place_periodic_node(tree: &mut OperatorTree) -> Result<Option<WindowDescriptor>> {
    let before = tree.clone();
    match place(tree)? {
        Some(_) => {
            if let Err(e) = relocate(tree) {
                *tree = before;
                return Err(e);
            }
            let descriptor = periodic_node(tree).cloned();
            if let Some(window) = &descriptor {
                info!(%window, "periodic window placed");
            }
            Ok(descriptor)
        }
        None => Ok(None),
    }
}
