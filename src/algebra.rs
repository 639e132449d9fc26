//! Operator trees held in an arena.
//!
//! Every operator lives in a slot of the [`OperatorTree`] and is addressed by
//! an [`OpId`]. Edges are stored both ways (parent and children) so rewrites
//! are plain handle reassignments. A node that has been rewritten out of the
//! tree keeps its slot but is no longer reachable from the root.

use std::fmt;

use crate::datatype::{Iri, Value};
use crate::error::{Result, invalid};
use crate::window::WindowDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(usize);

impl OpId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    name: String,
    value: Option<Value>,
}

impl Var {
    pub fn unbound(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None }
    }
    pub fn bound(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value: Some(value) }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExpr {
    Var(Var),
    Constant(Value),
    FunctionCall { iri: Iri, args: Vec<ValueExpr> },
    Compare { op: CompareOp, left: Box<ValueExpr>, right: Box<ValueExpr> },
    And(Box<ValueExpr>, Box<ValueExpr>),
}

impl ValueExpr {
    pub fn call(iri: &str, args: Vec<ValueExpr>) -> Self {
        ValueExpr::FunctionCall { iri: Iri::new(iri), args }
    }
    pub fn var(name: &str) -> Self {
        ValueExpr::Var(Var::unbound(name))
    }
    pub fn constant(value: Value) -> Self {
        ValueExpr::Constant(value)
    }
    pub fn compare(op: CompareOp, left: ValueExpr, right: ValueExpr) -> Self {
        ValueExpr::Compare { op, left: Box::new(left), right: Box::new(right) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(String),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Pattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self { subject, predicate, object }
    }
    pub fn variables(&self) -> Vec<&str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(|t| match t {
                Term::Var(name) => Some(name.as_str()),
                Term::Value(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    BasePattern(Pattern),
    Filter(ValueExpr),
    Projection(Vec<String>),
    Group { group_by: Vec<String>, aggregates: Vec<String> },
    Dedup,
    Join,
    PeriodicWindow(WindowDescriptor),
}

impl Operator {
    pub fn kind(&self) -> &'static str {
        match self {
            Operator::BasePattern(_) => "BasePattern",
            Operator::Filter(_) => "Filter",
            Operator::Projection(_) => "Projection",
            Operator::Group { .. } => "Group",
            Operator::Dedup => "Dedup",
            Operator::Join => "Join",
            Operator::PeriodicWindow(_) => "PeriodicWindow",
        }
    }
    pub fn arity(&self) -> usize {
        match self {
            Operator::BasePattern(_) => 0,
            Operator::Join => 2,
            _ => 1,
        }
    }
    /// Operators below which a periodic window may be anchored.
    pub fn is_anchor(&self) -> bool {
        matches!(self, Operator::Projection(_) | Operator::Group { .. } | Operator::Dedup)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    operator: Operator,
    parent: Option<OpId>,
    children: Vec<OpId>,
}

#[derive(Debug, Clone, Default)]
pub struct OperatorTree {
    slots: Vec<Slot>,
    root: Option<OpId>,
}

impl OperatorTree {
    pub fn new() -> Self {
        Self::default()
    }
    /// Builds a tree of unary operators ending in a leaf, listed root first.
    pub fn chain(operators: Vec<Operator>) -> Result<Self> {
        let mut tree = Self::new();
        let mut below: Option<OpId> = None;
        for operator in operators.into_iter().rev() {
            let children: Vec<OpId> = below.into_iter().collect();
            below = Some(tree.add(operator, &children)?);
        }
        match below {
            Some(root) => {
                tree.set_root(root);
                Ok(tree)
            }
            None => invalid("an operator tree needs at least one operator"),
        }
    }
    /// Adds an operator over children that are not yet attached elsewhere.
    pub fn add(&mut self, operator: Operator, children: &[OpId]) -> Result<OpId> {
        if operator.arity() != children.len() {
            return invalid(format!(
                "{} takes {} children, got {}",
                operator.kind(),
                operator.arity(),
                children.len()
            ));
        }
        for (i, child) in children.iter().enumerate() {
            if children[..i].contains(child) {
                return invalid(format!("operator {} given twice", child.0));
            }
            if child.0 >= self.slots.len() {
                return invalid(format!("unknown operator {}", child.0));
            }
            if self.slots[child.0].parent.is_some() || self.root == Some(*child) {
                return invalid(format!("operator {} is already attached", child.0));
            }
        }
        Ok(self.alloc(operator, children.to_vec()))
    }
    fn alloc(&mut self, operator: Operator, children: Vec<OpId>) -> OpId {
        let id = OpId(self.slots.len());
        for child in &children {
            self.slots[child.0].parent = Some(id);
        }
        self.slots.push(Slot { operator, parent: None, children });
        id
    }
    pub fn set_root(&mut self, root: OpId) {
        self.slots[root.0].parent = None;
        self.root = Some(root);
    }
    pub fn root(&self) -> Option<OpId> {
        self.root
    }
    pub fn operator(&self, id: OpId) -> &Operator {
        &self.slots[id.0].operator
    }
    pub fn parent(&self, id: OpId) -> Option<OpId> {
        self.slots[id.0].parent
    }
    pub fn children(&self, id: OpId) -> &[OpId] {
        &self.slots[id.0].children
    }
    /// The single child of a unary operator.
    pub fn child(&self, id: OpId) -> Option<OpId> {
        match self.slots[id.0].children.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
    /// Puts `replacement` where `old` was. `old` ends up detached, with its
    /// children untouched.
    pub fn replace(&mut self, old: OpId, replacement: OpId) {
        let parent = self.slots[old.0].parent.take();
        self.slots[replacement.0].parent = parent;
        match parent {
            Some(p) => {
                for slot in self.slots[p.0].children.iter_mut() {
                    if *slot == old {
                        *slot = replacement;
                    }
                }
            }
            None => {
                if self.root == Some(old) {
                    self.root = Some(replacement);
                }
            }
        }
    }
    /// Replaces `old` with a fresh node running `operator` over the same
    /// children. Returns the new node.
    pub fn substitute(&mut self, old: OpId, operator: Operator) -> OpId {
        let children = std::mem::take(&mut self.slots[old.0].children);
        let id = self.alloc(operator, children);
        self.replace(old, id);
        id
    }
    /// Takes a unary node out of the tree, its child moving up into its place.
    pub fn detach(&mut self, id: OpId) -> Option<OpId> {
        let child = self.child(id)?;
        self.slots[id.0].children.clear();
        self.replace(id, child);
        Some(child)
    }
    /// Inserts a detached unary node between `parent` and its single child.
    pub fn insert_below(&mut self, parent: OpId, id: OpId) -> Option<()> {
        let former = self.child(parent)?;
        self.slots[former.0].parent = Some(id);
        self.slots[id.0].children = vec![former];
        self.slots[id.0].parent = Some(parent);
        self.slots[parent.0].children = vec![id];
        Some(())
    }
    /// Operators reachable from the root in depth-first preorder.
    pub fn preorder(&self) -> Vec<OpId> {
        let mut visited = Vec::new();
        let mut stack: Vec<OpId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            visited.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        visited
    }
    pub fn kinds(&self) -> Vec<&'static str> {
        self.preorder()
            .into_iter()
            .map(|id| self.operator(id).kind())
            .collect()
    }
    pub fn find(&self, predicate: impl Fn(&Operator) -> bool) -> Option<OpId> {
        self.preorder()
            .into_iter()
            .find(|id| predicate(self.operator(*id)))
    }
    fn depth(&self, id: OpId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }
}

impl fmt::Display for OperatorTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for id in self.preorder() {
            let indent = "  ".repeat(self.depth(id));
            match self.operator(id) {
                Operator::Projection(vars) => writeln!(f, "{}Projection({})", indent, vars.join(", "))?,
                Operator::PeriodicWindow(window) => writeln!(f, "{}PeriodicWindow({})", indent, window)?,
                other => writeln!(f, "{}{}", indent, other.kind())?,
            }
        }
        Ok(())
    }
}
