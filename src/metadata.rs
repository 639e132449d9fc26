use std::collections::BTreeMap;
use std::fmt;

// used to recognize the node type encoded in a node id
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{PeriodicError, Result, inconsistent, invalid};
use crate::window::WindowDescriptor;

/// Prepended to the variable order of every record above the periodic node.
pub const PERIODIC_BIN_ID: &str = "periodicBinId";
pub const VAR_ORDER_DELIM: &str = ";";

lazy_static! {
    static ref NODE_ID: Regex = Regex::new(
        r"^(PERIODIC_QUERY|STATEMENT_PATTERN|AGGREGATION|PROJECTION|FILTER|QUERY|JOIN)_([A-Za-z0-9-]+)$"
    )
    .unwrap();
}

// ------------- NodeType -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Query,
    Filter,
    Aggregation,
    PeriodicQuery,
    Projection,
    Join,
    StatementPattern,
}

impl NodeType {
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeType::Query => "QUERY",
            NodeType::Filter => "FILTER",
            NodeType::Aggregation => "AGGREGATION",
            NodeType::PeriodicQuery => "PERIODIC_QUERY",
            NodeType::Projection => "PROJECTION",
            NodeType::Join => "JOIN",
            NodeType::StatementPattern => "STATEMENT_PATTERN",
        }
    }
    fn from_prefix(prefix: &str) -> Option<NodeType> {
        match prefix {
            "QUERY" => Some(NodeType::Query),
            "FILTER" => Some(NodeType::Filter),
            "AGGREGATION" => Some(NodeType::Aggregation),
            "PERIODIC_QUERY" => Some(NodeType::PeriodicQuery),
            "PROJECTION" => Some(NodeType::Projection),
            "JOIN" => Some(NodeType::Join),
            "STATEMENT_PATTERN" => Some(NodeType::StatementPattern),
            _ => None,
        }
    }
}

// ------------- NodeId -------------
/// Identifies a metadata record. The node type is part of the id, as in
/// `AGGREGATION_12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    id: String,
    node_type: NodeType,
}

impl NodeId {
    pub fn new(node_type: NodeType, suffix: &str) -> Result<NodeId> {
        NodeId::parse(&format!("{}_{}", node_type.prefix(), suffix))
    }
    pub fn parse(id: &str) -> Result<NodeId> {
        let node_type = NODE_ID
            .captures(id)
            .and_then(|c| c.get(1))
            .and_then(|m| NodeType::from_prefix(m.as_str()));
        match node_type {
            Some(node_type) => Ok(NodeId {
                id: id.to_string(),
                node_type,
            }),
            None => inconsistent(format!("'{}' does not correspond to a valid node type", id)),
        }
    }
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }
    pub fn as_str(&self) -> &str {
        &self.id
    }
}
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

// Node ids are generated, never reused within one generator.
#[derive(Debug, Default)]
pub struct NodeIdGenerator {
    lower_bound: u64,
}

impl NodeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn starting_after(lower_bound: u64) -> Self {
        Self { lower_bound }
    }
    pub fn generate(&mut self, node_type: NodeType) -> NodeId {
        self.lower_bound += 1;
        NodeId {
            id: format!("{}_{}", node_type.prefix(), self.lower_bound),
            node_type,
        }
    }
}

// ------------- VariableOrder -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VariableOrder {
    variables: Vec<String>,
}

impl VariableOrder {
    pub fn new<S: Into<String>>(variables: impl IntoIterator<Item = S>) -> Result<Self> {
        let variables: Vec<String> = variables.into_iter().map(Into::into).collect();
        for (i, variable) in variables.iter().enumerate() {
            if variable.is_empty() || variable.contains(VAR_ORDER_DELIM) {
                return invalid(format!("'{}' is not a valid variable name", variable));
            }
            if variables[..i].contains(variable) {
                return invalid(format!("variable {} appears twice", variable));
            }
        }
        Ok(Self { variables })
    }
    pub fn from_stored(stored: &str) -> Result<Self> {
        if stored.is_empty() {
            return Ok(Self::default());
        }
        Self::new(stored.split(VAR_ORDER_DELIM))
            .map_err(|e| PeriodicError::Consistency(format!("stored variable order: {}", e)))
    }
    pub fn to_stored(&self) -> String {
        self.variables.join(VAR_ORDER_DELIM)
    }
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
    pub fn len(&self) -> usize {
        self.variables.len()
    }
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
    pub fn contains(&self, variable: &str) -> bool {
        self.variables.iter().any(|v| v == variable)
    }
    /// A copy of this order with `variable` in front.
    pub fn prepend(&self, variable: &str) -> Result<Self> {
        if self.contains(variable) {
            return inconsistent(format!("variable order [{}] already contains {}", self, variable));
        }
        let mut variables = Vec::with_capacity(self.variables.len() + 1);
        variables.push(variable.to_string());
        variables.extend(self.variables.iter().cloned());
        Ok(Self { variables })
    }
}
impl fmt::Display for VariableOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.variables.join(", "))
    }
}

// ------------- Store contract -------------
/// The fields a metadata record may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    VariableOrder,
    GroupByVariableOrder,
    ParentNodeId,
    ChildNodeId,
    PeriodicNodeId,
    WindowMillis,
    PeriodMillis,
    TemporalVariable,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::VariableOrder => "variableOrder",
            Column::GroupByVariableOrder => "groupByVariableOrder",
            Column::ParentNodeId => "parentNodeId",
            Column::ChildNodeId => "childNodeId",
            Column::PeriodicNodeId => "periodicNodeId",
            Column::WindowMillis => "windowMillis",
            Column::PeriodMillis => "periodMillis",
            Column::TemporalVariable => "temporalVariable",
        }
    }
}

/// Point-in-time reads of the metadata graph.
pub trait Snapshot {
    fn get(&self, id: &NodeId, column: Column) -> Result<Option<String>>;
}

/// Reads and writes scoped to one transaction.
pub trait MetadataStore: Snapshot {
    fn put(&mut self, id: &NodeId, column: Column, value: &str) -> Result<()>;
}

pub fn read_required<S: Snapshot + ?Sized>(snapshot: &S, id: &NodeId, column: Column) -> Result<String> {
    match snapshot.get(id, column)? {
        Some(value) => Ok(value),
        None => inconsistent(format!("{} has no {}", id, column.name())),
    }
}
pub fn read_variable_order<S: Snapshot + ?Sized>(snapshot: &S, id: &NodeId, column: Column) -> Result<VariableOrder> {
    VariableOrder::from_stored(&read_required(snapshot, id, column)?)
}
pub fn read_node_id<S: Snapshot + ?Sized>(snapshot: &S, id: &NodeId, column: Column) -> Result<NodeId> {
    NodeId::parse(&read_required(snapshot, id, column)?)
}
fn read_millis<S: Snapshot + ?Sized>(snapshot: &S, id: &NodeId, column: Column) -> Result<i64> {
    let stored = read_required(snapshot, id, column)?;
    stored
        .parse::<i64>()
        .map_err(|_| PeriodicError::Consistency(format!("{} of {} is not a number: {}", column.name(), id, stored)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    kept: BTreeMap<(NodeId, Column), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl Snapshot for MemoryStore {
    fn get(&self, id: &NodeId, column: Column) -> Result<Option<String>> {
        Ok(self.kept.get(&(id.clone(), column)).cloned())
    }
}
impl MetadataStore for MemoryStore {
    fn put(&mut self, id: &NodeId, column: Column, value: &str) -> Result<()> {
        self.kept.insert((id.clone(), column), value.to_string());
        Ok(())
    }
}

// ------------- Records -------------
/// One persisted node of the incremental dataflow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub child_id: Option<NodeId>,
    pub variable_order: VariableOrder,
    pub group_by: Option<VariableOrder>,
    pub window: Option<WindowDescriptor>,
    pub periodic_id: Option<NodeId>,
}

impl NodeMetadata {
    pub fn new(node_id: NodeId, variable_order: VariableOrder) -> Self {
        Self {
            node_id,
            parent_id: None,
            child_id: None,
            variable_order,
            group_by: None,
            window: None,
            periodic_id: None,
        }
    }
    pub fn with_parent(mut self, parent_id: &NodeId) -> Self {
        self.parent_id = Some(parent_id.clone());
        self
    }
    pub fn with_child(mut self, child_id: &NodeId) -> Self {
        self.child_id = Some(child_id.clone());
        self
    }
    pub fn with_group_by(mut self, group_by: VariableOrder) -> Self {
        self.group_by = Some(group_by);
        self
    }
    pub fn with_window(mut self, window: WindowDescriptor) -> Self {
        self.window = Some(window);
        self
    }
    pub fn with_periodic(mut self, periodic_id: &NodeId) -> Self {
        self.periodic_id = Some(periodic_id.clone());
        self
    }
    pub fn node_type(&self) -> NodeType {
        self.node_id.node_type()
    }
    pub fn write<S: MetadataStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        let id = &self.node_id;
        store.put(id, Column::VariableOrder, &self.variable_order.to_stored())?;
        if let Some(parent) = &self.parent_id {
            store.put(id, Column::ParentNodeId, parent.as_str())?;
        }
        if let Some(child) = &self.child_id {
            store.put(id, Column::ChildNodeId, child.as_str())?;
        }
        if let Some(group_by) = &self.group_by {
            store.put(id, Column::GroupByVariableOrder, &group_by.to_stored())?;
        }
        if let Some(window) = &self.window {
            store.put(id, Column::WindowMillis, &window.window_millis().to_string())?;
            store.put(id, Column::PeriodMillis, &window.period_millis().to_string())?;
            store.put(id, Column::TemporalVariable, window.temporal_variable())?;
        }
        if let Some(periodic) = &self.periodic_id {
            store.put(id, Column::PeriodicNodeId, periodic.as_str())?;
        }
        Ok(())
    }
    /// Reads the record for `id`, or `None` when nothing is stored for it.
    pub fn read<S: Snapshot + ?Sized>(snapshot: &S, id: &NodeId) -> Result<Option<Self>> {
        let Some(stored_order) = snapshot.get(id, Column::VariableOrder)? else {
            return Ok(None);
        };
        let optional_id = |column: Column| -> Result<Option<NodeId>> {
            snapshot.get(id, column)?.map(|s| NodeId::parse(&s)).transpose()
        };
        let group_by = snapshot
            .get(id, Column::GroupByVariableOrder)?
            .map(|s| VariableOrder::from_stored(&s))
            .transpose()?;
        let window = match snapshot.get(id, Column::WindowMillis)? {
            Some(_) => Some(
                WindowDescriptor::new(
                    read_millis(snapshot, id, Column::WindowMillis)?,
                    read_millis(snapshot, id, Column::PeriodMillis)?,
                    read_required(snapshot, id, Column::TemporalVariable)?,
                )
                .map_err(|e| PeriodicError::Consistency(format!("stored window of {}: {}", id, e)))?,
            ),
            None => None,
        };
        Ok(Some(Self {
            node_id: id.clone(),
            parent_id: optional_id(Column::ParentNodeId)?,
            child_id: optional_id(Column::ChildNodeId)?,
            variable_order: VariableOrder::from_stored(&stored_order)?,
            group_by,
            window,
            periodic_id: optional_id(Column::PeriodicNodeId)?,
        }))
    }
}

// ------------- QueryGraph -------------
/// The two ids a periodic query registers: its terminal Query record and its
/// single periodic node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryGraph {
    query_id: NodeId,
    periodic_id: NodeId,
}

impl QueryGraph {
    pub fn new(query_id: NodeId, periodic_id: NodeId) -> Result<Self> {
        if query_id.node_type() != NodeType::Query {
            return invalid(format!("{} is not a query node", query_id));
        }
        if periodic_id.node_type() != NodeType::PeriodicQuery {
            return invalid(format!("{} is not a periodic query node", periodic_id));
        }
        Ok(Self { query_id, periodic_id })
    }
    /// Reads the registered periodic node from the query record.
    pub fn load<S: Snapshot + ?Sized>(snapshot: &S, query_id: &NodeId) -> Result<Self> {
        let periodic_id = read_node_id(snapshot, query_id, Column::PeriodicNodeId)?;
        Self::new(query_id.clone(), periodic_id).map_err(|e| PeriodicError::Consistency(e.to_string()))
    }
    pub fn query_id(&self) -> &NodeId {
        &self.query_id
    }
    pub fn periodic_id(&self) -> &NodeId {
        &self.periodic_id
    }
}
