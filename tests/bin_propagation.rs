use periodic_query::PeriodicError;
use periodic_query::metadata::{
    MemoryStore, NodeId, NodeIdGenerator, NodeMetadata, NodeType, PERIODIC_BIN_ID, QueryGraph, VariableOrder,
};
use periodic_query::propagate::propagate_bin;
use periodic_query::window::WindowDescriptor;

fn order(vars: &[&str]) -> VariableOrder {
    VariableOrder::new(vars.iter().copied()).expect("valid order")
}

fn window() -> WindowDescriptor {
    WindowDescriptor::new(7_200_000, 1_800_000, "time").expect("valid window")
}

struct Registered {
    store: MemoryStore,
    graph: QueryGraph,
    query: NodeId,
    aggregation: NodeId,
    periodic: NodeId,
    pattern: NodeId,
}

// Query -> Aggregation -> PeriodicQuery -> StatementPattern
fn registered() -> Registered {
    let mut ids = NodeIdGenerator::new();
    let query = ids.generate(NodeType::Query);
    let aggregation = ids.generate(NodeType::Aggregation);
    let periodic = ids.generate(NodeType::PeriodicQuery);
    let pattern = ids.generate(NodeType::StatementPattern);
    let mut store = MemoryStore::new();
    NodeMetadata::new(query.clone(), order(&["total", "obs"]))
        .with_child(&aggregation)
        .with_periodic(&periodic)
        .write(&mut store)
        .expect("query record");
    NodeMetadata::new(aggregation.clone(), order(&["obs", "total"]))
        .with_parent(&query)
        .with_child(&periodic)
        .with_group_by(order(&["obs"]))
        .write(&mut store)
        .expect("aggregation record");
    NodeMetadata::new(periodic.clone(), order(&["obs", "time"]))
        .with_parent(&aggregation)
        .with_child(&pattern)
        .with_window(window())
        .write(&mut store)
        .expect("periodic record");
    NodeMetadata::new(pattern.clone(), order(&["obs", "time"]))
        .with_parent(&periodic)
        .write(&mut store)
        .expect("pattern record");
    let graph = QueryGraph::load(&store, &query).expect("registered graph");
    Registered { store, graph, query, aggregation, periodic, pattern }
}

fn read(store: &MemoryStore, id: &NodeId) -> NodeMetadata {
    NodeMetadata::read(store, id).expect("readable").expect("present")
}

#[test]
fn bin_id_leads_every_order_above_the_periodic_node() {
    let mut r = registered();
    let pattern_before = read(&r.store, &r.pattern);
    let fields_before = r.store.len();

    let rewritten = propagate_bin(&mut r.store, &r.graph, &r.periodic).expect("propagated");
    assert_eq!(rewritten, 3, "periodic, aggregation and query records are rewritten");

    assert_eq!(read(&r.store, &r.periodic).variable_order, order(&[PERIODIC_BIN_ID, "obs", "time"]));
    let aggregation = read(&r.store, &r.aggregation);
    assert_eq!(aggregation.variable_order, order(&[PERIODIC_BIN_ID, "obs", "total"]));
    assert_eq!(aggregation.group_by, Some(order(&[PERIODIC_BIN_ID, "obs"])));
    assert_eq!(read(&r.store, &r.query).variable_order, order(&[PERIODIC_BIN_ID, "total", "obs"]));

    assert_eq!(read(&r.store, &r.pattern), pattern_before, "records below the periodic node are untouched");
    assert_eq!(r.store.len(), fields_before, "no fields are added");
}

#[test]
fn filters_are_passed_through_unchanged() {
    let mut ids = NodeIdGenerator::starting_after(41);
    let query = ids.generate(NodeType::Query);
    let filter = ids.generate(NodeType::Filter);
    let periodic = ids.generate(NodeType::PeriodicQuery);
    assert_eq!(filter.as_str(), "FILTER_43");
    let mut store = MemoryStore::new();
    NodeMetadata::new(query.clone(), order(&["obs"]))
        .with_child(&filter)
        .with_periodic(&periodic)
        .write(&mut store)
        .expect("query record");
    NodeMetadata::new(filter.clone(), order(&["obs", "time"]))
        .with_parent(&query)
        .with_child(&periodic)
        .write(&mut store)
        .expect("filter record");
    NodeMetadata::new(periodic.clone(), order(&["obs", "time"]))
        .with_parent(&filter)
        .with_window(window())
        .write(&mut store)
        .expect("periodic record");
    let graph = QueryGraph::new(query.clone(), periodic.clone()).expect("graph");

    assert_eq!(propagate_bin(&mut store, &graph, &periodic).expect("propagated"), 2);
    assert_eq!(read(&store, &filter).variable_order, order(&["obs", "time"]));
    assert_eq!(read(&store, &query).variable_order, order(&[PERIODIC_BIN_ID, "obs"]));
}

#[test]
fn propagation_runs_once() {
    let mut r = registered();
    propagate_bin(&mut r.store, &r.graph, &r.periodic).expect("first run");
    let second = propagate_bin(&mut r.store, &r.graph, &r.periodic);
    assert!(matches!(second, Err(PeriodicError::Consistency(_))));
}

#[test]
fn a_second_periodic_node_is_inconsistent() {
    let mut r = registered();
    let mut ids = NodeIdGenerator::starting_after(100);
    let other = ids.generate(NodeType::PeriodicQuery);
    let graph = QueryGraph::new(r.query.clone(), other).expect("graph");
    let res = propagate_bin(&mut r.store, &graph, &r.periodic);
    assert!(matches!(res, Err(PeriodicError::Consistency(_))));
}

#[test]
fn a_foreign_query_record_is_inconsistent() {
    let mut r = registered();
    let mut ids = NodeIdGenerator::starting_after(100);
    let other = ids.generate(NodeType::Query);
    let graph = QueryGraph::new(other, r.periodic.clone()).expect("graph");
    let res = propagate_bin(&mut r.store, &graph, &r.periodic);
    assert!(matches!(res, Err(PeriodicError::Consistency(_))));
}

#[test]
fn projections_stop_the_walk() {
    let mut ids = NodeIdGenerator::new();
    let query = ids.generate(NodeType::Query);
    let projection = ids.generate(NodeType::Projection);
    let periodic = ids.generate(NodeType::PeriodicQuery);
    let mut store = MemoryStore::new();
    NodeMetadata::new(projection.clone(), order(&["obs"]))
        .with_parent(&query)
        .with_child(&periodic)
        .write(&mut store)
        .expect("projection record");
    NodeMetadata::new(periodic.clone(), order(&["obs"]))
        .with_parent(&projection)
        .write(&mut store)
        .expect("periodic record");
    let graph = QueryGraph::new(query, periodic.clone()).expect("graph");
    let res = propagate_bin(&mut store, &graph, &periodic);
    assert!(matches!(res, Err(PeriodicError::Consistency(_))));
}

#[test]
fn a_missing_parent_is_inconsistent() {
    let mut r = registered();
    let orphan = NodeMetadata::new(r.aggregation.clone(), order(&["obs"]));
    let mut store = MemoryStore::new();
    orphan.write(&mut store).expect("orphan record");
    let res = propagate_bin(&mut store, &r.graph, &r.aggregation);
    assert!(matches!(res, Err(PeriodicError::Consistency(_))));
    // the same walk over the full graph succeeds from the aggregation
    assert_eq!(propagate_bin(&mut r.store, &r.graph, &r.aggregation).expect("propagated"), 2);
}

#[test]
fn graph_ids_are_typed() {
    let mut ids = NodeIdGenerator::new();
    let filter = ids.generate(NodeType::Filter);
    let periodic = ids.generate(NodeType::PeriodicQuery);
    assert!(matches!(QueryGraph::new(filter, periodic), Err(PeriodicError::InvalidArgument(_))));
}

#[test]
fn variable_orders() {
    let stored = order(&["obs", "time"]).to_stored();
    assert_eq!(stored, "obs;time");
    assert_eq!(VariableOrder::from_stored(&stored).expect("parse"), order(&["obs", "time"]));
    assert!(VariableOrder::from_stored("").expect("empty").is_empty());
    assert!(VariableOrder::new(["a", "a"]).is_err(), "duplicates");
    assert!(VariableOrder::new(["a;b"]).is_err(), "delimiter inside a name");
    assert!(VariableOrder::new([""]).is_err(), "empty name");
    let prepended = order(&["obs"]).prepend(PERIODIC_BIN_ID).expect("prepend");
    assert_eq!(prepended.variables()[0], PERIODIC_BIN_ID);
    assert_eq!(prepended.len(), 2);
}

#[test]
fn node_ids_round_trip_through_their_text() {
    let id = NodeId::parse("PERIODIC_QUERY_7f3a-01").expect("parse");
    assert_eq!(id.node_type(), NodeType::PeriodicQuery);
    assert_eq!(id.to_string(), "PERIODIC_QUERY_7f3a-01");
    assert!(matches!(NodeId::parse("UNION_1"), Err(PeriodicError::Consistency(_))));
    assert!(matches!(NodeId::parse("QUERY_"), Err(PeriodicError::Consistency(_))));
}
