//! Periodic query – window rewriting and bin bookkeeping for incrementally
//! maintained queries.
//!
//! A periodic query asks for results over a sliding window that is reported
//! once every period, e.g. "observations of the last two hours, every thirty
//! minutes". The request arrives as a reserved function inside a filter:
//! `function:periodic(?time, 2, 0.5, time:hours)`. This crate:
//! * recognizes that predicate and validates it into a
//!   [`window::WindowDescriptor`] (millisecond window and period, the period
//!   evenly dividing the window),
//! * replaces the filter with an explicit periodic window operator and moves
//!   it directly below the outermost projection, group or dedup,
//! * prepends the bin id [`metadata::PERIODIC_BIN_ID`] to the variable order
//!   of every persisted metadata record above the periodic node, so results
//!   are keyed by bin first,
//! * lists the records between a query root and its periodic node so a whole
//!   bin can be purged once it expires.
//!
//! ## Modules
//! * [`algebra`] – Operator trees kept in an arena and addressed by [`algebra::OpId`].
//! * [`analyzer`] – Recognition of the periodic predicate and its placement.
//! * [`relocate`] – Moving the periodic window below its anchor.
//! * [`window`] – Time units, exact millisecond conversion and bin arithmetic.
//! * [`datatype`] – Literals, IRIs and the duration kinds a window accepts.
//! * [`metadata`] – Node ids, variable orders, records and the store contract.
//! * [`propagate`] – Bin id propagation up the metadata graph.
//! * [`ancestors`] – Collection of the ids between a root and its periodic node.
//! * [`results`] – Bucketed result rows and bin expiry.
//! * [`persist`] – SQLite implementation of the store contract.
//! * [`export`] – Threaded exporter publishing rows to topics.
//! * [`config`] – Settings and logging setup.
//!
//! ## Stores
//! The graph walks only need [`metadata::Snapshot`] (reads) and
//! [`metadata::MetadataStore`] (writes), scoped to one transaction. Both are
//! implemented by the in-memory [`metadata::MemoryStore`] and by
//! [`persist::SqliteTransaction`]. The walks never retry: a failure leaves the
//! transaction to be rolled back by the caller.
//!
//! ## Quick Start
//! ```
//! use periodic_query::algebra::{Operator, OperatorTree, Pattern, Term, ValueExpr};
//! use periodic_query::analyzer::{PERIODIC_FUNCTION, place_periodic_node};
//! use periodic_query::datatype::{Literal, Value};
//! use periodic_query::window::TimeUnit;
//!
//! let periodic = ValueExpr::call(PERIODIC_FUNCTION, vec![
//!     ValueExpr::var("time"),
//!     ValueExpr::constant(Value::Literal(Literal::integer(2))),
//!     ValueExpr::constant(Value::Literal(Literal::decimal("0.5"))),
//!     ValueExpr::constant(Value::Iri(TimeUnit::Hours.iri())),
//! ]);
//! let pattern = Pattern::new(
//!     Term::Var("obs".into()),
//!     Term::Var("p".into()),
//!     Term::Var("time".into()),
//! );
//! let mut tree = OperatorTree::chain(vec![
//!     Operator::Projection(vec!["obs".into()]),
//!     Operator::Filter(periodic),
//!     Operator::BasePattern(pattern),
//! ]).unwrap();
//! let window = place_periodic_node(&mut tree).unwrap().unwrap();
//! assert_eq!(window.window_millis(), 7_200_000);
//! assert_eq!(window.period_millis(), 1_800_000);
//! assert_eq!(tree.kinds(), ["Projection", "PeriodicWindow", "BasePattern"]);
//! ```

pub mod algebra;
pub mod analyzer;
pub mod ancestors;
pub mod config;
pub mod datatype;
pub mod error;
pub mod export;
pub mod metadata;
pub mod persist;
pub mod propagate;
pub mod relocate;
pub mod results;
pub mod window;

pub use error::{PeriodicError, Result};
