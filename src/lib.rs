//! A pure-Rust Cypher query construction engine.
//!
//! Queries are assembled lazily: builders compose a tree of fragments
//! (nodes, relationships, paths, conditions, functions, clauses) inside a
//! [`QueryGraph`] arena without producing any text, and a single build
//! pass renders the whole tree into a [`CypherQuery`]: parameterized text
//! plus the name-to-value map to bind against it. Caller-supplied values
//! never appear inline, so the same fragment tree is safe to build with
//! untrusted input.
//!
//! ```
//! use cypher_composer::{Format, NodeBuilder, QueryBuilder, QueryGraph, Value};
//!
//! let mut graph = QueryGraph::new();
//! let person = NodeBuilder::labeled("Person")?
//!     .named("p")?
//!     .property("name", "Alice")?
//!     .insert(&mut graph);
//! let matched = graph.match_node(person);
//!
//! let query = QueryBuilder::new()
//!     .phrase(matched)
//!     .returning(person)
//!     .build(&graph, Format::Compact)?;
//!
//! assert_eq!(query.text(), "MATCH (p:Person {name: $_v0_name}) RETURN p");
//! assert_eq!(
//!     query.parameters().get("_v0_name"),
//!     Some(&Value::from("Alice"))
//! );
//! # Ok::<(), cypher_composer::Error>(())
//! ```
//!
//! Fragments keep their identity through opaque arena handles: rendering
//! a node a second time within one build emits a reference to its
//! identifier instead of a second definition, while redefining a
//! relationship is rejected outright. All failures surface as [`Error`],
//! which implements [`miette::Diagnostic`] for rich reporting.

pub mod context;
pub mod error;
pub mod fragment;
pub mod ident;
pub mod query;
pub mod value;

pub use context::{Format, RenderContext, RenderFlags};
pub use error::{Error, Result};
pub use fragment::{
    CaseBuilder, DateRange, Direction, DurationUnit, FragmentId, MatchId, NodeBuilder, NodeId,
    PARAMETER_PREFIX, PathBuilder, PathId, PropertyId, QueryGraph, RelationshipBuilder,
    RelationshipId, Scope,
};
pub use ident::IdentifierGenerator;
pub use query::{CypherQuery, OrderDirection, QueryBuilder, union};
pub use value::Value;
