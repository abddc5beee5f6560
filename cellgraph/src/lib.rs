//! # cellgraph
//!
//! **Graph queries over wide-column stores.**
//!
//! cellgraph answers queries for graphs rooted at rows of a wide-column
//! table. The WHERE clause is pushed down into row key scans wherever the
//! table's composite row key allows it; whatever the keys cannot decide is
//! checked against each assembled graph. Results stream out through a
//! sliding window so that paging never materializes skipped graphs.
//!
//! ## 🚀 Quickstart
//!
//! ```rust
//! use cellgraph::storage::KeyMappingProvider;
//! use cellgraph::storage::memtable::MemTable;
//! use cellgraph::{
//!     Catalog, DataType, GraphService, MemStore, Query, Result, StoreMapping, TypeDef, Value,
//! };
//!
//! fn main() -> Result<()> {
//!     let catalog = Catalog::new().with(
//!         TypeDef::new("http://people", "Person").data("name", DataType::String),
//!     );
//!     let mapping = StoreMapping::from_json(
//!         r#"{"tables": [{"name": "people", "data_family": "f", "types": [
//!             {"type": "Person", "row_key": [{"path": "name", "codec": "pad", "max_length": 8}]}
//!         ]}]}"#,
//!         &catalog,
//!     )?;
//!     let key = mapping
//!         .require("Person")?
//!         .row_key()
//!         .compose(&[Value::String("ann".into())])?;
//!
//!     let mut table = MemTable::new();
//!     table.put(key, "f", "name", "ann");
//!     let store = MemStore::new().with_table("people", table);
//!
//!     let service = GraphService::new(store, catalog, mapping)?;
//!     let query = Query::new("Person").range(Some(1), Some(10));
//!     let table = service.table(&query)?;
//!     for graph in service.find_as_stream(&table, &query)? {
//!         println!("{:?}", graph?.root());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## 💡 Core Concepts
//!
//! - **[`GraphService`]**: The entry point. Owns the type catalog, the key
//!   mapping and a cache of open table handles.
//! - **[`Query`]**: Root type, WHERE tree, ordering and result window.
//! - **[`ResultStream`]**: Pull iterator over matching graphs with
//!   diagnostics counters.
//! - **[`QueryConfig`]**: Settings resolved from defaults, the environment
//!   and per-query properties.
//! - **[`engine`]**: The planner and result assembly (re-exported from
//!   `cellgraph-query`).

pub mod config;
mod error;
mod materializer;
mod query;
mod service;
mod store;

pub use cellgraph_api::{
    Catalog, Collected, DataGraph, DataNode, DataType, Field, NodeIndex, PropertyKind, ResultRow,
    TypeCatalog, TypeDef, Value,
};
pub use cellgraph_query::{Direction, Expr, Literal, OrderItem, Property};
pub use cellgraph_storage::StoreMapping;
pub use config::{FetchType, QueryConfig};
pub use error::{Error, Result};
pub use materializer::RowGraphMaterializer;
pub use query::Query;
pub use service::{GraphService, ResultStream};
pub use store::{MemStore, MemTableHandle, Store};

pub use cellgraph_query as engine;
pub use cellgraph_storage as storage;
