//! Query side of the graph store: predicate trees, row key planning,
//! graph recognition and windowed result streaming.

pub mod assembler;
pub mod ast;
pub mod error;
pub mod ordering;
pub mod planner;
pub mod recognizer;
pub mod stream;
pub mod wildcard;

pub use assembler::{GraphMaterializer, SlidingResultsAssembler, Window};
pub use ast::{Expr, ExprRef, ExprVisitor, Literal, Property};
pub use error::{Error, Result};
pub use ordering::{Direction, OrderBy, OrderItem, ResultsComparator};
pub use planner::{ScanPlan, plan_scans, validate};
pub use recognizer::{ExprRecognizer, GraphRecognizer};
pub use stream::{GraphStream, execute_collect, execute_streaming};
pub use wildcard::WildcardCache;
