//! Filter and aggregation expression compiler for ClickHouse
//!
//! Turns filter expressions (parsed by the `filterql` crate) into
//! placeholder-bound WHERE clauses, and aggregation expressions like
//! `countIf(status_code >= 500)` into executable ClickHouse SQL.
//!
//! # Architecture
//!
//! 1. **Schema** (`schema.rs`) - column metadata for the telemetry tables
//! 2. **Mappers** (`trace.rs`, `logs.rs`, `resource.rs`, `metrics.rs`) -
//!    resolve logical field keys to physical columns per signal
//! 3. **Condition lowering** (`condition.rs`) - the shared operator table
//! 4. **Compiler** (`compiler.rs`) - walks the AST and emits a WHERE clause
//! 5. **Rewriter** (`rewriter.rs`) - rewrites aggregation expressions

pub mod compiler;
pub mod condition;
pub mod error;
pub mod fragment;
pub mod logs;
pub mod mapper;
pub mod metrics;
pub mod resource;
pub mod rewriter;
pub mod schema;
pub mod trace;

pub use compiler::{compile_filter, where_clause, CompileOptions, CompiledFragment};
pub use error::QueryError;
pub use fragment::SqlFragment;
pub use mapper::{ConditionBuilder, FieldMapper};
pub use rewriter::AggExprRewriter;
