//! Tool catalog and fault-isolated execution.
//!
//! The modules exposed here make it possible to register schema-described
//! tools, validate their arguments, and run them under per-call deadlines so
//! that one failing or stalled tool never affects another.

#![warn(missing_docs, clippy::pedantic)]

pub mod executor;
pub mod invocation;
pub mod registry;
pub mod schema;

pub use executor::{ConcurrencyExecutor, ExecutorConfig};
pub use invocation::{
    ExecutionError, ExecutionResult, ExecutionStatus, ToolCall, ToolFailure, ToolOutput,
    error_codes,
};
pub use registry::{Tool, ToolEntry, ToolError, ToolMetadata, ToolRegistry, ToolResult};
pub use schema::{ToolSchema, ValueKind};
