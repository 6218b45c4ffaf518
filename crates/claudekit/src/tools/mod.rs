//! Local functions as tools the model can call.
//!
//! A function becomes a tool in two steps: describe it as a [`LocalFn`]
//! (name, parameters, handler), then declare it with [`tool()`], which
//! attaches a [`ToolDefinition`](crate::ToolDefinition) and returns an
//! [`FnTool`]. Declared tools are collected into a [`ToolRunner`], which
//! exports their definitions for a request and dispatches the model's tool
//! calls back to them.
//!
//! # Submodules
//!
//! - [`schema`]: [`Param`], [`ParamType`], [`build_schema`] and
//!   [`json_schema_for`].
//! - [`core`]: [`Invocable`], [`LocalFn`], [`FnTool`], [`tool()`],
//!   [`ToolArgs`], definition lookup and dispatch helpers.
//! - [`registry`]: [`ToolRunner`].
//! - [`error`]: [`ToolError`].

pub mod core;
pub mod error;
pub mod registry;
pub mod schema;

pub use self::core::{
    FnTool, Invocable, LocalFn, ToolArgs, ToolAttrs, ToolFuture, collect_tools,
    get_tool_definition, tool,
};
pub use self::core::{log_tool_call, truncate_result, validate_input};
pub use error::ToolError;
pub use registry::ToolRunner;
pub use schema::{InputSchema, Param, ParamType, PropertySchema, build_schema, json_schema_for};
