#![deny(missing_docs)]
//! Tool descriptors, schemas, and the simple tool set.
//!
//! A [`ToolDescriptor`] is the immutable identity of a tool: name,
//! category, shape, temperature, prompt id, and the version that keys the
//! schema cache. Simple tools execute in one shot against a resolved
//! provider; the workflow tool set lives in `counsel-workflow` and shares
//! the same descriptors, schema builders, and [`ToolEnv`].

mod descriptor;
mod env;
mod prompts;
mod schema;
mod simple;

pub use descriptor::{ToolDescriptor, ToolShape};
pub use env::{CallContext, ToolEnv};
pub use prompts::system_prompt;
pub use schema::{
    build_schema, common_fields, workflow_fields, SchemaOverrides,
};
pub use simple::{ChatTool, ConsensusTool, ListModelsTool, SimpleTool, VersionTool};

/// Server version advertised by the `version` tool.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
