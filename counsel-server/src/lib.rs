#![deny(missing_docs)]
//! The counsel server: catalogue assembly, the request pipeline, the
//! two-stage mode optimizer, and the MCP stdio shell.
//!
//! Everything stateful hangs off one [`Core`]: the provider registry,
//! the conversation store, the three caches, and the workflow engine,
//! threaded explicitly through the handler rather than living in ambient
//! singletons.

mod catalogue;
mod config;
mod core;
mod handler;
mod mcp;
mod optimizer;

pub use catalogue::{Catalogue, ToolHandle};
pub use config::ServerConfig;
pub use core::Core;
pub use handler::RequestHandler;
pub use mcp::McpServer;
pub use optimizer::{derive_complexity, minimal_workflow_args, select_mode, Complexity};
