#![deny(missing_docs)]
//! The client-led workflow engine.
//!
//! Workflow tools never advance on their own: each MCP call delivers one
//! investigation step, the engine consolidates it into the thread's work
//! history, and the response either demands further client-side work
//! (`pause_for_<tool>`) or closes the investigation, optionally after an
//! expert validation pass against a provider model. Backtracking truncates
//! the history by step number and rebuilds the consolidated findings by
//! replay.

mod behavior;
mod engine;
mod findings;
mod request;
mod tools;

pub use behavior::WorkflowBehavior;
pub use engine::WorkflowEngine;
pub use findings::{ConsolidatedFindings, Hypothesis, StepRecord};
pub use request::{Issue, WorkflowRequest};
pub use tools::{
    all_workflow_tools, AnalyzeTool, CodeReviewTool, DebugTool, DocgenTool, PlannerTool,
    RefactorTool, SecauditTool, TestgenTool, ThinkDeepTool, TracerTool,
};
