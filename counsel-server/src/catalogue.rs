//! Assembly of the advertised tool set.

use std::collections::HashSet;
use std::sync::Arc;

use counsel_cache::SchemaCache;
use counsel_tools::{
    ChatTool, ConsensusTool, ListModelsTool, SimpleTool, ToolDescriptor, VersionTool,
};
use counsel_workflow::{all_workflow_tools, WorkflowBehavior};
use serde_json::{json, Value};
use tracing::info;

/// One catalogue entry: either a one-shot tool, a workflow behavior, or a
/// meta tool of the two-stage optimizer.
#[derive(Clone)]
pub enum ToolHandle {
    /// One-shot tool.
    Simple(Arc<dyn SimpleTool>),
    /// Workflow behavior driven by the engine.
    Workflow(Arc<dyn WorkflowBehavior>),
    /// `select_mode`: rule-based routing, stage one.
    SelectMode,
    /// `execute_mode`: dispatch to a concrete mode, stage two.
    ExecuteMode,
}

/// The declarative registry of advertised tools, in a stable order.
pub struct Catalogue {
    entries: Vec<(String, ToolHandle)>,
}

impl Catalogue {
    /// Build the full catalogue minus the disabled set.
    ///
    /// Order: meta tools, simple tools, workflow tools, essentials last.
    pub fn build(disabled: &HashSet<String>) -> Self {
        let mut entries: Vec<(String, ToolHandle)> = vec![
            ("select_mode".into(), ToolHandle::SelectMode),
            ("execute_mode".into(), ToolHandle::ExecuteMode),
            (
                "chat".into(),
                ToolHandle::Simple(Arc::new(ChatTool::new())),
            ),
            (
                "consensus".into(),
                ToolHandle::Simple(Arc::new(ConsensusTool::new())),
            ),
        ];
        for behavior in all_workflow_tools() {
            entries.push((
                behavior.descriptor().name.to_string(),
                ToolHandle::Workflow(behavior),
            ));
        }
        entries.retain(|(name, _)| !disabled.contains(name));

        // Essentials are appended after filtering; they cannot be removed.
        entries.push((
            "listmodels".into(),
            ToolHandle::Simple(Arc::new(ListModelsTool::new())),
        ));
        let names: Vec<String> = entries
            .iter()
            .map(|(name, _)| name.clone())
            .chain(std::iter::once("version".to_string()))
            .collect();
        entries.push((
            "version".into(),
            ToolHandle::Simple(Arc::new(VersionTool::new(names))),
        ));

        if !disabled.is_empty() {
            info!(disabled = ?disabled, "tool filtering applied");
        }
        Self { entries }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolHandle> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, handle)| handle)
    }

    /// Advertised tool names, in catalogue order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Iterate entries in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, ToolHandle)> {
        self.entries.iter()
    }

    /// Descriptor for a concrete (non-meta) tool.
    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        match self.get(name)? {
            ToolHandle::Simple(tool) => Some(tool.descriptor()),
            ToolHandle::Workflow(behavior) => Some(behavior.descriptor()),
            _ => None,
        }
    }

    /// Human-readable description for any entry.
    pub fn description(&self, name: &str) -> &'static str {
        match self.get(name) {
            Some(ToolHandle::Simple(tool)) => tool.description(),
            Some(ToolHandle::Workflow(behavior)) => behavior.description(),
            Some(ToolHandle::SelectMode) => {
                "Select the right tool mode for a task. First stage of the two-stage flow \
                 that keeps advertised schemas small: returns the mode, its complexity, the \
                 exact schema, and a working example for execute_mode."
            }
            Some(ToolHandle::ExecuteMode) => {
                "Execute a mode chosen by select_mode. Takes mode, complexity, and a request \
                 matching the schema select_mode returned."
            }
            None => "",
        }
    }

    /// Input schema for any entry, served from the schema cache.
    pub fn schema(&self, name: &str, cache: &SchemaCache) -> Option<Value> {
        match self.get(name)? {
            ToolHandle::Simple(tool) => Some(tool.input_schema(cache)),
            ToolHandle::Workflow(behavior) => Some(behavior.input_schema(cache)),
            ToolHandle::SelectMode => Some(json!({
                "type": "object",
                "properties": {
                    "task_description": {
                        "type": "string",
                        "description": "What you want to accomplish.",
                    },
                    "context_size": {
                        "type": "string",
                        "enum": ["minimal", "standard", "comprehensive"],
                        "description": "How much context is available.",
                    },
                    "confidence_level": {
                        "type": "string",
                        "enum": ["exploring", "medium", "high"],
                        "description": "Confidence in the task understanding.",
                    },
                },
                "required": ["task_description"],
                "additionalProperties": false,
            })),
            ToolHandle::ExecuteMode => Some(json!({
                "type": "object",
                "properties": {
                    "mode": {
                        "type": "string",
                        "description": "Mode selected by select_mode.",
                    },
                    "complexity": {
                        "type": "string",
                        "enum": ["simple", "workflow"],
                        "description": "Complexity selected by select_mode.",
                    },
                    "request": {
                        "type": "object",
                        "description": "Request matching the schema select_mode returned.",
                    },
                },
                "required": ["mode", "complexity", "request"],
                "additionalProperties": false,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_catalogue_contains_all_tool_families() {
        let catalogue = Catalogue::build(&HashSet::new());
        let names = catalogue.names();
        for expected in [
            "select_mode",
            "execute_mode",
            "chat",
            "consensus",
            "debug",
            "codereview",
            "secaudit",
            "refactor",
            "testgen",
            "analyze",
            "thinkdeep",
            "planner",
            "docgen",
            "tracer",
            "listmodels",
            "version",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn disabled_tools_disappear_but_essentials_remain() {
        let disabled: HashSet<String> = ["debug".to_string(), "version".to_string()]
            .into_iter()
            .collect();
        let catalogue = Catalogue::build(&disabled);
        assert!(catalogue.get("debug").is_none());
        // "version" survives even when named.
        assert!(catalogue.get("version").is_some());
        assert!(catalogue.get("listmodels").is_some());
    }

    #[test]
    fn every_entry_serves_a_schema() {
        let catalogue = Catalogue::build(&HashSet::new());
        let cache = SchemaCache::new();
        for name in catalogue.names() {
            let schema = catalogue.schema(&name, &cache).unwrap();
            assert_eq!(schema["type"], "object", "{name} schema is not an object");
        }
    }

    #[test]
    fn version_tool_knows_the_inventory() {
        let catalogue = Catalogue::build(&HashSet::new());
        match catalogue.get("version").unwrap() {
            ToolHandle::Simple(tool) => {
                assert!(!tool.descriptor().requires_model);
            }
            _ => panic!("version must be a simple tool"),
        }
    }
}
