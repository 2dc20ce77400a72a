//! JSON Schema assembly for tool inputs.
//!
//! Every tool schema starts from a shared field set; workflow tools layer
//! the step fields on top; individual tools override or extend via
//! [`SchemaOverrides`]. Built schemas are cached by `(tool, version)`.

use counsel_cache::SchemaCache;
use serde_json::{json, Map, Value};

use crate::descriptor::{ToolDescriptor, ToolShape};

/// Fields shared by every tool schema.
pub fn common_fields() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "temperature".into(),
        json!({
            "type": "number",
            "minimum": 0.0,
            "maximum": 1.0,
            "description": "Sampling temperature; lower is more deterministic.",
        }),
    );
    fields.insert(
        "thinking_mode".into(),
        json!({
            "type": "string",
            "enum": ["minimal", "low", "medium", "high", "max"],
            "description": "Reasoning depth for models that support extended thinking.",
        }),
    );
    fields.insert(
        "use_websearch".into(),
        json!({
            "type": "boolean",
            "description": "Allow the model to request web lookups when supported.",
        }),
    );
    fields.insert(
        "continuation_id".into(),
        json!({
            "type": "string",
            "description": "Thread id from a previous response; continues that conversation.",
        }),
    );
    fields.insert(
        "images".into(),
        json!({
            "type": "array",
            "items": {"type": "string"},
            "description": "Optional absolute paths to images that aid understanding.",
        }),
    );
    fields.insert(
        "model".into(),
        json!({
            "type": "string",
            "description": "Model to use, or 'auto' to let the server pick by tool category.",
        }),
    );
    fields.insert(
        "files".into(),
        json!({
            "type": "array",
            "items": {"type": "string"},
            "description": "Absolute paths of files to include as context.",
        }),
    );
    fields
}

/// The step fields shared by every workflow tool.
pub fn workflow_fields() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "step".into(),
        json!({
            "type": "string",
            "description": "Describe what you are currently investigating in this step.",
        }),
    );
    fields.insert(
        "step_number".into(),
        json!({
            "type": "integer",
            "minimum": 1,
            "description": "Index of the current step in the workflow, beginning at 1.",
        }),
    );
    fields.insert(
        "total_steps".into(),
        json!({
            "type": "integer",
            "minimum": 1,
            "description": "Current estimate of how many steps the workflow will need.",
        }),
    );
    fields.insert(
        "next_step_required".into(),
        json!({
            "type": "boolean",
            "description": "True to continue with another step; false means the workflow is complete.",
        }),
    );
    fields.insert(
        "findings".into(),
        json!({
            "type": "string",
            "description": "Everything discovered in this step. Be specific; avoid vague language.",
        }),
    );
    fields.insert(
        "files_checked".into(),
        json!({
            "type": "array",
            "items": {"type": "string"},
            "description": "All files examined so far (absolute paths).",
        }),
    );
    fields.insert(
        "relevant_files".into(),
        json!({
            "type": "array",
            "items": {"type": "string"},
            "description": "Subset of files_checked directly relevant to the findings (absolute paths).",
        }),
    );
    fields.insert(
        "relevant_context".into(),
        json!({
            "type": "array",
            "items": {"type": "string"},
            "description": "Methods, functions, or classes central to the findings.",
        }),
    );
    fields.insert(
        "issues_found".into(),
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "severity": {"type": "string"},
                    "description": {"type": "string"},
                },
            },
            "description": "Issues identified so far, each with a severity.",
        }),
    );
    fields.insert(
        "confidence".into(),
        json!({
            "type": "string",
            "enum": [
                "exploring", "low", "medium", "high", "very_high", "almost_certain", "certain",
            ],
            "description": "Confidence in the current assessment. Only use 'certain' when the \
             conclusion is fully confirmed locally and needs no external validation.",
        }),
    );
    fields.insert(
        "backtrack_from_step".into(),
        json!({
            "type": "integer",
            "minimum": 1,
            "description": "If an earlier finding needs revision, the step number to start over from.",
        }),
    );
    fields
}

/// Per-tool adjustments layered over the shared field sets.
#[derive(Default)]
pub struct SchemaOverrides {
    /// Extra or replacement properties.
    pub properties: Map<String, Value>,
    /// Names of required fields.
    pub required: Vec<&'static str>,
}

/// Build (or fetch from cache) the input schema for a descriptor.
pub fn build_schema(
    descriptor: &ToolDescriptor,
    overrides: SchemaOverrides,
    cache: &SchemaCache,
) -> Value {
    cache.get_or_build(descriptor.name, descriptor.version, || {
        let mut properties = common_fields();
        if descriptor.shape == ToolShape::Workflow {
            properties.extend(workflow_fields());
        }
        for (key, value) in overrides.properties {
            properties.insert(key, value);
        }
        let required: Vec<Value> = if descriptor.shape == ToolShape::Workflow {
            ["step", "step_number", "total_steps", "next_step_required", "findings"]
                .iter()
                .map(|s| Value::String((*s).to_string()))
                .chain(overrides.required.iter().map(|s| Value::String((*s).to_string())))
                .collect()
        } else {
            overrides
                .required
                .iter()
                .map(|s| Value::String((*s).to_string()))
                .collect()
        };
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    })
}
