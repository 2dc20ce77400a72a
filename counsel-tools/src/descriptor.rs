//! Immutable tool identity.

use counsel_types::ToolCategory;

/// Whether a tool answers in one shot or drives a client-led workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolShape {
    /// One request, one response; may call a provider once.
    Simple,
    /// One request per investigation step; pauses between steps.
    Workflow,
}

/// The immutable descriptor a tool registers with the catalogue.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Unique tool name as advertised over MCP.
    pub name: &'static str,
    /// Model preference used by `auto` resolution.
    pub category: ToolCategory,
    /// Tools with `false` never resolve a model or call a provider.
    pub requires_model: bool,
    /// Execution shape.
    pub shape: ToolShape,
    /// Default sampling temperature.
    pub default_temperature: f32,
    /// Key into the system prompt catalogue.
    pub system_prompt_id: &'static str,
    /// Schema version; bumping it invalidates the cached input schema.
    pub version: &'static str,
}

impl ToolDescriptor {
    /// Descriptor for a one-shot tool with the analytical default
    /// temperature.
    pub const fn simple(name: &'static str, category: ToolCategory) -> Self {
        Self {
            name,
            category,
            requires_model: true,
            shape: ToolShape::Simple,
            default_temperature: 0.5,
            system_prompt_id: name,
            version: "1",
        }
    }

    /// Descriptor for a workflow tool (extended reasoning, low
    /// temperature).
    pub const fn workflow(name: &'static str) -> Self {
        Self {
            name,
            category: ToolCategory::ExtendedReasoning,
            requires_model: true,
            shape: ToolShape::Workflow,
            default_temperature: 0.2,
            system_prompt_id: name,
            version: "1",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_descriptors_default_to_extended_reasoning() {
        let d = ToolDescriptor::workflow("debug");
        assert_eq!(d.category, ToolCategory::ExtendedReasoning);
        assert_eq!(d.shape, ToolShape::Workflow);
        assert!(d.requires_model);
    }
}
