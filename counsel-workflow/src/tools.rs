//! The workflow tool set.
//!
//! Each tool is a [`WorkflowBehavior`] over the shared engine. Expert
//! policy per tool: the debug family (debug, codereview, secaudit,
//! refactor, testgen) honours the certain-confidence shortcut; analyze
//! forces the expert pass; thinkdeep validates but ignores the shortcut;
//! planner, docgen, and tracer are self-contained.

use std::sync::Arc;

use counsel_tools::{SchemaOverrides, ToolDescriptor};
use serde_json::{json, Map};

use crate::behavior::WorkflowBehavior;

fn overrides_with(
    fields: &[(&str, serde_json::Value)],
    required: Vec<&'static str>,
) -> SchemaOverrides {
    let mut properties = Map::new();
    for (key, value) in fields {
        properties.insert((*key).to_string(), value.clone());
    }
    SchemaOverrides {
        properties,
        required,
    }
}

/// Systematic debugging and root-cause analysis.
pub struct DebugTool {
    descriptor: ToolDescriptor,
}

impl DebugTool {
    /// Create the debug tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("debug"),
        }
    }
}

impl Default for DebugTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for DebugTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Step-by-step debugging workflow: investigate locally, report findings each step, \
         and finish with expert root-cause validation unless confidence is certain."
    }

    fn honours_certain_shortcut(&self) -> bool {
        true
    }

    fn certain_completion_status(&self) -> &'static str {
        "certain_confidence_proceed_with_fix"
    }

    fn schema_overrides(&self) -> SchemaOverrides {
        overrides_with(
            &[(
                "hypothesis",
                json!({
                    "type": "string",
                    "description": "Current root-cause hypothesis with supporting evidence.",
                }),
            )],
            vec![],
        )
    }

    fn initial_actions(&self) -> Vec<String> {
        vec![
            "Search for code related to the reported issue or symptoms".into(),
            "Identify how the affected functionality is supposed to work".into(),
        ]
    }

    fn deepen_actions(&self) -> Vec<String> {
        vec![
            "Look for race conditions, shared state, or timing dependencies".into(),
            "Consider upstream logic, invalid inputs, missing preconditions".into(),
        ]
    }

    fn verify_actions(&self) -> Vec<String> {
        vec![
            "Finalize root cause analysis with specific evidence".into(),
            "Document the complete chain of causation".into(),
        ]
    }

    fn expert_instruction(&self) -> &'static str {
        "Validate the root-cause hypothesis against the embedded code and state the minimal fix."
    }
}

/// Code review workflow covering quality, security, and architecture.
pub struct CodeReviewTool {
    descriptor: ToolDescriptor,
}

impl CodeReviewTool {
    /// Create the codereview tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("codereview"),
        }
    }
}

impl Default for CodeReviewTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for CodeReviewTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Systematic code review workflow with severity-ranked findings and a final expert \
         validation pass."
    }

    fn honours_certain_shortcut(&self) -> bool {
        true
    }

    fn step_one_requires_relevant_files(&self) -> bool {
        true
    }

    fn schema_overrides(&self) -> SchemaOverrides {
        overrides_with(
            &[
                (
                    "review_type",
                    json!({
                        "type": "string",
                        "enum": ["full", "security", "performance", "quick"],
                        "description": "Focus of the review.",
                    }),
                ),
                (
                    "severity_filter",
                    json!({
                        "type": "string",
                        "enum": ["critical", "high", "medium", "all"],
                        "description": "Lowest severity worth reporting.",
                    }),
                ),
                (
                    "standards",
                    json!({
                        "type": "string",
                        "description": "Coding standards or conventions to judge against.",
                    }),
                ),
            ],
            vec![],
        )
    }

    fn initial_actions(&self) -> Vec<String> {
        vec![
            "Look for obvious issues: bugs, security concerns, performance problems".into(),
            "Note any code smells, anti-patterns, or areas of concern".into(),
        ]
    }

    fn deepen_actions(&self) -> Vec<String> {
        vec![
            "Analyze security implications and performance concerns".into(),
            "Search for over-engineering and unnecessary complexity".into(),
        ]
    }

    fn verify_actions(&self) -> Vec<String> {
        vec![
            "Check for any missed critical security vulnerabilities".into(),
            "Validate that architectural concerns are comprehensively captured".into(),
        ]
    }
}

/// Security audit workflow.
pub struct SecauditTool {
    descriptor: ToolDescriptor,
}

impl SecauditTool {
    /// Create the secaudit tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("secaudit"),
        }
    }
}

impl Default for SecauditTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for SecauditTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Security audit workflow: map the attack surface, probe for vulnerabilities, finish \
         with expert exploitability validation."
    }

    fn honours_certain_shortcut(&self) -> bool {
        true
    }

    fn initial_actions(&self) -> Vec<String> {
        vec![
            "Map entry points, trust boundaries, and data flows".into(),
            "Identify authentication, authorization, and input validation code".into(),
        ]
    }

    fn deepen_actions(&self) -> Vec<String> {
        vec![
            "Probe injection points, deserialization, and path handling".into(),
            "Check secret handling, crypto usage, and dependency risk".into(),
        ]
    }

    fn verify_actions(&self) -> Vec<String> {
        vec![
            "Confirm exploitability of each reported issue".into(),
            "Verify severities reflect realistic impact".into(),
        ]
    }
}

/// Refactoring analysis workflow.
pub struct RefactorTool {
    descriptor: ToolDescriptor,
}

impl RefactorTool {
    /// Create the refactor tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("refactor"),
        }
    }
}

impl Default for RefactorTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for RefactorTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Refactoring workflow: identify decomposition, modernization, and organization \
         opportunities, validated by an expert pass."
    }

    fn honours_certain_shortcut(&self) -> bool {
        true
    }

    fn schema_overrides(&self) -> SchemaOverrides {
        overrides_with(
            &[(
                "refactor_type",
                json!({
                    "type": "string",
                    "enum": ["codesmells", "decompose", "modernize", "organization"],
                    "description": "Kind of refactoring analysis to perform.",
                }),
            )],
            vec![],
        )
    }

    fn initial_actions(&self) -> Vec<String> {
        vec![
            "Identify refactoring opportunities and code smells".into(),
            "Look for decomposition and modernization opportunities".into(),
        ]
    }

    fn deepen_actions(&self) -> Vec<String> {
        vec![
            "Identify specific refactoring patterns and opportunities".into(),
            "Look for modernization and organization improvements".into(),
        ]
    }

    fn verify_actions(&self) -> Vec<String> {
        vec![
            "Confirm all refactoring opportunities are identified".into(),
            "Verify recommendations align with project patterns".into(),
        ]
    }
}

/// Test-generation workflow.
pub struct TestgenTool {
    descriptor: ToolDescriptor,
}

impl TestgenTool {
    /// Create the testgen tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("testgen"),
        }
    }
}

impl Default for TestgenTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for TestgenTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Test generation workflow: map testable behaviors and edge cases, then produce \
         concrete test cases in the project's style."
    }

    fn honours_certain_shortcut(&self) -> bool {
        true
    }

    fn step_one_requires_relevant_files(&self) -> bool {
        true
    }

    fn initial_actions(&self) -> Vec<String> {
        vec![
            "Identify critical paths, edge cases, and potential failure modes".into(),
            "Map out testable behaviors and coverage requirements".into(),
        ]
    }

    fn deepen_actions(&self) -> Vec<String> {
        vec![
            "Identify test frameworks and existing patterns".into(),
            "Plan comprehensive test scenarios and coverage strategies".into(),
        ]
    }

    fn verify_actions(&self) -> Vec<String> {
        vec![
            "Ensure comprehensive test coverage is planned".into(),
            "Verify edge cases and failure modes are covered".into(),
        ]
    }
}

/// Comprehensive code analysis; the expert pass always runs.
pub struct AnalyzeTool {
    descriptor: ToolDescriptor,
}

impl AnalyzeTool {
    /// Create the analyze tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("analyze"),
        }
    }
}

impl Default for AnalyzeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for AnalyzeTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Architecture and code analysis workflow. Always closes with an expert validation \
         pass; confidence never short-circuits it."
    }

    fn force_expert_analysis(&self) -> bool {
        true
    }

    fn embed_system_prompt(&self) -> bool {
        true
    }

    fn step_one_requires_relevant_files(&self) -> bool {
        true
    }

    fn schema_overrides(&self) -> SchemaOverrides {
        overrides_with(
            &[
                (
                    "analysis_type",
                    json!({
                        "type": "string",
                        "enum": ["architecture", "performance", "security", "quality", "general"],
                        "description": "Kind of analysis to perform.",
                    }),
                ),
                (
                    "output_format",
                    json!({
                        "type": "string",
                        "enum": ["summary", "detailed", "actionable"],
                        "description": "Shape of the final report.",
                    }),
                ),
            ],
            vec![],
        )
    }

    fn initial_actions(&self) -> Vec<String> {
        vec![
            "Map the tech stack, frameworks, and overall architecture".into(),
            "Look for strengths, risks, and strategic improvement areas".into(),
        ]
    }

    fn deepen_actions(&self) -> Vec<String> {
        vec![
            "Analyze scalability characteristics and performance implications".into(),
            "Assess maintainability factors and identify tech debt".into(),
        ]
    }

    fn verify_actions(&self) -> Vec<String> {
        vec![
            "Verify strategic improvement opportunities are captured".into(),
            "Confirm both strengths and risks are identified with evidence".into(),
        ]
    }

    fn expert_instruction(&self) -> &'static str {
        "Please provide comprehensive analysis validation based on the investigation \
         findings. Focus on identifying any remaining architectural insights, validating \
         completeness, and providing final strategic recommendations."
    }
}

/// Extended multi-step reasoning with a second-opinion expert pass.
pub struct ThinkDeepTool {
    descriptor: ToolDescriptor,
}

impl ThinkDeepTool {
    /// Create the thinkdeep tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("thinkdeep"),
        }
    }
}

impl Default for ThinkDeepTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for ThinkDeepTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Deep structured reasoning workflow: build an argument step by step, then have a \
         second model challenge the weakest assumptions."
    }

    fn expert_instruction(&self) -> &'static str {
        "Challenge the reasoning chain above. Probe the weakest assumptions and either \
         strengthen the conclusion or replace it."
    }
}

/// Sequential planning; self-contained, no expert pass.
pub struct PlannerTool {
    descriptor: ToolDescriptor,
}

impl PlannerTool {
    /// Create the planner tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("planner"),
        }
    }
}

impl Default for PlannerTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for PlannerTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Sequential task planning and breakdown. Self-contained: the plan is built from \
         your steps, no external model validates it."
    }

    fn requires_expert_analysis(&self) -> bool {
        false
    }
}

/// Documentation generation; self-contained, no expert pass.
pub struct DocgenTool {
    descriptor: ToolDescriptor,
}

impl DocgenTool {
    /// Create the docgen tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("docgen"),
        }
    }
}

impl Default for DocgenTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for DocgenTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Documentation generation workflow over the files you name; self-contained."
    }

    fn requires_expert_analysis(&self) -> bool {
        false
    }

    fn step_one_requires_relevant_files(&self) -> bool {
        true
    }
}

/// Call-chain and dependency tracing; self-contained.
pub struct TracerTool {
    descriptor: ToolDescriptor,
}

impl TracerTool {
    /// Create the tracer tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::workflow("tracer"),
        }
    }
}

impl Default for TracerTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBehavior for TracerTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Code tracing workflow: follow a call chain or dependency graph from a named \
         target; self-contained."
    }

    fn requires_expert_analysis(&self) -> bool {
        false
    }

    fn schema_overrides(&self) -> SchemaOverrides {
        overrides_with(
            &[(
                "target",
                json!({
                    "type": "string",
                    "description": "Symbol or behavior to trace (function, class, flow).",
                }),
            )],
            vec!["target"],
        )
    }
}

/// Every workflow behavior, in catalogue order.
pub fn all_workflow_tools() -> Vec<Arc<dyn WorkflowBehavior>> {
    vec![
        Arc::new(DebugTool::new()),
        Arc::new(CodeReviewTool::new()),
        Arc::new(SecauditTool::new()),
        Arc::new(RefactorTool::new()),
        Arc::new(TestgenTool::new()),
        Arc::new(AnalyzeTool::new()),
        Arc::new(ThinkDeepTool::new()),
        Arc::new(PlannerTool::new()),
        Arc::new(DocgenTool::new()),
        Arc::new(TracerTool::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::ConsolidatedFindings;

    #[test]
    fn expert_policy_table() {
        assert!(DebugTool::new().honours_certain_shortcut());
        assert!(CodeReviewTool::new().honours_certain_shortcut());
        assert!(SecauditTool::new().honours_certain_shortcut());
        assert!(RefactorTool::new().honours_certain_shortcut());
        assert!(TestgenTool::new().honours_certain_shortcut());
        assert!(!AnalyzeTool::new().honours_certain_shortcut());
        assert!(!ThinkDeepTool::new().honours_certain_shortcut());
        assert!(!PlannerTool::new().requires_expert_analysis());
        assert!(!DocgenTool::new().requires_expert_analysis());
        assert!(!TracerTool::new().requires_expert_analysis());
    }

    #[test]
    fn analyze_forces_expert_even_with_no_material() {
        let analyze = AnalyzeTool::new();
        assert!(analyze.should_call_expert(&ConsolidatedFindings::default()));
        let planner = PlannerTool::new();
        assert!(!planner.should_call_expert(&ConsolidatedFindings::default()));
    }

    #[test]
    fn debug_reports_the_fix_ready_status() {
        assert_eq!(
            DebugTool::new().certain_completion_status(),
            "certain_confidence_proceed_with_fix"
        );
    }

    #[test]
    fn all_tools_have_unique_names() {
        let tools = all_workflow_tools();
        let mut names: Vec<&str> = tools.iter().map(|t| t.descriptor().name).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
        assert_eq!(before, 10);
    }
}
