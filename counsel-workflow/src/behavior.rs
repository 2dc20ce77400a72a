//! The hook trait workflow tools implement.
//!
//! The engine owns the state machine; behaviors supply identity, schema
//! extras, expert-analysis policy, and the per-phase action lexicons. This
//! replaces the inheritance-with-hooks pattern with variant-level
//! overrides.

use counsel_cache::SchemaCache;
use counsel_tools::{build_schema, SchemaOverrides, ToolDescriptor};
use counsel_types::Confidence;
use serde_json::Value;

use crate::findings::ConsolidatedFindings;

/// Per-tool policy plugged into the [`crate::WorkflowEngine`].
pub trait WorkflowBehavior: Send + Sync {
    /// The tool's immutable descriptor.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Human-readable description advertised to clients.
    fn description(&self) -> &'static str;

    /// Whether the tool has an expert validation pass at all. Self-
    /// contained tools (planner, docgen, tracer) return `false` and never
    /// resolve a provider at completion.
    fn requires_expert_analysis(&self) -> bool {
        true
    }

    /// Whether `confidence = certain` on the terminal step skips the
    /// expert pass. Honoured by debug-family tools; analyze and thinkdeep
    /// always validate.
    fn honours_certain_shortcut(&self) -> bool {
        false
    }

    /// Force the expert pass whenever the workflow completes, bypassing
    /// the default findings-based predicate.
    fn force_expert_analysis(&self) -> bool {
        false
    }

    /// Embed the system prompt into the expert prompt body instead of
    /// sending it separately.
    fn embed_system_prompt(&self) -> bool {
        false
    }

    /// Whether step 1 must name `relevant_files`.
    fn step_one_requires_relevant_files(&self) -> bool {
        false
    }

    /// Status reported when the certain-confidence shortcut fires.
    fn certain_completion_status(&self) -> &'static str {
        "high_confidence_completion"
    }

    /// Instruction appended after the expert context.
    fn expert_instruction(&self) -> &'static str {
        "Please provide expert analysis based on the investigation findings."
    }

    /// Tool-specific schema additions.
    fn schema_overrides(&self) -> SchemaOverrides {
        SchemaOverrides::default()
    }

    /// Input schema, served from the schema cache.
    fn input_schema(&self, cache: &SchemaCache) -> Value {
        build_schema(self.descriptor(), self.schema_overrides(), cache)
    }

    /// Tool-specific actions for the first step.
    fn initial_actions(&self) -> Vec<String> {
        vec![]
    }

    /// Tool-specific actions for the deep-investigation phase.
    fn deepen_actions(&self) -> Vec<String> {
        vec![]
    }

    /// Tool-specific actions for the verification phase.
    fn verify_actions(&self) -> Vec<String> {
        vec![]
    }

    /// The default expert-call predicate: there is something to validate.
    fn should_call_expert(&self, consolidated: &ConsolidatedFindings) -> bool {
        if !self.requires_expert_analysis() {
            return false;
        }
        if self.force_expert_analysis() {
            return true;
        }
        !consolidated.relevant_files.is_empty()
            || consolidated.findings.len() >= 2
            || !consolidated.issues_found.is_empty()
    }
}

/// Required actions for `(tool, step_number, confidence)`.
///
/// Deterministic: a shared base list per phase plus the behavior's
/// tool-specific additions.
pub(crate) fn required_actions(
    behavior: &dyn WorkflowBehavior,
    step_number: u32,
    confidence: Confidence,
) -> Vec<String> {
    let (base, extra): (&[&str], Vec<String>) = if step_number == 1 {
        (
            &[
                "Read and understand the relevant files specified for analysis",
                "Examine the overall structure and understand the implementation",
                "Identify the main components and their relationships",
                "Understand the business logic and intended functionality",
            ],
            behavior.initial_actions(),
        )
    } else if confidence <= Confidence::Low {
        (
            &[
                "Examine specific areas you've identified as requiring attention",
                "Trace method calls and data flow through the system",
                "Check for edge cases, boundary conditions, and assumptions",
                "Look for related configuration, dependencies, or external factors",
            ],
            behavior.deepen_actions(),
        )
    } else if confidence <= Confidence::High {
        (
            &[
                "Verify all significant findings have been properly documented",
                "Confirm that your assessment is comprehensive and complete",
                "Ensure findings are actionable and provide clear guidance",
                "Double-check that nothing important has been missed",
            ],
            behavior.verify_actions(),
        )
    } else {
        (
            &[
                "Continue examining the codebase for additional patterns",
                "Gather more evidence using appropriate analysis techniques",
                "Test your assumptions about code behavior and design decisions",
                "Look for patterns that confirm or refute your current assessment",
            ],
            vec![],
        )
    };
    base.iter()
        .map(|s| s.to_string())
        .chain(extra)
        .collect()
}

/// Step guidance shown under `next_steps` while paused.
pub(crate) fn guidance_message(
    tool_name: &str,
    step_number: u32,
    confidence: Confidence,
    actions: &[String],
) -> String {
    let next = step_number + 1;
    let numbered = actions
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {a}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    if step_number == 1 {
        format!(
            "MANDATORY: DO NOT call the {tool_name} tool again immediately. You MUST first \
             examine the files thoroughly using appropriate tools. Only call {tool_name} again \
             AFTER completing your investigation. When you call {tool_name} next time, use \
             step_number: {next} and report specific files examined and findings discovered."
        )
    } else if confidence <= Confidence::Low {
        format!(
            "STOP! Do NOT call {tool_name} again yet. Based on your findings, you need deeper \
             analysis. MANDATORY ACTIONS before calling {tool_name} step {next}:\n{numbered}\n\n\
             Only call {tool_name} again with step_number: {next} AFTER completing these tasks."
        )
    } else if confidence <= Confidence::High {
        format!(
            "WAIT! Your {tool_name} needs final verification. DO NOT call {tool_name} \
             immediately. REQUIRED ACTIONS:\n{numbered}\n\nDocument findings with specific \
             file references, then call {tool_name} with step_number: {next}."
        )
    } else {
        let preview = actions
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "PAUSE. Before calling {tool_name} step {next}, you MUST examine code. Required: \
             {preview}. Your next {tool_name} call (step_number: {next}) must include NEW \
             evidence from actual code examination, not just theories."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_tools::ToolDescriptor;

    struct Plain {
        descriptor: ToolDescriptor,
    }

    impl WorkflowBehavior for Plain {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }
        fn description(&self) -> &'static str {
            "test behavior"
        }
    }

    fn plain() -> Plain {
        Plain {
            descriptor: ToolDescriptor::workflow("plain"),
        }
    }

    #[test]
    fn default_predicate_needs_material() {
        let behavior = plain();
        let empty = ConsolidatedFindings::default();
        assert!(!behavior.should_call_expert(&empty));

        let mut with_files = ConsolidatedFindings::default();
        with_files.relevant_files.insert("/a.rs".into());
        assert!(behavior.should_call_expert(&with_files));

        let mut with_findings = ConsolidatedFindings::default();
        with_findings.findings.push("Step 1: x".into());
        with_findings.findings.push("Step 2: y".into());
        assert!(behavior.should_call_expert(&with_findings));
    }

    #[test]
    fn required_actions_vary_by_phase() {
        let behavior = plain();
        let initial = required_actions(&behavior, 1, Confidence::Low);
        let deepen = required_actions(&behavior, 2, Confidence::Exploring);
        let verify = required_actions(&behavior, 3, Confidence::High);
        assert_ne!(initial[0], deepen[0]);
        assert_ne!(deepen[0], verify[0]);
    }

    #[test]
    fn required_actions_are_deterministic() {
        let behavior = plain();
        assert_eq!(
            required_actions(&behavior, 2, Confidence::Medium),
            required_actions(&behavior, 2, Confidence::Medium)
        );
    }

    #[test]
    fn guidance_names_the_next_step_number() {
        let behavior = plain();
        let actions = required_actions(&behavior, 2, Confidence::Low);
        let message = guidance_message("plain", 2, Confidence::Low, &actions);
        assert!(message.contains("step_number: 3"));
    }
}
