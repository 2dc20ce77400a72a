//! The step request common to every workflow tool.

use counsel_types::Confidence;
use serde::{Deserialize, Serialize};

/// An issue reported during investigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity label (`critical`, `high`, `medium`, `low`, ...).
    #[serde(default = "unknown_severity")]
    pub severity: String,
    /// What is wrong.
    pub description: String,
}

fn unknown_severity() -> String {
    "unknown".to_string()
}

/// One step of a client-led workflow, as deserialised from tool arguments.
///
/// `step_number` is client-authoritative; the engine never renumbers,
/// and only [`backtrack_from_step`](WorkflowRequest::backtrack_from_step)
/// rewrites history.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRequest {
    /// What the caller just did / is doing.
    pub step: String,
    /// 1-based index of this step.
    pub step_number: u32,
    /// Caller's current estimate of total steps; adjustable per call.
    pub total_steps: u32,
    /// False marks this as the terminal step.
    pub next_step_required: bool,
    /// Observations from this step; required non-empty.
    pub findings: String,
    /// All files examined so far.
    #[serde(default)]
    pub files_checked: Vec<String>,
    /// Files directly relevant to the findings.
    #[serde(default)]
    pub relevant_files: Vec<String>,
    /// Symbols (methods, functions, classes) central to the findings.
    #[serde(default)]
    pub relevant_context: Vec<String>,
    /// Issues identified so far.
    #[serde(default)]
    pub issues_found: Vec<Issue>,
    /// Caller's confidence in the current assessment.
    #[serde(default)]
    pub confidence: Confidence,
    /// Current hypothesis, where the tool tracks one.
    #[serde(default)]
    pub hypothesis: Option<String>,
    /// Drop history at and beyond this step before processing.
    #[serde(default)]
    pub backtrack_from_step: Option<u32>,
    /// Visual references for this step.
    #[serde(default)]
    pub images: Vec<String>,
    /// Thread id; present on every call after the first.
    #[serde(default)]
    pub continuation_id: Option<String>,
    /// Explicit model request, if any.
    #[serde(default)]
    pub model: Option<String>,
    /// Set false to decline the expert validation pass.
    #[serde(default)]
    pub use_assistant_model: Option<bool>,
}

impl WorkflowRequest {
    /// Parse and validate a request from raw tool arguments.
    ///
    /// `total_steps` is clamped up to `step_number` when the caller
    /// under-counts.
    pub fn from_args(args: &serde_json::Value) -> Result<Self, String> {
        let mut request: WorkflowRequest = serde_json::from_value(args.clone())
            .map_err(|e| format!("invalid workflow arguments: {e}"))?;
        if request.step.trim().is_empty() {
            return Err("'step' must be a non-empty description of this step".into());
        }
        if request.findings.trim().is_empty() {
            return Err("'findings' must be a non-empty summary of what was discovered".into());
        }
        if request.step_number < 1 {
            return Err("'step_number' must be at least 1".into());
        }
        if request.total_steps < request.step_number {
            request.total_steps = request.step_number;
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_args() -> serde_json::Value {
        json!({
            "step": "Investigate the crash",
            "step_number": 1,
            "total_steps": 3,
            "next_step_required": true,
            "findings": "symptom X",
        })
    }

    #[test]
    fn minimal_request_parses_with_defaults() {
        let request = WorkflowRequest::from_args(&base_args()).unwrap();
        assert_eq!(request.confidence, Confidence::Low);
        assert!(request.files_checked.is_empty());
        assert!(request.backtrack_from_step.is_none());
    }

    #[test]
    fn empty_findings_are_rejected() {
        let mut args = base_args();
        args["findings"] = json!("   ");
        assert!(WorkflowRequest::from_args(&args).is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut args = base_args();
        args.as_object_mut().unwrap().remove("step");
        assert!(WorkflowRequest::from_args(&args).is_err());
    }

    #[test]
    fn total_steps_clamps_up_to_step_number() {
        let mut args = base_args();
        args["step_number"] = json!(5);
        args["total_steps"] = json!(3);
        let request = WorkflowRequest::from_args(&args).unwrap();
        assert_eq!(request.total_steps, 5);
    }

    #[test]
    fn issues_default_their_severity() {
        let mut args = base_args();
        args["issues_found"] = json!([{"description": "off-by-one"}]);
        let request = WorkflowRequest::from_args(&args).unwrap();
        assert_eq!(request.issues_found[0].severity, "unknown");
    }
}
