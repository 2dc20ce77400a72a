//! Work history records and their consolidation.

use std::collections::BTreeSet;

use counsel_types::Confidence;
use serde::{Deserialize, Serialize};

use crate::request::{Issue, WorkflowRequest};

/// Immutable snapshot of the step-scoped fields of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step description.
    pub step: String,
    /// Client-declared step number.
    pub step_number: u32,
    /// Findings text.
    pub findings: String,
    /// Files examined in this step.
    pub files_checked: Vec<String>,
    /// Files relevant to the findings.
    pub relevant_files: Vec<String>,
    /// Symbols relevant to the findings.
    pub relevant_context: Vec<String>,
    /// Issues reported with this step.
    pub issues_found: Vec<Issue>,
    /// Confidence declared with this step.
    pub confidence: Confidence,
    /// Hypothesis carried by this step, if any.
    pub hypothesis: Option<String>,
    /// Images referenced by this step.
    pub images: Vec<String>,
}

impl StepRecord {
    /// Snapshot the step-scoped fields of a request.
    pub fn from_request(request: &WorkflowRequest) -> Self {
        Self {
            step: request.step.clone(),
            step_number: request.step_number,
            findings: request.findings.clone(),
            files_checked: request.files_checked.clone(),
            relevant_files: request.relevant_files.clone(),
            relevant_context: request.relevant_context.clone(),
            issues_found: request.issues_found.clone(),
            confidence: request.confidence,
            hypothesis: request.hypothesis.clone(),
            images: request.images.clone(),
        }
    }
}

/// A hypothesis and the step that raised it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Step number the hypothesis was recorded at.
    pub step: u32,
    /// The hypothesis text.
    pub text: String,
    /// Confidence at that step.
    pub confidence: Confidence,
}

/// Accumulated state of one workflow execution.
///
/// Always rebuilt by [`replay`](ConsolidatedFindings::replay) after a
/// backtrack; never edited in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidatedFindings {
    /// Step-tagged findings, in step order.
    pub findings: Vec<String>,
    /// Union of files examined.
    pub files_checked: BTreeSet<String>,
    /// Union of relevant files.
    pub relevant_files: BTreeSet<String>,
    /// Union of relevant symbols.
    pub relevant_context: BTreeSet<String>,
    /// Hypotheses in the order raised.
    pub hypotheses: Vec<Hypothesis>,
    /// Issues in the order reported.
    pub issues_found: Vec<Issue>,
    /// Images in the order referenced.
    pub images: Vec<String>,
    /// Confidence from the latest consolidated step.
    pub confidence: Confidence,
}

impl ConsolidatedFindings {
    /// Fold one step record in.
    pub fn update(&mut self, record: &StepRecord) {
        self.files_checked.extend(record.files_checked.iter().cloned());
        self.relevant_files.extend(record.relevant_files.iter().cloned());
        self.relevant_context.extend(record.relevant_context.iter().cloned());
        self.findings
            .push(format!("Step {}: {}", record.step_number, record.findings));
        if let Some(hypothesis) = &record.hypothesis {
            self.hypotheses.push(Hypothesis {
                step: record.step_number,
                text: hypothesis.clone(),
                confidence: record.confidence,
            });
        }
        self.issues_found.extend(record.issues_found.iter().cloned());
        self.images.extend(record.images.iter().cloned());
        self.confidence = record.confidence;
    }

    /// Rebuild from scratch over a work history.
    pub fn replay(history: &[StepRecord]) -> Self {
        let mut consolidated = Self::default();
        for record in history {
            consolidated.update(record);
        }
        consolidated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step_number: u32, findings: &str, files: &[&str]) -> StepRecord {
        StepRecord {
            step: format!("step {step_number}"),
            step_number,
            findings: findings.into(),
            files_checked: files.iter().map(|s| s.to_string()).collect(),
            relevant_files: files.iter().map(|s| s.to_string()).collect(),
            relevant_context: vec![],
            issues_found: vec![],
            confidence: Confidence::Low,
            hypothesis: None,
            images: vec![],
        }
    }

    #[test]
    fn update_accumulates_and_tags_findings() {
        let mut c = ConsolidatedFindings::default();
        c.update(&record(1, "saw symptom", &["/a.py"]));
        c.update(&record(2, "narrowed down", &["/a.py", "/b.py"]));
        assert_eq!(c.findings, vec!["Step 1: saw symptom", "Step 2: narrowed down"]);
        assert_eq!(c.files_checked.len(), 2);
    }

    #[test]
    fn replay_equals_incremental_updates() {
        let history = vec![
            record(1, "one", &["/a.py"]),
            record(2, "two", &["/b.py"]),
            record(3, "three", &[]),
        ];
        let mut incremental = ConsolidatedFindings::default();
        for r in &history {
            incremental.update(r);
        }
        let replayed = ConsolidatedFindings::replay(&history);
        assert_eq!(incremental.findings, replayed.findings);
        assert_eq!(incremental.files_checked, replayed.files_checked);
        assert_eq!(incremental.confidence, replayed.confidence);
    }

    #[test]
    fn replay_of_truncated_history_drops_later_state() {
        let history = vec![
            record(1, "one", &["/a.py"]),
            record(2, "wrong lead", &["/b.py"]),
        ];
        let survivors: Vec<StepRecord> = history
            .iter()
            .filter(|r| r.step_number < 2)
            .cloned()
            .collect();
        let replayed = ConsolidatedFindings::replay(&survivors);
        assert_eq!(replayed.findings, vec!["Step 1: one"]);
        assert!(!replayed.files_checked.contains("/b.py"));
    }

    #[test]
    fn replay_of_empty_history_is_default() {
        let replayed = ConsolidatedFindings::replay(&[]);
        assert!(replayed.findings.is_empty());
        assert_eq!(replayed.confidence, Confidence::Low);
    }
}
