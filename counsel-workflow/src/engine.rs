//! The pause/resume state machine shared by every workflow tool.

use std::collections::HashMap;

use counsel_budget::TokenAllocation;
use counsel_conversation::{Role, TurnMeta};
use counsel_files::{read_files, ReadOptions};
use counsel_providers::timeout_for;
use counsel_tools::{system_prompt, CallContext, ToolEnv};
use counsel_types::{Confidence, GenerationRequest, ThinkingMode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::behavior::{guidance_message, required_actions, WorkflowBehavior};
use crate::findings::{ConsolidatedFindings, StepRecord};
use crate::request::WorkflowRequest;

/// Expert statuses promoted to the top-level envelope when the provider
/// asks for more client-side work.
const PROMOTED_STATUSES: &[&str] = &["files_required_to_continue", "investigation_paused"];

/// Upper bound on concurrently-tracked workflow histories.
const MAX_TRACKED_WORKFLOWS: usize = 1_000;

/// Drives workflow tools: one externally-supplied step per call.
///
/// Work history is keyed by thread id so steps, backtracks, and the final
/// expert pass all operate on the same record across stateless transport
/// calls. The engine never advances on its own and never renumbers steps;
/// the client is authoritative for `step_number`.
pub struct WorkflowEngine {
    histories: RwLock<HashMap<Uuid, Vec<StepRecord>>>,
}

impl WorkflowEngine {
    /// Create an engine with no recorded histories.
    pub fn new() -> Self {
        Self {
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// Process one step for `behavior`, returning the response envelope.
    pub async fn execute_step(
        &self,
        behavior: &dyn WorkflowBehavior,
        env: &ToolEnv,
        call: &CallContext,
        args: &Value,
    ) -> Value {
        let tool = behavior.descriptor().name;

        let request = match WorkflowRequest::from_args(args) {
            Ok(request) => request,
            Err(message) => {
                return json!({
                    "status": "error",
                    "content": message,
                    "step_number": args.get("step_number").and_then(|v| v.as_u64()).unwrap_or(0),
                });
            }
        };

        if behavior.step_one_requires_relevant_files()
            && request.step_number == 1
            && request.relevant_files.is_empty()
        {
            return json!({
                "status": "error",
                "content": format!(
                    "Step 1 of {tool} requires 'relevant_files' to specify the files or \
                     directories to work on"
                ),
                "step_number": 1,
            });
        }

        // Thread: continuations arrive validated by the handler; a first
        // step opens a fresh thread.
        let thread_id = match call.continuation_id {
            Some(id) => id,
            None => env.store.create(tool, args, None).await,
        };

        // Every step is a user turn; pause envelopes add no assistant turn.
        env.store
            .add_turn(
                thread_id,
                Role::User,
                request.step.clone(),
                TurnMeta {
                    tool_name: Some(tool.to_string()),
                    files: request.relevant_files.clone(),
                    images: request.images.clone(),
                    ..Default::default()
                },
            )
            .await;

        // Backtrack first, then process the current step as a new entry at
        // its declared number.
        let (consolidated, history_len, initial_step) = {
            let mut histories = self.histories.write().await;
            // Threads expire in the conversation store; their step records
            // are only dropped here, so bound the map.
            if !histories.contains_key(&thread_id) && histories.len() >= MAX_TRACKED_WORKFLOWS {
                if let Some(stale) = histories.keys().next().copied() {
                    histories.remove(&stale);
                }
            }
            let history = histories.entry(thread_id).or_default();
            if let Some(k) = request.backtrack_from_step {
                let before = history.len();
                history.retain(|record| record.step_number < k);
                info!(
                    tool,
                    thread = %thread_id,
                    backtrack_from = k,
                    dropped = before - history.len(),
                    "work history truncated"
                );
            }
            history.push(StepRecord::from_request(&request));
            let consolidated = ConsolidatedFindings::replay(history);
            let initial_step = history
                .first()
                .map(|record| record.step.clone())
                .unwrap_or_else(|| request.step.clone());
            (consolidated, history.len(), initial_step)
        };

        let mut envelope = json!({
            "status": format!("{tool}_in_progress"),
            "step_number": request.step_number,
            "total_steps": request.total_steps,
            "next_step_required": request.next_step_required,
            "relevant_files": consolidated.relevant_files.iter().collect::<Vec<_>>(),
            "continuation_id": thread_id.to_string(),
        });
        envelope[format!("{tool}_status")] = json!({
            "files_checked": consolidated.files_checked.len(),
            "relevant_files": consolidated.relevant_files.len(),
            "relevant_context": consolidated.relevant_context.len(),
            "issues_found": consolidated.issues_found.len(),
            "images_collected": consolidated.images.len(),
            "current_confidence": request.confidence.as_str(),
        });

        if request.next_step_required {
            self.handle_continuation(behavior, &request, &mut envelope);
            return envelope;
        }

        self.handle_completion(
            behavior,
            env,
            call,
            &request,
            &consolidated,
            history_len,
            &initial_step,
            thread_id,
            &mut envelope,
        )
        .await;
        envelope
    }

    fn handle_continuation(
        &self,
        behavior: &dyn WorkflowBehavior,
        request: &WorkflowRequest,
        envelope: &mut Value,
    ) {
        let tool = behavior.descriptor().name;
        let actions = required_actions(behavior, request.step_number, request.confidence);
        envelope["status"] = json!(format!("pause_for_{tool}"));
        envelope[format!("{tool}_required")] = json!(true);
        envelope["next_steps"] = json!(guidance_message(
            tool,
            request.step_number,
            request.confidence,
            &actions
        ));
        envelope["required_actions"] = json!(actions);
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_completion(
        &self,
        behavior: &dyn WorkflowBehavior,
        env: &ToolEnv,
        call: &CallContext,
        request: &WorkflowRequest,
        consolidated: &ConsolidatedFindings,
        steps_taken: usize,
        initial_step: &str,
        thread_id: Uuid,
        envelope: &mut Value,
    ) {
        let tool = behavior.descriptor().name;
        envelope[format!("{tool}_complete")] = json!(true);

        let work_summary = work_summary(tool, consolidated);
        let complete_block = json!({
            "initial_request": initial_step,
            "steps_taken": steps_taken,
            "files_examined": consolidated.files_checked.iter().collect::<Vec<_>>(),
            "relevant_files": consolidated.relevant_files.iter().collect::<Vec<_>>(),
            "relevant_context": consolidated.relevant_context.iter().collect::<Vec<_>>(),
            "issues_found": consolidated.issues_found,
            "work_summary": work_summary,
        });

        // Certain-confidence shortcut, for the tools that honour it.
        if behavior.honours_certain_shortcut() && request.confidence == Confidence::Certain {
            let mut block = complete_block;
            block["final_analysis"] = json!(request.hypothesis);
            block["confidence_level"] = json!(Confidence::Certain.as_str());
            envelope["status"] = json!(behavior.certain_completion_status());
            envelope[format!("complete_{tool}")] = block;
            envelope["skip_expert_analysis"] = json!(true);
            envelope["expert_analysis"] = json!({
                "status": "skipped_due_to_certain_confidence",
                "reason": format!("{tool} completed with certain confidence - no external validation needed"),
            });
            envelope["next_steps"] = json!(format!(
                "{tool} complete with certain confidence. Present results and proceed with \
                 the fix without further consultation."
            ));
            return;
        }

        let caller_declined = request.use_assistant_model == Some(false);
        if !caller_declined && behavior.should_call_expert(consolidated) {
            envelope["status"] = json!("calling_expert_analysis");
            let expert = self
                .call_expert(behavior, env, call, consolidated, initial_step)
                .await;

            match expert {
                ExpertOutcome::Analysis(analysis) => {
                    let special = analysis
                        .get("status")
                        .and_then(|s| s.as_str())
                        .filter(|s| PROMOTED_STATUSES.contains(s))
                        .map(|s| s.to_string());
                    if let Some(status) = special {
                        envelope["status"] = json!(status);
                        envelope["content"] = analysis
                            .get("raw_analysis")
                            .cloned()
                            .unwrap_or_else(|| json!(analysis.to_string()));
                        envelope["next_steps"] = if status == "files_required_to_continue" {
                            json!("Provide the requested files and continue the analysis.")
                        } else {
                            analysis
                                .get("next_steps")
                                .cloned()
                                .unwrap_or_else(|| json!("Continue based on expert analysis."))
                        };
                    } else {
                        let content = expert_content_for_turn(&analysis);
                        envelope["status"] = json!(format!("{tool}_complete"));
                        envelope["expert_analysis"] = analysis;
                        envelope["next_steps"] = json!(completion_message(tool));
                        envelope[format!("complete_{tool}")] = complete_block;

                        // The expert response is the one assistant turn this
                        // workflow records.
                        let (model_name, provider_name) = call
                            .resolved
                            .as_ref()
                            .map(|r| (Some(r.name.clone()), Some(r.provider.name().to_string())))
                            .unwrap_or((None, None));
                        env.store
                            .add_turn(
                                thread_id,
                                Role::Assistant,
                                content,
                                TurnMeta {
                                    tool_name: Some(tool.to_string()),
                                    model_name,
                                    model_provider: provider_name,
                                    files: consolidated.relevant_files.iter().cloned().collect(),
                                    images: vec![],
                                },
                            )
                            .await;
                    }
                }
                ExpertOutcome::Failed(message) => {
                    // The user-side step succeeded; the expert pass did not.
                    // No assistant turn is appended.
                    envelope["status"] = json!("error");
                    envelope["content"] = json!(message);
                    envelope["content_type"] = json!("text");
                }
            }
            return;
        }

        if !behavior.requires_expert_analysis() {
            envelope["status"] = json!(format!("{tool}_complete"));
            envelope[format!("complete_{tool}")] = complete_block;
            envelope["next_steps"] = json!(format!(
                "{tool} work complete. Present results to the user."
            ));
        } else {
            envelope["status"] = json!("local_work_complete");
            envelope[format!("complete_{tool}")] = complete_block;
            envelope["next_steps"] = json!(format!(
                "Local {tool} complete with sufficient confidence. Present findings and \
                 recommendations to the user based on the work results."
            ));
        }
    }

    async fn call_expert(
        &self,
        behavior: &dyn WorkflowBehavior,
        env: &ToolEnv,
        call: &CallContext,
        consolidated: &ConsolidatedFindings,
        initial_step: &str,
    ) -> ExpertOutcome {
        let descriptor = behavior.descriptor();
        let Some(resolved) = call.resolved.as_ref() else {
            return ExpertOutcome::Failed(
                "expert analysis requires a resolved model".to_string(),
            );
        };

        let mut context = format!(
            "=== {} REQUEST ===\n{initial_step}\n=== END REQUEST ===\n\n{}",
            descriptor.name.to_uppercase(),
            work_summary(descriptor.name, consolidated)
        );

        // Final step embeds the relevant files; intermediate steps only
        // ever referenced their paths.
        if !consolidated.relevant_files.is_empty() {
            let files: Vec<String> = consolidated.relevant_files.iter().cloned().collect();
            let budget =
                TokenAllocation::for_window(resolved.capabilities.context_window).file_tokens;
            let file_content =
                read_files(&files, budget, 0, ReadOptions::default(), &env.estimator);
            if !file_content.is_empty() {
                context.push_str("\n\n=== ESSENTIAL FILES ===\n");
                context.push_str(&file_content);
                context.push_str("\n=== END ESSENTIAL FILES ===");
            }
        }

        let prompt_text = system_prompt(descriptor.system_prompt_id);
        let (system, prompt) = if behavior.embed_system_prompt() {
            (
                String::new(),
                format!("{prompt_text}\n\n{context}\n\n{}", behavior.expert_instruction()),
            )
        } else {
            (
                prompt_text.to_string(),
                format!("{context}\n\n{}", behavior.expert_instruction()),
            )
        };

        let mut images: Vec<String> = consolidated.images.clone();
        images.sort();
        images.dedup();

        let request = GenerationRequest {
            model_name: resolved.name.clone(),
            prompt,
            system_prompt: system,
            temperature: descriptor.default_temperature,
            thinking_mode: ThinkingMode::High,
            max_output_tokens: None,
            images: images.into_iter().map(Into::into).collect(),
        };

        debug!(tool = descriptor.name, model = resolved.name, "calling expert analysis");
        match resolved
            .provider
            .generate(&request, timeout_for(descriptor.category), &call.cancel)
            .await
        {
            Ok(response) if response.content.trim().is_empty() => {
                ExpertOutcome::Analysis(json!({
                    "status": "empty_response",
                    "error": "No response from model",
                }))
            }
            Ok(response) => match serde_json::from_str::<Value>(response.content.trim()) {
                Ok(parsed) if parsed.is_object() => ExpertOutcome::Analysis(parsed),
                _ => ExpertOutcome::Analysis(json!({
                    "status": "analysis_complete",
                    "raw_analysis": response.content,
                    "parse_error": "Response was not valid JSON",
                })),
            },
            Err(err) => {
                error!(tool = descriptor.name, %err, "expert analysis failed");
                ExpertOutcome::Failed(err.to_string())
            }
        }
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

enum ExpertOutcome {
    /// The expert returned something usable (including wrapped non-JSON).
    Analysis(Value),
    /// The provider call itself failed.
    Failed(String),
}

/// The assistant-turn body for a successful expert response.
fn expert_content_for_turn(analysis: &Value) -> String {
    match analysis.get("raw_analysis").and_then(|v| v.as_str()) {
        Some(raw) => raw.to_string(),
        None => serde_json::to_string_pretty(analysis).unwrap_or_else(|_| analysis.to_string()),
    }
}

fn completion_message(tool: &str) -> String {
    format!(
        "{} IS COMPLETE. You MUST now summarize and present ALL key findings, confirmed \
         hypotheses, and exact recommended actions. Clearly identify the conclusion and \
         provide concrete, actionable guidance, highlighting the affected code paths.",
        tool.to_uppercase()
    )
}

/// Render the consolidated work into the summary block completions carry.
fn work_summary(tool: &str, consolidated: &ConsolidatedFindings) -> String {
    let mut parts = vec![
        format!("=== {} WORK SUMMARY ===", tool.to_uppercase()),
        format!("Total steps: {}", consolidated.findings.len()),
        format!("Files examined: {}", consolidated.files_checked.len()),
        format!("Relevant files identified: {}", consolidated.relevant_files.len()),
        format!("Methods/functions involved: {}", consolidated.relevant_context.len()),
        format!("Issues found: {}", consolidated.issues_found.len()),
        String::new(),
        "=== WORK PROGRESSION ===".to_string(),
    ];
    parts.extend(consolidated.findings.iter().cloned());

    if !consolidated.hypotheses.is_empty() {
        parts.push(String::new());
        parts.push("=== HYPOTHESIS EVOLUTION ===".to_string());
        for hypothesis in &consolidated.hypotheses {
            parts.push(format!(
                "Step {} ({} confidence): {}",
                hypothesis.step,
                hypothesis.confidence.as_str(),
                hypothesis.text
            ));
        }
    }

    if !consolidated.issues_found.is_empty() {
        parts.push(String::new());
        parts.push("=== ISSUES IDENTIFIED ===".to_string());
        for issue in &consolidated.issues_found {
            parts.push(format!(
                "[{}] {}",
                issue.severity.to_uppercase(),
                issue.description
            ));
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Issue;

    #[test]
    fn work_summary_sections_follow_the_findings() {
        let mut consolidated = ConsolidatedFindings::default();
        consolidated.findings.push("Step 1: looked around".into());
        consolidated.issues_found.push(Issue {
            severity: "high".into(),
            description: "stale cache".into(),
        });
        let summary = work_summary("debug", &consolidated);
        assert!(summary.starts_with("=== DEBUG WORK SUMMARY ==="));
        assert!(summary.contains("Step 1: looked around"));
        assert!(summary.contains("[HIGH] stale cache"));
    }

    #[test]
    fn expert_turn_content_prefers_raw_analysis() {
        let wrapped = json!({"status": "analysis_complete", "raw_analysis": "plain text"});
        assert_eq!(expert_content_for_turn(&wrapped), "plain text");
        let structured = json!({"status": "analysis_complete", "verdict": "ok"});
        assert!(expert_content_for_turn(&structured).contains("verdict"));
    }
}
