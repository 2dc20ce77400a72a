//! History reconstruction with dual prioritisation.
//!
//! Turns are collected newest → oldest while the history budget lasts, so
//! recent context survives tight windows, then presented oldest → newest
//! so the model reads chronologically. File content embeds at most once,
//! in the newest turn that references the file.

use std::collections::HashMap;

use counsel_budget::{TokenAllocation, TokenEstimator};
use counsel_files::{read_file_content, ReadOptions};
use counsel_types::ModelCapabilities;
use tracing::debug;

use crate::thread::{Role, ThreadContext, Turn, MAX_CONVERSATION_TURNS};

/// Model used by the most recent assistant turn, for continuation calls
/// that name no model of their own.
pub fn inherited_model(ctx: &ThreadContext) -> Option<String> {
    ctx.turns
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant && t.meta.model_name.is_some())
        .and_then(|t| t.meta.model_name.clone())
}

/// Follow-up guidance appended to continuation prompts.
///
/// Near the turn limit the model is told to wrap up instead of inviting
/// another exchange.
pub fn follow_up_instructions(current_turn_count: usize, max_turns: Option<usize>) -> String {
    let max_turns = max_turns.unwrap_or(MAX_CONVERSATION_TURNS);
    if current_turn_count + 1 >= max_turns {
        "\nIMPORTANT: This is approaching the final exchange in this conversation thread. \
         Do NOT include any follow-up questions in your response. Provide your complete \
         final analysis and recommendations."
            .to_string()
    } else {
        let remaining = max_turns - current_turn_count - 1;
        format!(
            "\n\nCONVERSATION CONTINUATION: You can continue this discussion ({remaining} \
             exchanges remaining). If you suggest follow-ups or need clarification, \
             explicitly instruct the agent to respond using the continuation_id from this \
             response so the conversation thread is preserved."
        )
    }
}

fn turn_label(turn: &Turn) -> String {
    match turn.role {
        Role::User => "Agent".to_string(),
        Role::Assistant => {
            let model = turn.meta.model_name.as_deref().unwrap_or("assistant");
            match turn.meta.tool_name.as_deref() {
                Some(tool) => format!("{model} via {tool}"),
                None => model.to_string(),
            }
        }
    }
}

fn render_turn(
    turn: &Turn,
    index: usize,
    owned_files: &[&str],
    estimator: &TokenEstimator,
) -> String {
    let mut block = format!("--- Turn {} ({}) ---\n{}\n", index + 1, turn_label(turn), turn.content);
    if !owned_files.is_empty() {
        block.push_str("\nFiles referenced in this turn:\n");
        for path in owned_files {
            let (content, _) = read_file_content(path, ReadOptions::default(), estimator);
            block.push_str(&content);
        }
    }
    block
}

/// Rebuild a thread's history under the model's history budget.
///
/// Returns the rendered history block and its estimated token count;
/// `("", 0)` for a thread with no turns.
pub fn build_history(
    ctx: &ThreadContext,
    caps: &ModelCapabilities,
    estimator: &TokenEstimator,
) -> (String, usize) {
    if ctx.turns.is_empty() {
        return (String::new(), 0);
    }

    let budget = TokenAllocation::for_window(caps.context_window).history_tokens;

    // Newest reference wins: assign each file path to the latest turn that
    // mentions it; earlier turns render with their file list shrunk.
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (idx, turn) in ctx.turns.iter().enumerate().rev() {
        for path in &turn.meta.files {
            owner.entry(path.as_str()).or_insert(idx);
        }
    }

    // Collection phase: newest to oldest while the budget lasts.
    let mut collected: Vec<(usize, String)> = Vec::new();
    let mut used_tokens = 0usize;
    let mut omitted = 0usize;
    for (idx, turn) in ctx.turns.iter().enumerate().rev() {
        let owned: Vec<&str> = turn
            .meta
            .files
            .iter()
            .filter(|p| owner.get(p.as_str()) == Some(&idx))
            .map(|p| p.as_str())
            .collect();
        let block = render_turn(turn, idx, &owned, estimator);
        let block_tokens = estimator.estimate_plain(&block);
        if used_tokens + block_tokens > budget && !collected.is_empty() {
            omitted = idx + 1;
            break;
        }
        used_tokens += block_tokens;
        collected.push((idx, block));
    }

    // Presentation phase: chronological order for the model.
    collected.reverse();

    let mut out = String::new();
    out.push_str("=== CONVERSATION HISTORY (CONTINUATION) ===\n");
    out.push_str(&format!("Thread: {}\n", ctx.id));
    out.push_str(&format!("Tool: {}\n", ctx.tool_name));
    out.push_str(&format!("Turn {}/{}\n", ctx.turns.len(), MAX_CONVERSATION_TURNS));
    out.push_str("You are continuing this conversation thread from where it left off.\n\n");
    if omitted > 0 {
        out.push_str(&format!(
            "[Note: {omitted} earlier turn(s) omitted to fit the context budget]\n\n"
        ));
    }
    for (_, block) in &collected {
        out.push_str(block);
        out.push('\n');
    }
    out.push_str("=== END CONVERSATION HISTORY ===");

    let tokens = estimator.estimate_plain(&out);
    debug!(
        thread = %ctx.id,
        turns = ctx.turns.len(),
        included = collected.len(),
        omitted,
        tokens,
        "conversation history built"
    );
    (out, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::TurnMeta;
    use std::io::Write;
    use std::time::SystemTime;
    use uuid::Uuid;

    fn thread_with(turns: Vec<Turn>) -> ThreadContext {
        let now = SystemTime::now();
        ThreadContext {
            id: Uuid::new_v4(),
            tool_name: "chat".into(),
            turns,
            initial_context: serde_json::json!({}),
            parent_thread_id: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    fn turn(role: Role, content: &str, meta: TurnMeta) -> Turn {
        Turn {
            role,
            content: content.into(),
            timestamp: SystemTime::now(),
            meta,
        }
    }

    fn caps() -> ModelCapabilities {
        ModelCapabilities::conservative()
    }

    #[test]
    fn empty_thread_builds_empty_history() {
        let ctx = thread_with(vec![]);
        let (text, tokens) = build_history(&ctx, &caps(), &TokenEstimator::standalone());
        assert!(text.is_empty());
        assert_eq!(tokens, 0);
    }

    #[test]
    fn turns_present_chronologically() {
        let ctx = thread_with(vec![
            turn(Role::User, "first question", TurnMeta::default()),
            turn(Role::Assistant, "first answer", TurnMeta::default()),
            turn(Role::User, "second question", TurnMeta::default()),
        ]);
        let (text, tokens) = build_history(&ctx, &caps(), &TokenEstimator::standalone());
        let a = text.find("first question").unwrap();
        let b = text.find("first answer").unwrap();
        let c = text.find("second question").unwrap();
        assert!(a < b && b < c);
        assert!(tokens > 0);
        assert!(text.starts_with("=== CONVERSATION HISTORY"));
        assert!(text.ends_with("=== END CONVERSATION HISTORY ==="));
    }

    #[test]
    fn file_content_embeds_once_in_newest_referencing_turn() {
        let mut f = tempfile::NamedTempFile::with_suffix(".rs").unwrap();
        writeln!(f, "pub fn marker_function() {{}}").unwrap();
        let path = f.path().to_string_lossy().into_owned();

        let ctx = thread_with(vec![
            turn(
                Role::User,
                "look at the file",
                TurnMeta {
                    files: vec![path.clone()],
                    ..Default::default()
                },
            ),
            turn(Role::Assistant, "saw it", TurnMeta::default()),
            turn(
                Role::User,
                "look again",
                TurnMeta {
                    files: vec![path.clone()],
                    ..Default::default()
                },
            ),
        ]);
        let (text, _) = build_history(&ctx, &caps(), &TokenEstimator::standalone());
        assert_eq!(text.matches("marker_function").count(), 1);
        // The single embedding sits in the newest turn's block.
        let file_pos = text.find("marker_function").unwrap();
        let turn3_pos = text.find("--- Turn 3").unwrap();
        assert!(file_pos > turn3_pos);
    }

    #[test]
    fn tight_budget_drops_oldest_turns_with_a_note() {
        let turns: Vec<Turn> = (0..8)
            .map(|i| {
                turn(
                    Role::User,
                    &format!("turn body {i} {}", "x".repeat(400)),
                    TurnMeta::default(),
                )
            })
            .collect();
        let ctx = thread_with(turns);
        let tiny = ModelCapabilities {
            context_window: 2_000,
            ..ModelCapabilities::conservative()
        };
        let (text, _) = build_history(&ctx, &tiny, &TokenEstimator::standalone());
        assert!(text.contains("earlier turn(s) omitted"));
        // Newest turn always survives.
        assert!(text.contains("turn body 7"));
        assert!(!text.contains("turn body 0"));
    }

    #[test]
    fn inherited_model_comes_from_latest_assistant_turn() {
        let ctx = thread_with(vec![
            turn(Role::User, "q1", TurnMeta::default()),
            turn(
                Role::Assistant,
                "a1",
                TurnMeta {
                    model_name: Some("flash".into()),
                    ..Default::default()
                },
            ),
            turn(Role::User, "q2", TurnMeta::default()),
            turn(
                Role::Assistant,
                "a2",
                TurnMeta {
                    model_name: Some("o3".into()),
                    ..Default::default()
                },
            ),
        ]);
        assert_eq!(inherited_model(&ctx), Some("o3".into()));
    }

    #[test]
    fn follow_up_instructions_switch_near_the_limit() {
        let normal = follow_up_instructions(3, None);
        assert!(normal.contains("continuation_id"));
        let last = follow_up_instructions(MAX_CONVERSATION_TURNS - 1, None);
        assert!(last.contains("Do NOT include any follow-up questions"));
    }

    #[test]
    fn add_turn_then_rebuild_contains_new_turn_once() {
        let mut ctx = thread_with(vec![turn(Role::User, "alpha", TurnMeta::default())]);
        let est = TokenEstimator::standalone();
        let (first, _) = build_history(&ctx, &caps(), &est);
        assert_eq!(first.matches("alpha").count(), 1);
        ctx.turns
            .push(turn(Role::Assistant, "bravo-unique", TurnMeta::default()));
        let (second, _) = build_history(&ctx, &caps(), &est);
        assert_eq!(second.matches("bravo-unique").count(), 1);
    }
}
