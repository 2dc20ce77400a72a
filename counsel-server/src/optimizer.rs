//! The two-stage mode optimizer: rule-based `select_mode` and the shared
//! minimal-request builder behind `execute_mode` and the legacy names.
//!
//! Selection is pure keyword scoring, with no model call. Primary keywords
//! weigh 3, secondary weigh 1; ties break toward the lexicographically
//! first mode; nothing matching defaults to `chat`.

use counsel_cache::SchemaCache;
use serde_json::{json, Value};

use crate::catalogue::Catalogue;

/// Execution complexity advertised by `select_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    /// One-shot request shape.
    Simple,
    /// Step-driven workflow shape.
    Workflow,
}

impl Complexity {
    /// The wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Workflow => "workflow",
        }
    }
}

struct ModeKeywords {
    mode: &'static str,
    description: &'static str,
    primary: &'static [&'static str],
    secondary: &'static [&'static str],
}

// Lexicographic mode order; selection scans in this order so ties resolve
// deterministically.
const MODES: &[ModeKeywords] = &[
    ModeKeywords {
        mode: "analyze",
        description: "Comprehensive code analysis for architecture, patterns, and improvements",
        primary: &["architecture", "design review", "architectural", "system design", "structure"],
        secondary: &["analyze", "understand", "explain", "pattern", "codebase", "examine"],
    },
    ModeKeywords {
        mode: "chat",
        description: "General AI consultation and brainstorming",
        primary: &["explain", "tell me", "what is", "how to", "help me understand"],
        secondary: &["help", "general", "brainstorm", "idea", "question"],
    },
    ModeKeywords {
        mode: "codereview",
        description: "Code review workflow for quality, security, performance, and architecture",
        primary: &["code review", "pr review", "pull request", "review code"],
        secondary: &["review", "check", "quality", "standards", "assess code"],
    },
    ModeKeywords {
        mode: "consensus",
        description: "Multi-model consensus for complex decisions and architectural choices",
        primary: &["should we", "decision", "choice", "approach", "which is better", "vs", "or"],
        secondary: &["consensus", "compare", "decide", "evaluate options", "pros cons"],
    },
    ModeKeywords {
        mode: "debug",
        description: "Systematic debugging and root cause analysis for bugs, errors, performance issues",
        primary: &["error", "bug", "broken", "crash", "fail", "exception"],
        secondary: &["fix", "issue", "problem", "debug", "troubleshoot", "not working"],
    },
    ModeKeywords {
        mode: "planner",
        description: "Sequential task planning and breakdown",
        primary: &["create plan", "plan for", "planning", "roadmap", "strategy"],
        secondary: &["breakdown", "steps", "how to implement", "approach"],
    },
    ModeKeywords {
        mode: "refactor",
        description: "Refactoring analysis and code improvement recommendations",
        primary: &["refactor", "restructure", "modernize"],
        secondary: &["improve", "clean up", "optimize code", "simplify", "better practices"],
    },
    ModeKeywords {
        mode: "secaudit",
        description: "Security audit and vulnerability assessment",
        primary: &["security audit", "vulnerability", "auth", "authentication", "security review"],
        secondary: &["encryption", "safe", "exploit", "secure", "injection", "xss"],
    },
    ModeKeywords {
        mode: "testgen",
        description: "Test generation with edge case coverage",
        primary: &["generate tests", "test generation", "write tests"],
        secondary: &["test", "testing", "coverage", "edge case", "unit test"],
    },
    ModeKeywords {
        mode: "tracer",
        description: "Code tracing and dependency analysis",
        primary: &["trace", "execution flow", "call chain", "dependency graph"],
        secondary: &["flow", "execution", "dependency", "follows", "path"],
    },
];

const WORKFLOW_INDICATORS: &[&str] = &[
    "step", "systematic", "comprehensive", "thorough", "complete", "full", "entire", "all",
];
const COMPLEX_INDICATORS: &[&str] = &[
    "complex", "difficult", "advanced", "expert", "production", "critical", "important",
];

fn score_mode(keywords: &ModeKeywords, task: &str) -> (u32, Vec<String>) {
    let mut score = 0;
    let mut matched = Vec::new();
    for keyword in keywords.primary {
        if task.contains(keyword) {
            score += 3;
            matched.push((*keyword).to_string());
        }
    }
    for keyword in keywords.secondary {
        if task.contains(keyword) {
            score += 1;
            matched.push((*keyword).to_string());
        }
    }
    (score, matched)
}

/// Derive complexity from hints and the task text.
///
/// Explicit hints win, then keyword cues, then the mode's default shape
/// (investigation modes default to workflow, conversational modes to
/// simple).
pub fn derive_complexity(
    mode: &str,
    context_size: Option<&str>,
    confidence: Option<&str>,
    task: &str,
) -> Complexity {
    if WORKFLOW_INDICATORS.iter().any(|i| task.contains(i))
        || COMPLEX_INDICATORS.iter().any(|i| task.contains(i))
    {
        return Complexity::Workflow;
    }
    match context_size {
        Some("comprehensive") => return Complexity::Workflow,
        Some("minimal") => return Complexity::Simple,
        _ => {}
    }
    match confidence {
        Some("exploring") => return Complexity::Workflow,
        Some("high") => return Complexity::Simple,
        _ => {}
    }
    match mode {
        "debug" | "codereview" | "secaudit" | "analyze" => Complexity::Workflow,
        "chat" | "consensus" => Complexity::Simple,
        _ => Complexity::Simple,
    }
}

fn selection_confidence(best_score: u32) -> &'static str {
    if best_score >= 3 {
        "high"
    } else if best_score >= 2 {
        "medium"
    } else {
        "low"
    }
}

/// Stage one: pick a mode and complexity for a task description.
///
/// Pure function of its inputs: identical input yields the identical
/// envelope.
pub fn select_mode(args: &Value, catalogue: &Catalogue, schemas: &SchemaCache) -> Value {
    let Some(task) = args.get("task_description").and_then(|v| v.as_str()) else {
        return json!({
            "status": "error",
            "content": "select_mode requires 'task_description'",
        });
    };
    let task = task.to_ascii_lowercase();
    let context_size = args.get("context_size").and_then(|v| v.as_str());
    let confidence_level = args.get("confidence_level").and_then(|v| v.as_str());

    let mut best: Option<(&ModeKeywords, u32, Vec<String>)> = None;
    let mut alternatives = Vec::new();
    for keywords in MODES {
        let (score, matched) = score_mode(keywords, &task);
        if score > 0 {
            alternatives.push(json!({
                "mode": keywords.mode,
                "score": score,
                "description": keywords.description,
            }));
        }
        // Strictly-greater keeps the lexicographically first mode on ties.
        if score > best.as_ref().map(|(_, s, _)| *s).unwrap_or(0) {
            best = Some((keywords, score, matched));
        }
    }

    let (selected, score, matched) = match best {
        Some((keywords, score, matched)) => (keywords, score, matched),
        None => {
            let chat = MODES
                .iter()
                .find(|m| m.mode == "chat")
                .unwrap_or(&MODES[0]);
            (chat, 0, Vec::new())
        }
    };

    let complexity = derive_complexity(selected.mode, context_size, confidence_level, &task);
    let required_schema = mode_schema(selected.mode, complexity, catalogue, schemas);
    let example = working_example(selected.mode, complexity);

    json!({
        "status": "mode_selected",
        "selected_mode": selected.mode,
        "complexity": complexity.as_str(),
        "description": selected.description,
        "confidence": selection_confidence(score),
        "matched_keywords": matched,
        "required_schema": required_schema,
        "working_example": example,
        "next_step": {
            "tool": "execute_mode",
            "instruction": format!(
                "Use 'execute_mode' with mode='{}' and complexity='{}'",
                selected.mode,
                complexity.as_str()
            ),
            "exact_command": {
                "tool": "execute_mode",
                "arguments": {
                    "mode": selected.mode,
                    "complexity": complexity.as_str(),
                    "request": example["request"].clone(),
                },
            },
        },
        "alternatives": alternatives,
    })
}

fn mode_schema(
    mode: &str,
    complexity: Complexity,
    catalogue: &Catalogue,
    schemas: &SchemaCache,
) -> Value {
    // One shape per logical tool: the schema is the concrete tool's
    // schema; the complexity only signals which fields matter most.
    let _ = complexity;
    catalogue
        .schema(mode, schemas)
        .unwrap_or_else(|| json!({"type": "object"}))
}

fn working_example(mode: &str, complexity: Complexity) -> Value {
    let request = match (mode, complexity) {
        ("chat", _) => json!({"prompt": "Explain the trade-offs of REST vs GraphQL."}),
        ("consensus", _) => json!({
            "prompt": "Should we adopt GraphQL for the public API?",
            "models": [
                {"model": "o3", "stance": "for"},
                {"model": "flash", "stance": "against"},
            ],
        }),
        (mode, Complexity::Workflow) => json!({
            "step": format!("Begin the {mode} investigation"),
            "step_number": 1,
            "total_steps": 3,
            "next_step_required": true,
            "findings": "Initial observations go here",
            "relevant_files": ["/absolute/path/to/file"],
        }),
        (mode, Complexity::Simple) => json!({
            "step": format!("One-shot {mode} request"),
            "step_number": 1,
            "total_steps": 1,
            "next_step_required": false,
            "findings": "What you already know",
            "relevant_files": ["/absolute/path/to/file"],
        }),
    };
    json!({
        "mode": mode,
        "complexity": complexity.as_str(),
        "request": request,
    })
}

/// Fabricate the minimal valid workflow request for a mode from a prose
/// request, shared by `execute_mode` and the legacy tool names.
///
/// Only derivable fields are filled; a request with no usable text is an
/// error rather than a silently-defaulted call.
pub fn minimal_workflow_args(mode: &str, request: &Value) -> Result<Value, String> {
    if request.get("step").and_then(|v| v.as_str()).is_some() {
        // Already workflow-shaped; pass through untouched.
        return Ok(request.clone());
    }
    let text = ["prompt", "problem", "task", "task_description"]
        .iter()
        .find_map(|key| request.get(*key).and_then(|v| v.as_str()))
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            format!(
                "{mode} requires either workflow fields (step, step_number, ...) or a \
                 'prompt' describing the request"
            )
        })?;

    let mut args = json!({
        "step": text,
        "step_number": 1,
        "total_steps": 1,
        "next_step_required": false,
        "findings": format!("Initial request: {text}"),
    });
    for key in ["files", "relevant_files", "model", "images", "continuation_id", "target"] {
        if let Some(value) = request.get(key) {
            args[if key == "files" { "relevant_files" } else { key }] = value.clone();
        }
    }
    Ok(args)
}
