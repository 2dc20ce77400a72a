//! Engine behaviour through the public API, with a scripted provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use counsel_budget::TokenEstimator;
use counsel_cache::CacheManager;
use counsel_conversation::{ConversationStore, Role};
use counsel_providers::{ModelProvider, ModelResolver, ProviderRegistry};
use counsel_tools::{CallContext, ToolEnv};
use counsel_types::{
    GenerationRequest, GenerationResponse, ModelCapabilities, ProviderError, TokenUsage,
    ToolCategory,
};
use counsel_workflow::{DebugTool, PlannerTool, WorkflowEngine};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct MockProvider {
    calls: AtomicUsize,
    response: std::sync::Mutex<Result<String, String>>,
}

impl MockProvider {
    fn answering(content: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: std::sync::Mutex::new(Ok(content.to_string())),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: std::sync::Mutex::new(Err(message.to_string())),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn known_models(&self) -> Vec<String> {
        vec!["mock-model".into()]
    }

    fn supports_model(&self, model: &str) -> bool {
        model == "mock-model"
    }

    fn capabilities(&self, model: &str) -> Option<ModelCapabilities> {
        self.supports_model(model)
            .then(ModelCapabilities::conservative)
    }

    fn preferred_model(&self, _category: ToolCategory) -> Option<String> {
        Some("mock-model".into())
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<GenerationResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.response.lock().unwrap().clone() {
            Ok(content) => Ok(GenerationResponse {
                content,
                model_name: "mock-model".into(),
                provider_name: "mock".into(),
                usage: TokenUsage::default(),
            }),
            Err(message) => Err(ProviderError::ServiceUnavailable(message)),
        }
    }
}

fn env_with(provider: Arc<MockProvider>) -> ToolEnv {
    let caches = Arc::new(CacheManager::new());
    let registry = Arc::new(ProviderRegistry::with_providers(vec![provider]));
    ToolEnv {
        resolver: Arc::new(ModelResolver::new(registry, caches.validation())),
        store: Arc::new(ConversationStore::new()),
        estimator: TokenEstimator::new(caches.token()),
        caches,
    }
}

fn call_with_model(env: &ToolEnv, continuation: Option<Uuid>) -> CallContext {
    let resolved = env
        .resolver
        .resolve("mock-model", "debug", ToolCategory::ExtendedReasoning)
        .unwrap();
    CallContext {
        resolved: Some(resolved),
        continuation_id: continuation,
        remaining_tokens: None,
        cancel: CancellationToken::new(),
    }
}

fn step_args(step_number: u32, total: u32, next_required: bool, findings: &str) -> Value {
    json!({
        "step": format!("step {step_number} of the investigation"),
        "step_number": step_number,
        "total_steps": total,
        "next_step_required": next_required,
        "findings": findings,
    })
}

fn continuation_of(envelope: &Value) -> Uuid {
    envelope["continuation_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn intermediate_step_pauses_without_provider_call() {
    let provider = MockProvider::answering("unused");
    let env = env_with(Arc::clone(&provider));
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut args = step_args(1, 3, true, "symptom X");
    args["relevant_files"] = json!(["/tmp/a.py"]);
    args["confidence"] = json!("low");

    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &args)
        .await;

    assert_eq!(envelope["status"], "pause_for_debug");
    assert_eq!(envelope["debug_required"], true);
    assert!(!envelope["required_actions"].as_array().unwrap().is_empty());
    assert_eq!(envelope["debug_status"]["relevant_files"], 1);
    // Paths are referenced, content is not embedded.
    assert_eq!(envelope["relevant_files"][0], "/tmp/a.py");
    assert_eq!(provider.call_count(), 0);

    // The step was recorded as a user turn.
    let thread = env.store.get(continuation_of(&envelope)).await.unwrap();
    assert_eq!(thread.turns.len(), 1);
    assert_eq!(thread.turns[0].role, Role::User);
}

#[tokio::test]
async fn three_step_flow_ends_in_expert_analysis() {
    let provider = MockProvider::answering(r#"{"status": "analysis_complete", "verdict": "confirmed"}"#);
    let env = env_with(Arc::clone(&provider));
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut args = step_args(1, 3, true, "symptom X");
    args["relevant_files"] = json!(["/tmp/a.py"]);
    let first = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &args)
        .await;
    let thread_id = continuation_of(&first);

    let second = engine
        .execute_step(
            &debug,
            &env,
            &call_with_model(&env, Some(thread_id)),
            &step_args(2, 3, true, "narrowed to func_g"),
        )
        .await;
    assert_eq!(second["status"], "pause_for_debug");

    let mut final_args = step_args(3, 3, false, "root cause: stale import cache");
    final_args["confidence"] = json!("high");
    let third = engine
        .execute_step(&debug, &env, &call_with_model(&env, Some(thread_id)), &final_args)
        .await;

    assert_eq!(third["status"], "debug_complete");
    assert_eq!(third["expert_analysis"]["verdict"], "confirmed");
    assert_eq!(third["complete_debug"]["steps_taken"], 3);
    assert_eq!(provider.call_count(), 1);

    // 3 user turns plus the expert's assistant turn.
    let thread = env.store.get(thread_id).await.unwrap();
    assert_eq!(thread.turns.len(), 4);
    let roles: Vec<Role> = thread.turns.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::User, Role::User, Role::Assistant]
    );
    assert_eq!(
        thread.turns[3].meta.model_name.as_deref(),
        Some("mock-model")
    );
}

#[tokio::test]
async fn certain_confidence_skips_the_expert() {
    let provider = MockProvider::answering("unused");
    let env = env_with(Arc::clone(&provider));
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut args = step_args(1, 1, false, "confirmed: null deref at L44");
    args["confidence"] = json!("certain");
    args["hypothesis"] = json!("null deref");

    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &args)
        .await;

    assert_eq!(envelope["status"], "certain_confidence_proceed_with_fix");
    assert_eq!(envelope["skip_expert_analysis"], true);
    assert_eq!(
        envelope["expert_analysis"]["status"],
        "skipped_due_to_certain_confidence"
    );
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn backtrack_truncates_and_replays() {
    let provider = MockProvider::answering("unused");
    let env = env_with(Arc::clone(&provider));
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut first = step_args(1, 3, true, "symptom X");
    first["relevant_files"] = json!(["/tmp/a.py"]);
    first["files_checked"] = json!(["/tmp/a.py"]);
    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &first)
        .await;
    let thread_id = continuation_of(&envelope);

    let mut second = step_args(2, 3, true, "suspect /tmp/b.py");
    second["relevant_files"] = json!(["/tmp/b.py"]);
    second["files_checked"] = json!(["/tmp/b.py"]);
    engine
        .execute_step(&debug, &env, &call_with_model(&env, Some(thread_id)), &second)
        .await;

    // Wrong lead: redo step 2 from scratch.
    let mut redo = step_args(2, 3, true, "wrong lead: b.py unrelated");
    redo["backtrack_from_step"] = json!(2);
    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, Some(thread_id)), &redo)
        .await;

    // Step 1's file survives, the discarded step's file does not.
    let relevant: Vec<&str> = envelope["relevant_files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(relevant.contains(&"/tmp/a.py"));
    assert!(!relevant.contains(&"/tmp/b.py"));
    assert_eq!(envelope["debug_status"]["files_checked"], 1);
}

#[tokio::test]
async fn backtrack_from_step_one_resets_everything() {
    let provider = MockProvider::answering("unused");
    let env = env_with(provider);
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut first = step_args(1, 2, true, "initial direction");
    first["relevant_files"] = json!(["/tmp/a.py"]);
    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &first)
        .await;
    let thread_id = continuation_of(&envelope);

    let mut restart = step_args(1, 2, true, "fresh start");
    restart["backtrack_from_step"] = json!(1);
    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, Some(thread_id)), &restart)
        .await;

    // Only the fresh step remains.
    assert_eq!(envelope["debug_status"]["relevant_files"], 0);
    assert_eq!(envelope["debug_status"]["files_checked"], 0);
}

#[tokio::test]
async fn provider_failure_surfaces_as_error_without_assistant_turn() {
    let provider = MockProvider::failing("upstream melted");
    let env = env_with(Arc::clone(&provider));
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut args = step_args(1, 1, false, "done investigating");
    args["relevant_files"] = json!(["/tmp/a.py"]);
    args["confidence"] = json!("high");

    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &args)
        .await;

    assert_eq!(envelope["status"], "error");
    assert!(envelope["content"].as_str().unwrap().contains("upstream melted"));
    assert_eq!(provider.call_count(), 1);

    let thread = env.store.get(continuation_of(&envelope)).await.unwrap();
    assert!(thread.turns.iter().all(|t| t.role == Role::User));
}

#[tokio::test]
async fn non_json_expert_response_is_wrapped() {
    let provider = MockProvider::answering("The root cause is the stale cache.");
    let env = env_with(Arc::clone(&provider));
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut args = step_args(1, 1, false, "done");
    args["relevant_files"] = json!(["/tmp/a.py"]);
    args["confidence"] = json!("high");

    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &args)
        .await;

    assert_eq!(envelope["status"], "debug_complete");
    assert_eq!(envelope["expert_analysis"]["status"], "analysis_complete");
    assert_eq!(
        envelope["expert_analysis"]["parse_error"],
        "Response was not valid JSON"
    );
    assert!(envelope["expert_analysis"]["raw_analysis"]
        .as_str()
        .unwrap()
        .contains("stale cache"));
}

#[tokio::test]
async fn expert_files_required_status_is_promoted() {
    let provider = MockProvider::answering(
        r#"{"status": "files_required_to_continue", "raw_analysis": "need /tmp/other.py"}"#,
    );
    let env = env_with(provider);
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut args = step_args(1, 1, false, "done");
    args["relevant_files"] = json!(["/tmp/a.py"]);
    args["confidence"] = json!("high");

    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &args)
        .await;

    assert_eq!(envelope["status"], "files_required_to_continue");
    assert!(envelope.get("expert_analysis").is_none());
    assert_eq!(
        envelope["next_steps"],
        "Provide the requested files and continue the analysis."
    );
}

#[tokio::test]
async fn planner_completes_without_any_provider() {
    let provider = MockProvider::answering("unused");
    let env = env_with(Arc::clone(&provider));
    let engine = WorkflowEngine::new();
    let planner = PlannerTool::new();

    let args = step_args(1, 1, false, "plan: three phases, rollout last");
    let envelope = engine
        .execute_step(&planner, &env, &call_with_model(&env, None), &args)
        .await;

    assert_eq!(envelope["status"], "planner_complete");
    assert!(envelope["complete_planner"]["work_summary"]
        .as_str()
        .unwrap()
        .contains("PLANNER WORK SUMMARY"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn invalid_step_is_rejected_synchronously() {
    let provider = MockProvider::answering("unused");
    let env = env_with(provider);
    let engine = WorkflowEngine::new();
    let debug = DebugTool::new();

    let mut args = step_args(1, 1, true, "findings");
    args["findings"] = json!("");
    let envelope = engine
        .execute_step(&debug, &env, &call_with_model(&env, None), &args)
        .await;
    assert_eq!(envelope["status"], "error");
    // No thread was mutated for the invalid step.
    assert!(env.store.is_empty().await);
}
