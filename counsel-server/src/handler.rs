//! Top-level request dispatch.

use std::path::Path;
use std::sync::Arc;

use counsel_budget::{
    check_total_file_size, detect_content_kind, estimate_file_tokens, ContentKind,
    TokenAllocation,
};
use counsel_conversation::{build_history, follow_up_instructions, inherited_model, Role, TurnMeta};
use counsel_tools::CallContext;
use counsel_types::{RequestError, ToolOutput};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalogue::ToolHandle;
use crate::core::Core;
use crate::optimizer::{minimal_workflow_args, select_mode};

/// Dispatches inbound `{tool, arguments}` calls through the pipeline:
/// continuation reconstruction, model resolution, file pre-flight, and
/// tool execution.
pub struct RequestHandler {
    core: Arc<Core>,
}

impl RequestHandler {
    /// Handler over a shared core.
    pub fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// The underlying core.
    pub fn core(&self) -> &Arc<Core> {
        &self.core
    }

    /// Handle one tool call, returning the serialised response envelope.
    pub async fn handle_call_tool(&self, name: &str, arguments: Value) -> String {
        info!(tool = name, "tool call");
        self.maybe_spawn_cache_maintenance();

        let Some(handle) = self.core.catalogue.get(name).cloned() else {
            return serialize(&error_value(
                RequestError::UnknownTool(name.to_string()),
                json!({"tool_name": name}),
            ));
        };

        let envelope = match handle {
            ToolHandle::SelectMode => select_mode(
                &arguments,
                &self.core.catalogue,
                &self.core.env.caches.schema(),
            ),
            ToolHandle::ExecuteMode => self.execute_mode(&arguments).await,
            handle => self.dispatch(name, handle, arguments).await,
        };
        serialize(&envelope)
    }

    /// Stage two of the optimizer: route `{mode, complexity, request}` to
    /// the concrete tool.
    async fn execute_mode(&self, arguments: &Value) -> Value {
        let Some(mode) = arguments.get("mode").and_then(|v| v.as_str()) else {
            return to_value(ToolOutput::error("execute_mode requires 'mode'"));
        };
        let complexity = arguments
            .get("complexity")
            .and_then(|v| v.as_str())
            .unwrap_or("simple");
        let request = arguments.get("request").cloned().unwrap_or_else(|| json!({}));

        let Some(handle) = self.core.catalogue.get(mode).cloned() else {
            return to_value(
                ToolOutput::error(format!("Unknown mode: {mode}"))
                    .with_metadata(json!({"mode": mode})),
            );
        };

        match handle {
            ToolHandle::Simple(_) => {
                if complexity == "workflow" {
                    return to_value(ToolOutput::error(format!(
                        "mode '{mode}' only has a simple shape; call it with \
                         complexity='simple'"
                    )));
                }
                self.dispatch(mode, handle, request).await
            }
            ToolHandle::Workflow(_) => match minimal_workflow_args(mode, &request) {
                Ok(args) => self.dispatch(mode, handle, args).await,
                Err(message) => to_value(ToolOutput::error(message)),
            },
            _ => to_value(ToolOutput::error("meta tools cannot be nested")),
        }
    }

    /// The shared pipeline for concrete tools.
    async fn dispatch(&self, name: &str, handle: ToolHandle, mut arguments: Value) -> Value {
        let core = &self.core;
        let mut call = CallContext::new();

        let descriptor = match &handle {
            ToolHandle::Simple(tool) => tool.descriptor().clone(),
            ToolHandle::Workflow(behavior) => behavior.descriptor().clone(),
            _ => return to_value(ToolOutput::error("meta tools have no direct dispatch")),
        };

        // Legacy prose calls to workflow tools go through the shared
        // minimal-request builder instead of failing on missing fields.
        if matches!(handle, ToolHandle::Workflow(_))
            && arguments.get("step").and_then(|v| v.as_str()).is_none()
        {
            match minimal_workflow_args(name, &arguments) {
                Ok(args) => arguments = args,
                Err(message) => return to_value(ToolOutput::error(message)),
            }
        }

        // 1. Continuation reconstruction.
        let continuation = match self.reconstruct_continuation(&descriptor, &mut arguments, &mut call).await
        {
            Ok(snapshot) => snapshot,
            Err(envelope) => return envelope,
        };

        // 2. Model resolution and validation.
        if descriptor.requires_model {
            let model_string = arguments
                .get("model")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| core.config.default_model.clone());
            match core
                .env
                .resolver
                .resolve(&model_string, descriptor.name, descriptor.category)
            {
                Ok(resolved) => {
                    debug!(tool = name, model = resolved.name, "model resolved");
                    call.resolved = Some(resolved);
                }
                Err(message) => {
                    return error_value(
                        RequestError::ModelUnavailable(message),
                        json!({
                            "tool_name": name,
                            "requested_model": model_string,
                        }),
                    );
                }
            }
        }

        // 3. Continuation history folds into the prompt for simple tools.
        if let (Some(snapshot), ToolHandle::Simple(_)) = (&continuation, &handle) {
            self.enhance_prompt_with_history(snapshot, &mut arguments, &mut call);
        }

        // 4. File pre-flight against the resolved model: content types the
        // model cannot process reject the request outright, then the
        // strict size check runs over what remains. No partial inclusion.
        if let Some(resolved) = &call.resolved {
            let mut files: Vec<String> = Vec::new();
            for key in ["files", "relevant_files"] {
                if let Some(list) = arguments.get(key).and_then(|v| v.as_array()) {
                    files.extend(list.iter().filter_map(|v| v.as_str()).map(String::from));
                }
            }
            for file in &files {
                let path = Path::new(file);
                if matches!(
                    detect_content_kind(path),
                    ContentKind::Audio | ContentKind::Video
                ) {
                    if let Err(err) = estimate_file_tokens(
                        path,
                        &resolved.name,
                        &resolved.capabilities,
                        &core.env.estimator,
                    ) {
                        warn!(tool = name, file, "unsupported content type rejected");
                        return error_value(
                            RequestError::Estimate(err),
                            json!({"tool_name": name, "path": file, "model_name": resolved.name}),
                        );
                    }
                }
            }
            if let Some(rejection) =
                check_total_file_size(&files, &resolved.name, &resolved.capabilities)
            {
                warn!(tool = name, "file selection rejected as too large");
                return to_value(rejection);
            }
        }

        // 5. Execute. Transient underscore keys travel with the arguments
        // for the duration of the call; the store strips them on persist.
        let envelope = match &handle {
            ToolHandle::Simple(tool) => {
                to_value(tool.execute(&core.env, &call, &arguments).await)
            }
            ToolHandle::Workflow(behavior) => {
                core.engine
                    .execute_step(behavior.as_ref(), &core.env, &call, &arguments)
                    .await
            }
            _ => unreachable!("meta handles handled above"),
        };
        envelope
    }

    /// Fold a continuation id into the call: validate the thread, inherit
    /// the model, and (for simple tools) record the new user turn.
    async fn reconstruct_continuation(
        &self,
        descriptor: &counsel_tools::ToolDescriptor,
        arguments: &mut Value,
        call: &mut CallContext,
    ) -> Result<Option<counsel_conversation::ThreadContext>, Value> {
        let Some(raw) = arguments
            .get("continuation_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
        else {
            return Ok(None);
        };

        let Ok(id) = raw.parse::<Uuid>() else {
            return Err(error_value(
                RequestError::InvalidRequest(format!("'{raw}' is not a valid continuation_id")),
                Value::Null,
            ));
        };

        let Some(snapshot) = self.core.env.store.get(id).await else {
            return Err(error_value(
                RequestError::UnknownContinuation(format!(
                    "Conversation thread '{raw}' was not found or has expired. This may \
                     happen if the conversation was created more than 3 hours ago or if the \
                     server was restarted. Please restart the conversation by providing your \
                     full question/prompt without the continuation_id parameter."
                )),
                Value::Null,
            ));
        };

        call.continuation_id = Some(id);

        // Model inheritance: explicit model wins; otherwise the latest
        // assistant turn's model carries forward.
        if arguments.get("model").and_then(|v| v.as_str()).is_none() {
            if let Some(model) = inherited_model(&snapshot) {
                debug!(thread = %id, model, "model inherited from previous turn");
                arguments["model"] = json!(model);
            }
        }

        // The new user turn is recorded before history is built; the
        // history text itself comes from the pre-append snapshot, with the
        // new input carried separately under NEW USER INPUT.
        if let Some(prompt) = arguments.get("prompt").and_then(|v| v.as_str()) {
            if !prompt.is_empty() {
                let files: Vec<String> = arguments
                    .get("files")
                    .and_then(|v| v.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                self.core
                    .env
                    .store
                    .add_turn(
                        id,
                        Role::User,
                        prompt,
                        TurnMeta {
                            tool_name: Some(descriptor.name.to_string()),
                            files,
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }

        // Initial-context merge: the first call's arguments backfill
        // anything the continuation left out.
        if let (Some(initial), Some(args)) = (
            snapshot.initial_context.as_object(),
            arguments.as_object_mut(),
        ) {
            for (key, value) in initial {
                if !args.contains_key(key)
                    && !matches!(key.as_str(), "temperature" | "thinking_mode" | "model")
                {
                    args.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Some(snapshot))
    }

    /// Build the history block and rewrite `prompt` into the enhanced
    /// form, tracking the remaining content budget.
    fn enhance_prompt_with_history(
        &self,
        snapshot: &counsel_conversation::ThreadContext,
        arguments: &mut Value,
        call: &mut CallContext,
    ) {
        let Some(resolved) = call.resolved.as_ref() else {
            return;
        };
        let (history, history_tokens) = build_history(
            snapshot,
            &resolved.capabilities,
            &self.core.env.estimator,
        );
        let allocation = TokenAllocation::for_window(resolved.capabilities.context_window);
        call.remaining_tokens = Some(allocation.content_tokens.saturating_sub(history_tokens));

        let original = arguments
            .get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let follow_up = follow_up_instructions(snapshot.turns.len(), None);
        let enhanced = if history.is_empty() {
            format!("{original}\n{follow_up}")
        } else {
            format!("{history}\n\n=== NEW USER INPUT ===\n{original}\n{follow_up}")
        };
        arguments["_original_user_prompt"] = json!(original);
        arguments["prompt"] = json!(enhanced);
        arguments["_remaining_tokens"] = json!(call.remaining_tokens);
    }

    fn maybe_spawn_cache_maintenance(&self) {
        if self.core.env.caches.should_cleanup() {
            let caches = Arc::clone(&self.core.env.caches);
            tokio::spawn(async move {
                caches.cleanup_all();
            });
        }
    }
}

/// Render a pipeline failure as the uniform error envelope.
fn error_value(err: RequestError, metadata: Value) -> Value {
    let mut output = ToolOutput::error(err.to_string());
    if !metadata.is_null() {
        output = output.with_metadata(metadata);
    }
    to_value(output)
}

fn to_value(output: ToolOutput) -> Value {
    serde_json::to_value(&output).unwrap_or_else(|_| {
        json!({"status": "error", "content": "failed to serialise response"})
    })
}

fn serialize(envelope: &Value) -> String {
    serde_json::to_string_pretty(envelope).unwrap_or_else(|_| envelope.to_string())
}
