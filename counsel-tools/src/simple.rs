//! One-shot tools: chat, consensus, listmodels, version.

use std::path::PathBuf;

use async_trait::async_trait;
use counsel_budget::TokenAllocation;
use counsel_cache::SchemaCache;
use counsel_conversation::{Role, TurnMeta};
use counsel_files::{read_files, ReadOptions};
use counsel_providers::{parse_model_option, timeout_for};
use counsel_types::{GenerationRequest, ThinkingMode, ToolCategory, ToolOutput};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::descriptor::ToolDescriptor;
use crate::env::{CallContext, ToolEnv};
use crate::prompts::system_prompt;
use crate::schema::{build_schema, SchemaOverrides};
use crate::SERVER_VERSION;

/// A tool that answers in a single request/response exchange.
#[async_trait]
pub trait SimpleTool: Send + Sync {
    /// The tool's immutable descriptor.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Human-readable description advertised to clients.
    fn description(&self) -> &'static str;

    /// Input schema, served from the schema cache.
    fn input_schema(&self, cache: &SchemaCache) -> Value;

    /// Execute against the shared environment and per-call context.
    async fn execute(&self, env: &ToolEnv, call: &CallContext, args: &Value) -> ToolOutput;
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn string_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn thinking_mode_arg(args: &Value) -> ThinkingMode {
    args.get("thinking_mode")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

fn temperature_arg(args: &Value, default: f32) -> f32 {
    args.get("temperature")
        .and_then(|v| v.as_f64())
        .map(|t| t.clamp(0.0, 1.0) as f32)
        .unwrap_or(default)
}

/// Ensure a thread exists, appending the user turn when this call created
/// it. Returns the thread id for the response envelope.
async fn ensure_thread(
    env: &ToolEnv,
    call: &CallContext,
    tool_name: &str,
    args: &Value,
    user_content: &str,
    files: &[String],
) -> Uuid {
    match call.continuation_id {
        Some(id) => id,
        None => {
            let id = env.store.create(tool_name, args, None).await;
            let added = env
                .store
                .add_turn(
                    id,
                    Role::User,
                    user_content,
                    TurnMeta {
                        tool_name: Some(tool_name.to_string()),
                        files: files.to_vec(),
                        images: string_list(args, "images"),
                        ..Default::default()
                    },
                )
                .await;
            if !added {
                warn!(thread = %id, "failed to record initial user turn");
            }
            id
        }
    }
}

// ---- chat -------------------------------------------------------------------

/// General consultation: one prompt, optional files, one model response.
pub struct ChatTool {
    descriptor: ToolDescriptor,
}

impl ChatTool {
    /// Create the chat tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::simple("chat", ToolCategory::FastResponse),
        }
    }
}

impl Default for ChatTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimpleTool for ChatTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "General AI consultation and brainstorming. Provide a prompt and optional files; \
         returns a single response plus a continuation_id for follow-ups."
    }

    fn input_schema(&self, cache: &SchemaCache) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "prompt".into(),
            json!({"type": "string", "description": "Your question or idea to discuss."}),
        );
        build_schema(
            &self.descriptor,
            SchemaOverrides {
                properties,
                required: vec!["prompt"],
            },
            cache,
        )
    }

    async fn execute(&self, env: &ToolEnv, call: &CallContext, args: &Value) -> ToolOutput {
        let Some(prompt) = string_arg(args, "prompt").filter(|p| !p.trim().is_empty()) else {
            return ToolOutput::error("chat requires a non-empty 'prompt'");
        };
        let Some(resolved) = call.resolved.as_ref() else {
            return ToolOutput::error("chat requires a resolved model");
        };

        let files = string_list(args, "files");
        let mut body = String::new();
        if !files.is_empty() {
            let allocation = TokenAllocation::for_window(resolved.capabilities.context_window);
            let budget = call.remaining_tokens.unwrap_or(allocation.file_tokens);
            body.push_str(&read_files(
                &files,
                budget,
                0,
                ReadOptions::default(),
                &env.estimator,
            ));
            body.push_str("\n\n");
        }
        body.push_str(&prompt);

        let request = GenerationRequest {
            model_name: resolved.name.clone(),
            prompt: body,
            system_prompt: system_prompt(self.descriptor.system_prompt_id).to_string(),
            temperature: temperature_arg(args, self.descriptor.default_temperature),
            thinking_mode: thinking_mode_arg(args),
            max_output_tokens: None,
            images: string_list(args, "images").into_iter().map(PathBuf::from).collect(),
        };

        let thread_id =
            ensure_thread(env, call, self.descriptor.name, args, &prompt, &files).await;

        let response = match resolved
            .provider
            .generate(&request, timeout_for(self.descriptor.category), &call.cancel)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(%err, "chat provider call failed");
                return ToolOutput::error(err.to_string())
                    .with_metadata(json!({"tool_name": "chat", "model_name": resolved.name}));
            }
        };

        env.store
            .add_turn(
                thread_id,
                Role::Assistant,
                response.content.clone(),
                TurnMeta {
                    tool_name: Some(self.descriptor.name.to_string()),
                    model_name: Some(response.model_name.clone()),
                    model_provider: Some(response.provider_name.clone()),
                    files,
                    images: vec![],
                },
            )
            .await;

        ToolOutput::success(response.content)
            .with_continuation(thread_id.to_string())
            .with_metadata(json!({
                "tool_name": "chat",
                "model_name": response.model_name,
                "provider": response.provider_name,
                "usage": {
                    "input_tokens": response.usage.input_tokens,
                    "output_tokens": response.usage.output_tokens,
                },
            }))
    }
}

// ---- consensus --------------------------------------------------------------

/// Fan one proposal out to several models, each with an optional stance.
///
/// The `models` array is the contract: it must be non-empty and name every
/// model to consult; prior turns are never mined for models.
pub struct ConsensusTool {
    descriptor: ToolDescriptor,
}

impl ConsensusTool {
    /// Create the consensus tool.
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::simple("consensus", ToolCategory::ExtendedReasoning),
        }
    }
}

impl Default for ConsensusTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimpleTool for ConsensusTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Multi-model consensus on a proposal or decision. Requires a non-empty 'models' \
         array; each entry may carry a stance (for/against/neutral)."
    }

    fn input_schema(&self, cache: &SchemaCache) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "prompt".into(),
            json!({"type": "string", "description": "The proposal or question to evaluate."}),
        );
        properties.insert(
            "models".into(),
            json!({
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "model": {"type": "string"},
                        "stance": {"type": "string", "enum": ["for", "against", "neutral"]},
                    },
                    "required": ["model"],
                },
                "description": "Models to consult; this list is required and never inferred.",
            }),
        );
        build_schema(
            &self.descriptor,
            SchemaOverrides {
                properties,
                required: vec!["prompt", "models"],
            },
            cache,
        )
    }

    async fn execute(&self, env: &ToolEnv, call: &CallContext, args: &Value) -> ToolOutput {
        let Some(prompt) = string_arg(args, "prompt").filter(|p| !p.trim().is_empty()) else {
            return ToolOutput::error("consensus requires a non-empty 'prompt'");
        };
        let entries = args.get("models").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        if entries.is_empty() {
            return ToolOutput::error(
                "consensus requires a non-empty 'models' array naming the models to consult",
            );
        }

        let files = string_list(args, "files");
        let thread_id =
            ensure_thread(env, call, self.descriptor.name, args, &prompt, &files).await;

        let mut responses = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(model_str) = entry.get("model").and_then(|v| v.as_str()) else {
                responses.push(json!({"status": "error", "error": "entry missing 'model'"}));
                continue;
            };
            let (_, parsed_stance) = parse_model_option(model_str);
            let stance = entry
                .get("stance")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .or(parsed_stance)
                .unwrap_or_else(|| "neutral".to_string());

            let resolved = match env.resolver.resolve(
                model_str,
                self.descriptor.name,
                self.descriptor.category,
            ) {
                Ok(resolved) => resolved,
                Err(message) => {
                    responses.push(json!({
                        "model": model_str,
                        "stance": stance,
                        "status": "error",
                        "error": message,
                    }));
                    continue;
                }
            };

            let request = GenerationRequest {
                model_name: resolved.name.clone(),
                prompt: format!("Stance: {stance}\n\nProposal:\n{prompt}"),
                system_prompt: system_prompt(self.descriptor.system_prompt_id).to_string(),
                temperature: temperature_arg(args, self.descriptor.default_temperature),
                thinking_mode: thinking_mode_arg(args),
                max_output_tokens: None,
                images: vec![],
            };
            match resolved
                .provider
                .generate(&request, timeout_for(self.descriptor.category), &call.cancel)
                .await
            {
                Ok(response) => responses.push(json!({
                    "model": resolved.name,
                    "stance": stance,
                    "status": "success",
                    "verdict": response.content,
                })),
                Err(err) => responses.push(json!({
                    "model": resolved.name,
                    "stance": stance,
                    "status": "error",
                    "error": err.to_string(),
                })),
            }
        }

        let succeeded = responses
            .iter()
            .filter(|r| r["status"] == "success")
            .count();
        let document = json!({
            "proposal": prompt,
            "models_consulted": responses.len(),
            "models_succeeded": succeeded,
            "responses": responses,
        });
        let content = serde_json::to_string_pretty(&document)
            .unwrap_or_else(|_| document.to_string());

        env.store
            .add_turn(
                thread_id,
                Role::Assistant,
                content.clone(),
                TurnMeta {
                    tool_name: Some(self.descriptor.name.to_string()),
                    ..Default::default()
                },
            )
            .await;

        let mut output = ToolOutput::success(content).with_continuation(thread_id.to_string());
        output.content_type = counsel_types::ContentType::Json;
        output.with_metadata(json!({"tool_name": "consensus", "models_succeeded": succeeded}))
    }
}

// ---- listmodels -------------------------------------------------------------

/// Enumerate configured providers and the models they serve.
pub struct ListModelsTool {
    descriptor: ToolDescriptor,
}

impl ListModelsTool {
    /// Create the listmodels tool.
    pub fn new() -> Self {
        let mut descriptor = ToolDescriptor::simple("listmodels", ToolCategory::FastResponse);
        descriptor.requires_model = false;
        Self { descriptor }
    }
}

impl Default for ListModelsTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimpleTool for ListModelsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "List configured providers and the models currently available, in resolution \
         priority order."
    }

    fn input_schema(&self, cache: &SchemaCache) -> Value {
        build_schema(&self.descriptor, SchemaOverrides::default(), cache)
    }

    async fn execute(&self, env: &ToolEnv, _call: &CallContext, _args: &Value) -> ToolOutput {
        let registry = env.resolver.registry();
        let mut lines = vec!["Configured providers (priority order):".to_string()];
        for name in registry.provider_names() {
            lines.push(format!("- {name}"));
        }
        lines.push(String::new());
        lines.push("Available models:".to_string());
        for (model, provider) in registry.available_models() {
            lines.push(format!("- {model} ({provider})"));
        }
        ToolOutput::success(lines.join("\n")).with_metadata(json!({
            "providers": registry.provider_names(),
        }))
    }
}

// ---- version ----------------------------------------------------------------

/// Report the server version and the advertised tool inventory.
pub struct VersionTool {
    descriptor: ToolDescriptor,
    tool_names: Vec<String>,
}

impl VersionTool {
    /// Create the version tool over the assembled catalogue's tool names.
    pub fn new(tool_names: Vec<String>) -> Self {
        let mut descriptor = ToolDescriptor::simple("version", ToolCategory::FastResponse);
        descriptor.requires_model = false;
        Self {
            descriptor,
            tool_names,
        }
    }
}

#[async_trait]
impl SimpleTool for VersionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn description(&self) -> &'static str {
        "Server version, and the tools this instance advertises."
    }

    fn input_schema(&self, cache: &SchemaCache) -> Value {
        build_schema(&self.descriptor, SchemaOverrides::default(), cache)
    }

    async fn execute(&self, _env: &ToolEnv, _call: &CallContext, _args: &Value) -> ToolOutput {
        let content = format!(
            "counsel {SERVER_VERSION}\nTools: {}",
            self.tool_names.join(", ")
        );
        ToolOutput::success(content).with_metadata(json!({
            "version": SERVER_VERSION,
            "tools": self.tool_names,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_schema_requires_prompt() {
        let cache = SchemaCache::new();
        let schema = ChatTool::new().input_schema(&cache);
        assert_eq!(schema["required"], json!(["prompt"]));
    }

    #[test]
    fn consensus_schema_requires_models() {
        let cache = SchemaCache::new();
        let schema = ConsensusTool::new().input_schema(&cache);
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("models")));
        assert_eq!(schema["properties"]["models"]["minItems"], 1);
    }

    #[test]
    fn essential_tools_do_not_require_models() {
        assert!(!ListModelsTool::new().descriptor().requires_model);
        assert!(!VersionTool::new(vec![]).descriptor().requires_model);
    }

    #[test]
    fn temperature_arg_clamps_to_unit_range() {
        assert_eq!(temperature_arg(&json!({"temperature": 3.0}), 0.5), 1.0);
        assert_eq!(temperature_arg(&json!({"temperature": -1.0}), 0.5), 0.0);
        assert_eq!(temperature_arg(&json!({}), 0.5), 0.5);
    }

    #[test]
    fn thinking_mode_parses_from_args() {
        assert_eq!(
            thinking_mode_arg(&json!({"thinking_mode": "max"})),
            ThinkingMode::Max
        );
        assert_eq!(thinking_mode_arg(&json!({})), ThinkingMode::Medium);
    }
}
