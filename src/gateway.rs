//! Language model gateway
//!
//! A single request/response call to an OpenAI-compatible chat endpoint
//! (Qwen3 on Alem.ai). No retries, no state; one long-lived reqwest::Client
//! for connection pooling. The trait seam exists so tests and the demo
//! binary can substitute a deterministic stub.

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::env;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_BASE_URL: &str = "https://llm.alem.ai/v1";
const DEFAULT_MODEL: &str = "qwen3";

/// Abstract completion capability consumed by the Orchestrator and the
/// responder agents: system instructions + user content in, text out.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Reusable Qwen3 client (connection-pooled, OpenAI-compatible wire format)
pub struct QwenClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl QwenClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Build a client from `ALEMAI_API_QWEN3_KEY` / `ALEMAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("ALEMAI_API_QWEN3_KEY").map_err(|_| {
            AgentError::GatewayUnavailable(
                "ALEMAI_API_QWEN3_KEY not found in environment".to_string(),
            )
        })?;
        let base_url =
            env::var("ALEMAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(api_key, base_url)
    }
}

#[async_trait]
impl LlmGateway for QwenClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AgentError::GatewayUnavailable(
                "API key is not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        };

        info!(model = %self.model, "Calling LLM API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("LLM API request failed: {}", e);
                AgentError::GatewayUnavailable(format!("LLM API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("LLM API error response ({}): {}", status, error_text);
            return Err(AgentError::GatewayUnavailable(format!(
                "LLM API returned {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse LLM response: {}", e);
            AgentError::MalformedResponse(format!("LLM parse error: {}", e))
        })?;

        let answer = chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AgentError::MalformedResponse("Empty response from LLM".to_string())
            })?;

        info!(chars = answer.len(), "LLM response received");

        Ok(answer)
    }
}

/// Strip a markdown ```json ... ``` fence the model sometimes wraps
/// around a structured reply.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

//
// ========== Deterministic stubs ==========
//

/// Gateway stub that replays a fixed sequence of responses.
/// Keeps the pipeline runnable without a live model (demo & tests).
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| AgentError::GatewayUnavailable("script lock poisoned".to_string()))?;

        replies.pop_front().ok_or_else(|| {
            AgentError::GatewayUnavailable("scripted gateway exhausted".to_string())
        })
    }
}

/// Gateway stub that simulates an unreachable model endpoint.
pub struct UnavailableGateway;

#[async_trait]
impl LlmGateway for UnavailableGateway {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Err(AgentError::GatewayUnavailable(
            "simulated outage".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "qwen3".to_string(),
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "Сколько стримов у артиста?".to_string(),
            }],
        };

        let json = serde_json::to_string(&request);
        assert!(json.is_ok());
        assert!(json.unwrap().contains("Сколько стримов"));
    }

    #[test]
    fn test_strip_code_fences() {
        let fenced = "```json\n{\"agent\": \"analytics\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"agent\": \"analytics\"}");

        let plain = "{\"agent\": \"general\"}";
        assert_eq!(strip_code_fences(plain), plain);
    }

    #[tokio::test]
    async fn test_scripted_gateway_replays_in_order() {
        let gateway = ScriptedGateway::new(vec!["first", "second"]);
        assert_eq!(gateway.complete("", "").await.unwrap(), "first");
        assert_eq!(gateway.complete("", "").await.unwrap(), "second");
        assert!(matches!(
            gateway.complete("", "").await,
            Err(AgentError::GatewayUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_gateway() {
        let gateway = UnavailableGateway;
        assert!(matches!(
            gateway.complete("x", "y").await,
            Err(AgentError::GatewayUnavailable(_))
        ));
    }
}
