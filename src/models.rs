//! Core data models for the catalog agent

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

//
// ================= Enums =================
//

/// Closed set of responder variants. Routing always names one of these;
/// there is no "unknown agent" state at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Verification,
    Analytics,
    General,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Received,
    Routed,
    Executing,
    Completed,
    Failed,
}

//
// ================= Question =================
//

/// Immutable input for one workflow run.
///
/// `session_id` is an opaque correlation string used only for logging;
/// no state is keyed on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub session_id: String,
    pub artist_name: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            artist_name: None,
        }
    }

    pub fn with_artist(mut self, artist_name: impl Into<String>) -> Self {
        self.artist_name = Some(artist_name.into());
        self
    }
}

//
// ================= Routing =================
//

/// Produced once per request by the Orchestrator; never mutated afterward.
/// Confidence is advisory metadata only and has no effect on control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub agent: AgentKind,
    pub reasoning: String,
    pub confidence: Confidence,
}

//
// ================= Tool Schema =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolParameter {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn required(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            description,
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: &'static str,
        param_type: ParamType,
        description: &'static str,
        default: Value,
    ) -> Self {
        Self {
            name,
            param_type,
            description,
            required: false,
            default: Some(default),
        }
    }
}

/// A concrete tool call produced by the Analytics responder.
/// Validated against the tool's parameter schema before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub parameters: Map<String, Value>,
}

//
// ================= Tool Results =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    NotFound,
    InvalidParameters,
    ExecutionError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ToolFailureKind::NotFound,
            message: message.into(),
        }
    }

    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self {
            kind: ToolFailureKind::InvalidParameters,
            message: message.into(),
        }
    }

    pub fn execution_error(message: impl Into<String>) -> Self {
        Self {
            kind: ToolFailureKind::ExecutionError,
            message: message.into(),
        }
    }
}

/// Tagged success/failure — never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Success { data: Value },
    Failure { failure: ToolFailure },
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        ToolResult::Success { data }
    }

    pub fn failure(failure: ToolFailure) -> Self {
        ToolResult::Failure { failure }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }
}

//
// ================= Outcome =================
//

/// Terminal artifact of a single workflow run. Write-once: the engine
/// normalizes the responder's result into this envelope and returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub answer: String,
    pub agent_used: Option<AgentKind>,
    pub routing_confidence: Option<Confidence>,
    pub tool_used: Option<String>,
    pub tool_parameters: Option<Map<String, Value>>,
    pub structured_data: Option<Value>,
    pub error: Option<String>,
    pub state: WorkflowState,
}

impl Outcome {
    /// A completed outcome carrying just an answer. Responders extend it
    /// with tool details; the engine stamps agent and confidence.
    pub fn answered(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            agent_used: None,
            routing_confidence: None,
            tool_used: None,
            tool_parameters: None,
            structured_data: None,
            error: None,
            state: WorkflowState::Completed,
        }
    }

    /// Generic terminal failure. The internal cause is logged by the
    /// engine, not exposed here.
    pub fn failed(answer: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            agent_used: None,
            routing_confidence: None,
            tool_used: None,
            tool_parameters: None,
            structured_data: None,
            error: Some(error.into()),
            state: WorkflowState::Failed,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_used = Some(tool_name.into());
        self
    }

    pub fn with_tool_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.tool_parameters = Some(parameters);
        self
    }

    pub fn with_structured_data(mut self, data: Value) -> Self {
        self.structured_data = Some(data);
        self
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentKind::Verification => "verification",
            AgentKind::Analytics => "analytics",
            AgentKind::General => "general",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Received => "received",
            WorkflowState::Routed => "routed",
            WorkflowState::Executing => "executing",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_kind_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&AgentKind::Verification).unwrap(),
            "\"verification\""
        );
        let kind: AgentKind = serde_json::from_str("\"analytics\"").unwrap();
        assert_eq!(kind, AgentKind::Analytics);
    }

    #[test]
    fn test_tool_result_tagged_serialization() {
        let ok = ToolResult::success(json!({"total_streams": 42}));
        let text = serde_json::to_string(&ok).unwrap();
        assert!(text.contains("\"status\":\"success\""));

        let err = ToolResult::failure(ToolFailure::not_found("нет такого артиста"));
        let text = serde_json::to_string(&err).unwrap();
        assert!(text.contains("\"status\":\"failure\""));
        assert!(text.contains("not_found"));
    }

    #[test]
    fn test_outcome_envelope_fields() {
        let outcome = Outcome::answered("Ответ")
            .with_tool("get_top_artists")
            .with_structured_data(json!([{"label": "A", "value": 1.0}]));

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["answer"], "Ответ");
        assert_eq!(value["tool_used"], "get_top_artists");
        assert_eq!(value["state"], "completed");
        assert!(value["error"].is_null());
    }
}
