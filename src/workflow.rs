//! Workflow engine - the single entry point for a question
//!
//! Drives one request through the state machine
//! Received -> Routed -> Executing -> Completed | Failed,
//! bounded by a wall-clock timeout. Responder-level problems (unknown
//! artist, bad parameters, off-topic questions) surface as Completed
//! outcomes with textual answers; only infrastructure failures — the
//! gateway being down, or the deadline elapsing — end in Failed.

use crate::agents::{AnalyticsAgent, GeneralAgent, VerificationAgent};
use crate::error::AgentError;
use crate::gateway::LlmGateway;
use crate::knowledge::KnowledgeBase;
use crate::models::{AgentKind, Outcome, Question, RoutingDecision};
use crate::orchestrator::Orchestrator;
use crate::tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const TIMEOUT_ANSWER: &str =
    "Превышено время обработки запроса. Попробуйте ещё раз чуть позже.";

const INFRA_FAILURE_ANSWER: &str =
    "Сервис временно недоступен. Попробуйте повторить запрос позже.";

pub struct WorkflowEngine {
    orchestrator: Orchestrator,
    verification: VerificationAgent,
    analytics: AnalyticsAgent,
    general: GeneralAgent,
    timeout: Duration,
}

impl WorkflowEngine {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        registry: Arc<ToolRegistry>,
        knowledge: Arc<KnowledgeBase>,
        timeout: Duration,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(gateway.clone()),
            verification: VerificationAgent::new(gateway.clone(), knowledge),
            analytics: AnalyticsAgent::new(gateway.clone(), registry),
            general: GeneralAgent::new(gateway),
            timeout,
        }
    }

    /// Process one question to a terminal outcome. Infallible by design:
    /// whatever goes wrong inside becomes a serialisable Outcome.
    pub async fn run(&self, question: &Question) -> Outcome {
        info!(
            session = %question.session_id,
            question = %question.text,
            state = "received",
            "Processing question"
        );

        match timeout(self.timeout, self.execute(question)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let secs = self.timeout.as_secs();
                error!(
                    session = %question.session_id,
                    timeout_secs = secs,
                    state = "failed",
                    "Request deadline elapsed"
                );
                Outcome::failed(TIMEOUT_ANSWER, AgentError::Timeout(secs).to_string())
            }
        }
    }

    async fn execute(&self, question: &Question) -> Outcome {
        let decision = match self
            .orchestrator
            .classify(&question.text, question.artist_name.as_deref())
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                // Failed before routing: no agent, no confidence.
                error!(session = %question.session_id, error = %e, state = "failed", "Routing failed");
                return Outcome::failed(INFRA_FAILURE_ANSWER, e.to_string());
            }
        };

        info!(
            session = %question.session_id,
            agent = %decision.agent,
            confidence = %decision.confidence,
            state = "routed",
            "Question routed"
        );

        let result = self.dispatch(question, &decision).await;

        match result {
            Ok(mut outcome) => {
                outcome.agent_used = Some(decision.agent);
                outcome.routing_confidence = Some(decision.confidence);
                info!(
                    session = %question.session_id,
                    agent = %decision.agent,
                    state = %outcome.state,
                    "Question processed"
                );
                outcome
            }
            Err(e) => {
                error!(
                    session = %question.session_id,
                    agent = %decision.agent,
                    error = %e,
                    state = "failed",
                    "Responder infrastructure failure"
                );
                let mut outcome = Outcome::failed(INFRA_FAILURE_ANSWER, e.to_string());
                outcome.agent_used = Some(decision.agent);
                outcome.routing_confidence = Some(decision.confidence);
                outcome
            }
        }
    }

    async fn dispatch(
        &self,
        question: &Question,
        decision: &RoutingDecision,
    ) -> crate::Result<Outcome> {
        info!(
            session = %question.session_id,
            agent = %decision.agent,
            state = "executing",
            "Dispatching to responder"
        );

        match decision.agent {
            AgentKind::Verification => self.verification.respond(question).await,
            AgentKind::Analytics => self.analytics.respond(question).await,
            AgentKind::General => Ok(self.general.respond(question).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogStore;
    use crate::gateway::{ScriptedGateway, UnavailableGateway};
    use crate::models::{Confidence, WorkflowState};
    use crate::tools::create_default_registry;
    use async_trait::async_trait;

    fn engine(gateway: Arc<dyn LlmGateway>) -> WorkflowEngine {
        engine_with_timeout(gateway, Duration::from_secs(5))
    }

    fn engine_with_timeout(gateway: Arc<dyn LlmGateway>, timeout: Duration) -> WorkflowEngine {
        let registry = Arc::new(create_default_registry(Arc::new(CatalogStore::sample())));
        let knowledge = Arc::new(KnowledgeBase::bundled());
        WorkflowEngine::new(gateway, registry, knowledge, timeout)
    }

    /// Scenario: verification question end to end.
    #[tokio::test]
    async fn test_verification_flow() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "verification", "reasoning": "про верификацию", "confidence": "high"}"#,
            "Для верификации на Spotify зайдите на artists.spotify.com.",
        ]));
        let engine = engine(gateway);

        let question = Question::new("Как пройти верификацию на Spotify?", "e2e-1");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Completed);
        assert_eq!(outcome.agent_used, Some(AgentKind::Verification));
        assert_eq!(outcome.routing_confidence, Some(Confidence::High));
        assert!(outcome.answer.contains("artists.spotify.com"));
        assert!(outcome.error.is_none());
    }

    /// Scenario: analytics happy path with structured data in the outcome.
    #[tokio::test]
    async fn test_analytics_happy_path() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "analytics", "reasoning": "вопрос про стримы", "confidence": "high"}"#,
            r#"{"tool_name": "get_artist_streams", "parameters": {"artist_name": "Mona Songz"}, "reasoning": "стримы артиста"}"#,
        ]));
        let engine = engine(gateway);

        let question = Question::new("Сколько стримов у Mona Songz?", "e2e-2");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Completed);
        assert_eq!(outcome.agent_used, Some(AgentKind::Analytics));
        assert_eq!(outcome.tool_used.as_deref(), Some("get_artist_streams"));

        let data = outcome.structured_data.unwrap();
        assert!(data["total_streams"].as_u64().unwrap() > 0);
        assert!(data["total_revenue"].as_f64().unwrap() > 0.0);
    }

    /// Scenario: required tool parameter missing — soft failure, still Completed.
    #[tokio::test]
    async fn test_analytics_missing_parameter() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "analytics", "reasoning": "вопрос про стримы", "confidence": "medium"}"#,
            r#"{"tool_name": "get_artist_streams", "parameters": {}, "reasoning": "стримы"}"#,
        ]));
        let engine = engine(gateway);

        let question = Question::new("Сколько у него стримов?", "e2e-3");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Completed);
        assert_eq!(outcome.agent_used, Some(AgentKind::Analytics));
        assert_eq!(outcome.tool_used.as_deref(), Some("get_artist_streams"));
        assert!(outcome.error.is_some());
        assert!(!outcome.answer.is_empty());
    }

    /// Scenario: the entity hint names an artist absent from the store —
    /// Completed with an error descriptor and a search suggestion.
    #[tokio::test]
    async fn test_analytics_unknown_artist() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "analytics", "reasoning": "вопрос про стримы", "confidence": "high"}"#,
            r#"{"tool_name": "get_artist_streams", "parameters": {}, "reasoning": "стримы"}"#,
        ]));
        let engine = engine(gateway);

        let question =
            Question::new("Сколько у меня стримов?", "e2e-3b").with_artist("Неизвестный Артист");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Completed);
        assert!(outcome.error.as_deref().unwrap().contains("не найден"));
        assert!(outcome.answer.contains("search_artists"));
    }

    /// Scenario: small talk routes to general, no tool involved.
    #[tokio::test]
    async fn test_greeting_goes_to_general() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "general", "reasoning": "приветствие", "confidence": "high"}"#,
            "Привет! Всё отлично, чем могу помочь?",
        ]));
        let engine = engine(gateway);

        let question = Question::new("Привет, как дела?", "e2e-4b");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Completed);
        assert_eq!(outcome.agent_used, Some(AgentKind::General));
        assert!(outcome.tool_used.is_none());
        assert!(outcome.answer.contains("Привет"));
    }

    /// Scenario: gateway down before routing — the only hard-failure path.
    #[tokio::test]
    async fn test_gateway_outage_at_routing() {
        let engine = engine(Arc::new(UnavailableGateway));

        let question = Question::new("Как пройти верификацию?", "e2e-4");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Failed);
        assert!(outcome.agent_used.is_none());
        assert!(outcome.routing_confidence.is_none());
        assert!(outcome.error.is_some());
        assert!(!outcome.answer.is_empty());
    }

    /// Scenario: unintelligible routing reply falls back to general,
    /// which degrades to its canned answer when the script runs dry.
    #[tokio::test]
    async fn test_malformed_routing_falls_back_to_general() {
        let gateway = Arc::new(ScriptedGateway::new(vec!["это вообще не JSON"]));
        let engine = engine(gateway);

        let question = Question::new("Расскажи анекдот", "e2e-5");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Completed);
        assert_eq!(outcome.agent_used, Some(AgentKind::General));
        assert_eq!(outcome.routing_confidence, Some(Confidence::Low));
        assert!(!outcome.answer.is_empty());
    }

    /// Gateway down after routing: Failed, but the chosen agent is recorded.
    #[tokio::test]
    async fn test_gateway_outage_during_verification() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "verification", "reasoning": "про верификацию", "confidence": "high"}"#,
        ]));
        let engine = engine(gateway);

        let question = Question::new("Как верифицироваться в Apple Music?", "e2e-6");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Failed);
        assert_eq!(outcome.agent_used, Some(AgentKind::Verification));
        assert!(outcome.error.is_some());
    }

    struct SlowGateway;

    #[async_trait]
    impl LlmGateway for SlowGateway {
        async fn complete(&self, _system: &str, _user: &str) -> crate::Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let engine = engine_with_timeout(Arc::new(SlowGateway), Duration::from_millis(50));

        let question = Question::new("Топ артистов", "e2e-7");
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.state, WorkflowState::Failed);
        assert!(outcome.error.is_some());
        assert!(outcome.agent_used.is_none());
    }
}
