//! Orchestrator - the routing gate-keeper
//!
//! Classifies an incoming question into exactly one responder variant.
//! Routing itself never hard-fails: an ambiguous question or a malformed
//! model reply falls back to the General agent with low confidence. Only
//! an unreachable gateway propagates upward.

use crate::gateway::{strip_code_fences, LlmGateway};
use crate::models::{AgentKind, Confidence, RoutingDecision};
use crate::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

const ROUTING_SYSTEM_PROMPT: &str = r#"Ты главный роутер вопросов для музыкального лейбла õzen.
Твоя задача - определить, какой агент должен обработать вопрос.

ДОСТУПНЫЕ АГЕНТЫ:

**verification** - Вопросы о верификации артистов на платформах
   - Как верифицироваться в Spotify/Apple Music/Яндекс/VK?
   - Какие документы нужны для верификации?
   - Сколько времени занимает верификация?
   - Инструкции по регистрации и подтверждению профиля артиста

**analytics** - Вопросы об аналитике музыкального каталога
   - Стримы, выручка, топы артистов/треков/платформ
   - География прослушиваний, статистика по странам
   - Поиск артистов в каталоге, общие итоги по каталогу

**general** - Всё остальное: приветствия, свободные вопросы, просьбы объяснить

ФОРМАТ ОТВЕТА (строго JSON):
{
  "agent": "verification" | "analytics" | "general",
  "reasoning": "почему выбран этот агент",
  "confidence": "high" | "medium" | "low"
}

ПРИМЕРЫ:

Вопрос: "Как мне верифицироваться в Apple Music?"
Ответ:
{"agent": "verification", "reasoning": "Вопрос про верификацию на конкретной платформе", "confidence": "high"}

Вопрос: "Сколько стримов у Darkhan Juzz?"
Ответ:
{"agent": "analytics", "reasoning": "Вопрос про статистику стримов артиста", "confidence": "high"}

Вопрос: "Привет, как дела?"
Ответ:
{"agent": "general", "reasoning": "Приветствие без предметного вопроса", "confidence": "high"}

Верни ТОЛЬКО JSON, без дополнительного текста."#;

/// Raw routing reply shape expected from the model
#[derive(Debug, Deserialize)]
struct RoutingReply {
    agent: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: String,
}

pub struct Orchestrator {
    gateway: Arc<dyn LlmGateway>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Classify a question into exactly one responder variant.
    ///
    /// Pure with respect to the rest of the pipeline: same question, same
    /// gateway reply, same decision. Confidence is advisory only.
    pub async fn classify(
        &self,
        question_text: &str,
        artist_hint: Option<&str>,
    ) -> Result<RoutingDecision> {
        let system = match artist_hint {
            Some(artist) => format!(
                "{}\n\nКОНТЕКСТ: Вопрос от артиста {}",
                ROUTING_SYSTEM_PROMPT, artist
            ),
            None => ROUTING_SYSTEM_PROMPT.to_string(),
        };

        let response = self.gateway.complete(&system, question_text).await?;
        let decision = parse_routing_reply(&response);

        debug!(
            agent = %decision.agent,
            confidence = %decision.confidence,
            reasoning = %decision.reasoning,
            "Routing decision"
        );

        Ok(decision)
    }
}

/// Parse the model's routing reply. Anything unparseable routes to
/// General — routing is never a point of hard failure.
fn parse_routing_reply(response: &str) -> RoutingDecision {
    let cleaned = strip_code_fences(response);

    let reply: RoutingReply = match serde_json::from_str(cleaned) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Failed to parse routing reply ({}), defaulting to general", e);
            return RoutingDecision {
                agent: AgentKind::General,
                reasoning: "Ответ роутера не распознан, используем general".to_string(),
                confidence: Confidence::Low,
            };
        }
    };

    let agent = match reply.agent.to_lowercase().as_str() {
        "verification" | "verification_agent" => AgentKind::Verification,
        "analytics" | "analytics_agent" | "tool_agent" => AgentKind::Analytics,
        "general" | "general_agent" => AgentKind::General,
        other => {
            warn!("Unknown agent '{}' in routing reply, defaulting to general", other);
            return RoutingDecision {
                agent: AgentKind::General,
                reasoning: format!("Неизвестный агент '{}', используем general", other),
                confidence: Confidence::Low,
            };
        }
    };

    let confidence = match reply.confidence.to_lowercase().as_str() {
        "high" => Confidence::High,
        "low" => Confidence::Low,
        _ => Confidence::Medium,
    };

    RoutingDecision {
        agent,
        reasoning: reply.reasoning,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::gateway::{ScriptedGateway, UnavailableGateway};

    #[tokio::test]
    async fn test_classify_verification_question() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "verification", "reasoning": "верификация", "confidence": "high"}"#,
        ]));
        let orchestrator = Orchestrator::new(gateway);

        let decision = orchestrator
            .classify("Как верифицироваться в Spotify?", None)
            .await
            .unwrap();

        assert_eq!(decision.agent, AgentKind::Verification);
        assert_eq!(decision.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_classify_handles_fenced_reply() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            "```json\n{\"agent\": \"analytics\", \"reasoning\": \"стримы\", \"confidence\": \"medium\"}\n```",
        ]));
        let orchestrator = Orchestrator::new(gateway);

        let decision = orchestrator
            .classify("Сколько стримов у артиста?", Some("Darkhan Juzz"))
            .await
            .unwrap();

        assert_eq!(decision.agent, AgentKind::Analytics);
        assert_eq!(decision.confidence, Confidence::Medium);
    }

    #[tokio::test]
    async fn test_malformed_reply_defaults_to_general() {
        let gateway = Arc::new(ScriptedGateway::new(vec!["это не JSON"]));
        let orchestrator = Orchestrator::new(gateway);

        let decision = orchestrator.classify("что-нибудь", None).await.unwrap();

        assert_eq!(decision.agent, AgentKind::General);
        assert_eq!(decision.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn test_unknown_agent_defaults_to_general() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            r#"{"agent": "lyrics_agent", "reasoning": "тексты", "confidence": "high"}"#,
        ]));
        let orchestrator = Orchestrator::new(gateway);

        let decision = orchestrator.classify("напиши текст", None).await.unwrap();
        assert_eq!(decision.agent, AgentKind::General);
    }

    #[tokio::test]
    async fn test_gateway_outage_propagates() {
        let orchestrator = Orchestrator::new(Arc::new(UnavailableGateway));

        let result = orchestrator.classify("вопрос", None).await;
        assert!(matches!(result, Err(AgentError::GatewayUnavailable(_))));
    }

    #[tokio::test]
    async fn test_classification_is_deterministic_for_same_reply() {
        let reply = r#"{"agent": "analytics", "reasoning": "r", "confidence": "high"}"#;

        let first = Orchestrator::new(Arc::new(ScriptedGateway::new(vec![reply])))
            .classify("Топ артистов", None)
            .await
            .unwrap();
        let second = Orchestrator::new(Arc::new(ScriptedGateway::new(vec![reply])))
            .classify("Топ артистов", None)
            .await
            .unwrap();

        assert_eq!(first.agent, second.agent);
        assert_eq!(first.confidence, second.confidence);
    }
}
