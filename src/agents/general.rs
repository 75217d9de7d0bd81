//! General responder - the catch-all
//!
//! Unconstrained conversational answers for everything the other agents
//! do not cover. This variant has no failure-prone dependency contract:
//! if the gateway errors it degrades to a canned reply instead of
//! failing the request.

use crate::gateway::LlmGateway;
use crate::models::{Outcome, Question};
use std::sync::Arc;
use tracing::warn;

const GENERAL_SYSTEM_PROMPT: &str = r#"Ты дружелюбный ассистент музыкального лейбла õzen.
Отвечай кратко и по делу на русском языке. Если вопрос касается аналитики
каталога или верификации на платформах, предложи задать его конкретнее."#;

const FALLBACK_ANSWER: &str =
    "Привет! Я ассистент лейбла õzen. Сейчас не могу ответить развёрнуто — \
     попробуйте задать вопрос ещё раз чуть позже.";

pub struct GeneralAgent {
    gateway: Arc<dyn LlmGateway>,
}

impl GeneralAgent {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Always produces an Outcome with some text.
    pub async fn respond(&self, question: &Question) -> Outcome {
        match self
            .gateway
            .complete(GENERAL_SYSTEM_PROMPT, &question.text)
            .await
        {
            Ok(answer) => Outcome::answered(answer),
            Err(e) => {
                warn!("General agent gateway call failed, using canned reply: {}", e);
                Outcome::answered(FALLBACK_ANSWER)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ScriptedGateway, UnavailableGateway};
    use crate::models::WorkflowState;

    #[tokio::test]
    async fn test_general_answer() {
        let gateway = Arc::new(ScriptedGateway::new(vec!["Привет! Всё отлично."]));
        let agent = GeneralAgent::new(gateway);

        let outcome = agent.respond(&Question::new("Привет, как дела?", "s-1")).await;
        assert_eq!(outcome.state, WorkflowState::Completed);
        assert!(outcome.answer.contains("Привет"));
        assert!(outcome.tool_used.is_none());
    }

    #[tokio::test]
    async fn test_never_hard_fails() {
        let agent = GeneralAgent::new(Arc::new(UnavailableGateway));

        let outcome = agent.respond(&Question::new("Привет", "s-2")).await;
        assert_eq!(outcome.state, WorkflowState::Completed);
        assert!(!outcome.answer.is_empty());
    }
}
