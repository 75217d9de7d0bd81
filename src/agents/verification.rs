//! Verification responder
//!
//! Answers platform-verification questions strictly from the static
//! knowledge base. The whole knowledge text goes into the system prompt;
//! the model is instructed to stay inside it and to give a best-effort
//! answer from the available text when the exact question is not covered.

use crate::gateway::LlmGateway;
use crate::knowledge::KnowledgeBase;
use crate::models::{Outcome, Question};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

pub struct VerificationAgent {
    gateway: Arc<dyn LlmGateway>,
    knowledge: Arc<KnowledgeBase>,
}

impl VerificationAgent {
    pub fn new(gateway: Arc<dyn LlmGateway>, knowledge: Arc<KnowledgeBase>) -> Self {
        Self { gateway, knowledge }
    }

    pub async fn respond(&self, question: &Question) -> Result<Outcome> {
        let artist_context = match &question.artist_name {
            Some(artist) => format!("\n\nКОНТЕКСТ: Вопрос от артиста {}.", artist),
            None => String::new(),
        };

        let system = format!(
            r#"Ты консультант музыкального лейбла õzen по верификации артистов на платформах.{artist_context}

ПРАВИЛА:
1. Отвечай ТОЛЬКО на основе базы знаний ниже, не придумывай информацию
2. Если точного ответа в базе нет — дай лучший возможный ответ из имеющегося текста и скажи, что деталей нет
3. Форматируй ответ в markdown, шаги — нумерованным списком

БАЗА ЗНАНИЙ:

{kb}"#,
            artist_context = artist_context,
            kb = self.knowledge.lookup(),
        );

        let answer = self.gateway.complete(&system, &question.text).await?;

        debug!(chars = answer.len(), "Verification answer generated");

        Ok(Outcome::answered(answer))
    }
}
