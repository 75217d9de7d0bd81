use catalog_agent_orchestrator::{
    catalog::CatalogStore,
    gateway::ScriptedGateway,
    knowledge::KnowledgeBase,
    models::Question,
    tools::create_default_registry,
    workflow::{WorkflowEngine, DEFAULT_TIMEOUT},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Catalog Agent Orchestrator starting (demo run)");

    // Scripted gateway: one routing reply, one tool-selection reply.
    let gateway = Arc::new(ScriptedGateway::new(vec![
        r#"{"agent": "analytics", "reasoning": "Вопрос про топ артистов каталога", "confidence": "high"}"#,
        r#"{"tool_name": "get_top_artists", "parameters": {"limit": 5, "metric": "revenue"}, "reasoning": "Нужны топ артисты по выручке"}"#,
    ]));

    let store = Arc::new(CatalogStore::sample());
    let registry = Arc::new(create_default_registry(store));
    let knowledge = Arc::new(KnowledgeBase::bundled());

    let engine = WorkflowEngine::new(gateway, registry, knowledge, DEFAULT_TIMEOUT);

    let question = Question::new("Кто топ-5 артистов по выручке?", "demo-session");

    info!(question = %question.text, "Running workflow");

    let outcome = engine.run(&question).await;

    println!("\n=== OUTCOME ===");
    println!("State: {}", outcome.state);
    if let Some(agent) = &outcome.agent_used {
        println!("Agent: {}", agent);
    }
    if let Some(tool) = &outcome.tool_used {
        println!("Tool: {}", tool);
    }
    println!("\n{}", outcome.answer);

    if let Some(data) = &outcome.structured_data {
        println!("\nChart data: {}", serde_json::to_string_pretty(data)?);
    }

    Ok(())
}
