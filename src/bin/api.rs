use catalog_agent_orchestrator::{
    api::start_server,
    catalog::CatalogStore,
    gateway::QwenClient,
    knowledge::KnowledgeBase,
    tools::create_default_registry,
    workflow::{WorkflowEngine, DEFAULT_TIMEOUT},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Catalog Agent Orchestrator - API Server");
    info!("📍 Port: {}", api_port);

    // Create components
    let gateway = Arc::new(QwenClient::from_env()?);

    let store = Arc::new(CatalogStore::sample());
    let registry = Arc::new(create_default_registry(store));

    let knowledge = match std::env::var("KNOWLEDGE_BASE_PATH") {
        Ok(path) => Arc::new(KnowledgeBase::load(&path)?),
        Err(_) => Arc::new(KnowledgeBase::bundled()),
    };

    let engine = Arc::new(WorkflowEngine::new(
        gateway,
        registry,
        knowledge,
        DEFAULT_TIMEOUT,
    ));

    info!("✅ Workflow engine initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(engine, api_port).await?;

    Ok(())
}
