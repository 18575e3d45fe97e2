//! `nestchat serve` — Start the HTTP API server.

use std::sync::Arc;

use nestchat_advisor::{AdvisorSettings, Orchestrator};
use nestchat_config::AppConfig;
use nestchat_gateway::AppState;
use nestchat_provider::OpenAiCompatClient;
use nestchat_store::{HistoryStore, ProfileStore};

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        tracing::warn!("no API key configured, upstream calls will fail (set OPENAI_API_KEY)");
    }

    let client = Arc::new(OpenAiCompatClient::from_config(&config)?);
    let pool = nestchat_store::connect(&config.database_url).await?;
    let profiles = ProfileStore::new(pool.clone()).await?;
    let history = HistoryStore::new(pool).await?;
    let orchestrator = Orchestrator::new(client, AdvisorSettings::from_config(&config));

    let state = Arc::new(AppState {
        orchestrator,
        profiles,
        history,
    });

    println!("NestChat Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model: {}", config.model);
    println!("   Database: {}", config.database_url);

    nestchat_gateway::serve(state, &config.gateway.host, config.gateway.port).await?;

    Ok(())
}
