use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use threadline::{
    build_blob_store, connect_store, ChatSessionBuilder, MemoryManager, OpenAIProducer,
    TokenCounter,
};
use threadline_api::{build_router, config::Config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting threadline API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    tracing::info!("Connecting conversation store");
    let store = connect_store(&config.store).await?;
    tracing::info!(backend = store.backend_name(), "Conversation store ready");

    let blobs = build_blob_store(&config.blob, store.clone())?;
    let memory = Arc::new(MemoryManager::new(blobs, config.memory.clone()));
    let counter = Arc::new(TokenCounter::new(config.tokens.clone())?);
    let producer = Arc::new(OpenAIProducer::new(config.openai.clone())?);

    let session = ChatSessionBuilder::new()
        .store(store)
        .memory(memory)
        .producer(producer)
        .token_counter(counter)
        .stream_config(config.stream.clone())
        .config(config.session.clone())
        .build()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, session));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
