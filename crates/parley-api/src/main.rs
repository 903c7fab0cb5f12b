use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley_api::{
    build_router,
    config::{Config, StorageBackend},
    retention,
    state::AppState,
};
use parley_llm::ClientFactory;
use parley_persist::{MemoryRowStore, MongoRowStore, RowStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Parley API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    tracing::info!(provider = ?config.llm.provider, model = %config.llm.model, "Initializing LLM provider");
    let provider = ClientFactory::create_provider(config.llm.provider_config(&config.llm_api_key))?;

    let rows: Arc<dyn RowStore> = match config.storage.backend {
        StorageBackend::Mongodb => {
            tracing::info!("Connecting to MongoDB");
            let store = MongoRowStore::connect(&config.mongodb_uri, &config.mongodb.database).await?;
            store.ensure_indexes().await?;
            tracing::info!("MongoDB connected");
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; conversations are lost on restart");
            Arc::new(MemoryRowStore::new())
        }
    };

    let state = Arc::new(AppState::new(config.clone(), rows, provider));

    let _retention = retention::spawn_retention(state.history.clone(), &config.retention);
    spawn_rate_limit_pruning(state.clone());

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn spawn_rate_limit_pruning(state: Arc<AppState>) {
    if !state.config.rate_limit.enabled {
        return;
    }
    let period = state.rate_limiter.window().max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            state.rate_limiter.prune();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        }
        _ => {
            registry.with(tracing_subscriber::fmt::layer().pretty()).init();
        }
    }
}
