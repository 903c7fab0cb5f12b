use parley_llm::{ChatProvider, GenerationClient};
use parley_persist::{HistoryStore, RowStore};
use parley_turn::Reconciler;
use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::config::Config;
use crate::rate_limit::RateLimiter;

/// Shared application state passed to all handlers
///
/// The store handle and provider are constructed once at startup and
/// injected here; nothing is reached through globals.
pub struct AppState {
    pub config: Arc<Config>,
    pub history: HistoryStore,
    pub reconciler: Reconciler,
    pub verifier: JwtVerifier,
    pub rate_limiter: RateLimiter,
    pub provider_name: String,
}

impl AppState {
    pub fn new(config: Config, rows: Arc<dyn RowStore>, provider: Arc<dyn ChatProvider>) -> Self {
        let history = HistoryStore::new(rows);
        let provider_name = provider.name().to_string();

        let mut generation =
            GenerationClient::new(provider).with_options(config.llm.generation_options());
        if let Some(instruction) = &config.llm.system_instruction {
            generation = generation.with_system_instruction(instruction.clone());
        }

        let reconciler = Reconciler::new(history.clone(), generation)
            .with_history_limit(config.chat.history_limit)
            .with_turn_timeout(config.chat.turn_timeout())
            .with_channel_capacity(config.chat.channel_capacity);

        let verifier = JwtVerifier::new(&config.jwt_secret, &config.auth.audience);
        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Self {
            config: Arc::new(config),
            history,
            reconciler,
            verifier,
            rate_limiter,
            provider_name,
        }
    }
}
