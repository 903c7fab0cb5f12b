use config::{Config as ConfigLoader, ConfigError, Environment, File};
use parley_llm::{GenerationOptions, ProviderConfig, ProviderType};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mongodb: MongoDbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on time to first response byte
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    pub database: String,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            database: "parley".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderType,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Replaces the built-in persona preamble
    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let options = GenerationOptions::default();
        Self {
            provider: ProviderType::Gemini,
            model: "gemini-2.0-flash".to_string(),
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
            top_p: options.top_p,
            top_k: options.top_k,
            base_url: None,
            system_instruction: None,
        }
    }
}

impl LlmConfig {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions::new()
            .temperature(self.temperature)
            .max_output_tokens(self.max_output_tokens)
            .top_p(self.top_p)
            .top_k(self.top_k)
    }

    pub fn provider_config(&self, api_key: &str) -> ProviderConfig {
        let config = match self.provider {
            ProviderType::Gemini => ProviderConfig::gemini(api_key, &self.model),
            ProviderType::OpenAI => ProviderConfig::openai(api_key, &self.model),
        };
        match &self.base_url {
            Some(base_url) => config.with_base_url(base_url),
            None => config,
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_var(&self) -> &'static str {
        match self.provider {
            ProviderType::Gemini => "GEMINI_API_KEY",
            ProviderType::OpenAI => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub history_limit: usize,
    pub max_message_chars: usize,
    pub max_id_chars: usize,
    /// 0 disables the per-turn deadline
    pub turn_timeout_secs: u64,
    pub channel_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            max_message_chars: 50_000,
            max_id_chars: 100,
            turn_timeout_secs: 120,
            channel_capacity: 64,
        }
    }
}

impl ChatConfig {
    pub fn turn_timeout(&self) -> Option<Duration> {
        (self.turn_timeout_secs > 0).then(|| Duration::from_secs(self.turn_timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// 0 keeps conversations forever
    pub days: u32,
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: 0,
            interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub audience: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            audience: "authenticated".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. `PARLEY_<SECTION>__<KEY>` environment variables
    ///
    /// Secrets are read from `MONGODB_URI`, `GEMINI_API_KEY` or
    /// `OPENAI_API_KEY`, and `AUTH_JWT_SECRET` only.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name("config/default").required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // 3. Environment variables override everything
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.origins")
                    .try_parsing(true),
            );

        let config = builder.build()?;

        let mut cfg: Config = config.try_deserialize()?;
        cfg.load_secrets()?;

        Ok(cfg)
    }

    fn load_secrets(&mut self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Mongodb {
            self.mongodb_uri = required_env("MONGODB_URI")?;
        }
        self.llm_api_key = required_env(self.llm.api_key_var())?;
        self.jwt_secret = required_env("AUTH_JWT_SECRET")?;
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Message(format!("{} environment variable is required", name)))
}
