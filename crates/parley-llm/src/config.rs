// Configuration layer for provider-agnostic client creation

use crate::traits::ChatProvider;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Type of generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Gemini,
    OpenAI,
}

/// Configuration for the Gemini provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL (optional, defaults to the public v1beta endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL (optional, defaults to https://api.openai.com/v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Provider-specific configuration details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderDetails {
    Gemini(GeminiConfig),
    OpenAI(OpenAIConfig),
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub details: ProviderDetails,
}

impl ProviderConfig {
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::Gemini(GeminiConfig {
                api_key: api_key.into(),
                model: model.into(),
                base_url: None,
            }),
        }
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::OpenAI(OpenAIConfig {
                api_key: api_key.into(),
                model: model.into(),
                base_url: None,
            }),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = Some(base_url.into());
        match &mut self.details {
            ProviderDetails::Gemini(c) => c.base_url = base_url,
            ProviderDetails::OpenAI(c) => c.base_url = base_url,
        }
        self
    }

    /// Get the provider type
    pub fn provider_type(&self) -> ProviderType {
        match self.details {
            ProviderDetails::Gemini(_) => ProviderType::Gemini,
            ProviderDetails::OpenAI(_) => ProviderType::OpenAI,
        }
    }
}

/// Factory for creating providers from configuration
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_provider(config: ProviderConfig) -> Result<Arc<dyn ChatProvider>> {
        match config.details {
            ProviderDetails::Gemini(gemini) => {
                let mut client = crate::gemini::GeminiClient::new(gemini.api_key, gemini.model)?;
                if let Some(base_url) = gemini.base_url {
                    client = client.with_base_url(base_url);
                }
                Ok(Arc::new(client))
            }
            ProviderDetails::OpenAI(openai) => {
                let mut client = crate::openai::OpenAIClient::new(openai.api_key, openai.model)?;
                if let Some(base_url) = openai.base_url {
                    client = client.with_base_url(base_url);
                }
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_config() {
        let config = ProviderConfig::gemini("test-key", "gemini-2.0-flash");
        assert_eq!(config.provider_type(), ProviderType::Gemini);
    }

    #[test]
    fn test_factory_selects_provider() {
        let provider =
            ClientFactory::create_provider(ProviderConfig::openai("k", "gpt-4o-mini")).unwrap();
        assert_eq!(provider.name(), "openai");

        let provider = ClientFactory::create_provider(
            ProviderConfig::gemini("k", "gemini-2.0-flash").with_base_url("http://localhost:1"),
        )
        .unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = ProviderConfig::openai("test-key", "gpt-4o-mini");

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ProviderConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.provider_type(), deserialized.provider_type());
        assert!(json.contains("\"type\":\"openai\""));
    }
}
