//! Generative-text backends for Parley.
//!
//! All providers implement the `parley_core::Provider` trait.
//! [`build_from_config`] picks the right one from configuration.

pub mod gemini;
pub mod openai_compat;

use std::sync::Arc;

use parley_config::{AppConfig, ProviderConfig};
use parley_core::error::ProviderError;
use parley_core::provider::Provider;
use tracing::{info, warn};

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

/// Sampling parameters shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for GenerationSettings {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Build the configured provider.
///
/// Returns `Ok(None)` when no API key is available: the bot then runs with AI
/// features disabled. Local OpenAI-compatible servers need no key.
pub fn build_from_config(
    config: &AppConfig,
) -> Result<Option<Arc<dyn Provider>>, ProviderError> {
    let provider_config = &config.provider;
    let name = provider_config.name.as_str();
    let settings = GenerationSettings::from(provider_config);

    let api_key = match (&config.api_key, is_local(name)) {
        (Some(key), _) => key.clone(),
        (None, true) => String::new(),
        (None, false) => {
            warn!(provider = %name, "No API key found, AI features will be disabled");
            return Ok(None);
        }
    };

    let provider: Arc<dyn Provider> = if name == "gemini" {
        let mut p = GeminiProvider::new(&api_key, &provider_config.model)?.with_settings(settings);
        if let Some(url) = &provider_config.api_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));
        Arc::new(
            OpenAiCompatProvider::new(name, &base_url, &api_key, &provider_config.model)?
                .with_settings(settings),
        )
    };

    info!(provider = %provider.name(), model = %provider_config.model, "AI provider initialized");
    Ok(Some(provider))
}

fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_disables_ai() {
        let config = AppConfig::default();
        assert!(build_from_config(&config).unwrap().is_none());
    }

    #[test]
    fn gemini_is_the_default_backend() {
        let config = AppConfig {
            api_key: Some("g-key".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn local_backend_needs_no_key() {
        let mut config = AppConfig::default();
        config.provider.name = "ollama".into();
        config.provider.model = "llama3".into();
        let provider = build_from_config(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn settings_follow_config() {
        let mut config = ProviderConfig::default();
        config.temperature = 0.2;
        let settings = GenerationSettings::from(&config);
        assert!((settings.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.top_k, 40);
        assert_eq!(settings.max_output_tokens, 1024);
    }
}
