//! Provider registry: resolves a provider name to a configured adapter.

use super::huggingface::HuggingFaceProvider;
use super::mock::MockChatProvider;
use super::openrouter::OpenRouterProvider;
use super::ChatProvider;
use crate::config::{AppConfig, ProvidersConfig};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;

/// Adapters keyed by provider name, built once at startup. Resolution is
/// synchronous so a misconfigured provider is diagnosed before any network
/// call is made.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration. Providers without a
    /// credential are left unregistered and fail at resolution time.
    pub fn from_config(providers: &ProvidersConfig, app: &AppConfig) -> Self {
        let mut registry = Self::new();

        if let Some(api_key) = &providers.openrouter_api_key {
            registry.register(Arc::new(OpenRouterProvider::new(
                api_key.clone(),
                app.url.clone(),
                app.title.clone(),
            )));
        }

        if let Some(api_key) = &providers.huggingface_api_key {
            registry.register(Arc::new(HuggingFaceProvider::new(api_key.clone())));
        }

        if providers.enable_mock {
            registry.register(Arc::new(MockChatProvider::new()));
        }

        registry
    }

    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Registered provider names, for startup logging.
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a provider by name.
    ///
    /// An unrecognized name or a recognized provider whose credential was
    /// absent at startup both fail with a configuration error.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ChatProvider>, AppError> {
        if let Some(provider) = self.providers.get(name) {
            return Ok(provider.clone());
        }

        let credential = match name {
            "openrouter" => "OPENROUTER_API_KEY",
            "huggingface" => "HUGGINGFACE_API_KEY",
            _ => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Unsupported AI provider: {}",
                    name
                )))
            }
        };

        Err(AppError::ConfigError(anyhow::anyhow!(
            "Provider '{}' is not configured: {} is not set",
            name,
            credential
        )))
    }
}
